//! Archive extraction.
//!
//! ZIP is decoded in-process. Tarballs go through `tar`, and 7z/rar go through
//! `bsdtar` or `7z`, whichever is installed.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use unpacker_utils::fs::ensure_dir_exists;
use zip::ZipArchive;

use crate::{
    command::{CommandRunner, CommandSpec},
    UnpackerError, UnpackerResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarBz2,
    Tar,
    Zip,
    SevenZip,
    Rar,
}

/// Recognised suffixes, longest compound suffixes first so `.tar.gz` is never
/// mistaken for `.gz`-less `.tar`.
pub const ARCHIVE_SUFFIXES: [(&str, ArchiveFormat); 8] = [
    (".tar.gz", ArchiveFormat::TarGz),
    (".tar.xz", ArchiveFormat::TarXz),
    (".tar.bz2", ArchiveFormat::TarBz2),
    (".tgz", ArchiveFormat::TarGz),
    (".tar", ArchiveFormat::Tar),
    (".zip", ArchiveFormat::Zip),
    (".7z", ArchiveFormat::SevenZip),
    (".rar", ArchiveFormat::Rar),
];

/// Splits `file_name` into its stem and the recognised archive suffix.
/// Suffix matching ignores ASCII case.
pub fn split_archive_suffix(file_name: &str) -> Option<(&str, ArchiveFormat)> {
    ARCHIVE_SUFFIXES.iter().find_map(|(suffix, format)| {
        let start = file_name.len().checked_sub(suffix.len())?;
        let tail = file_name.get(start..)?;
        tail.eq_ignore_ascii_case(suffix)
            .then(|| (&file_name[..start], *format))
    })
}

impl ArchiveFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?;
        split_archive_suffix(name).map(|(_, format)| format)
    }

    pub fn is_tarball(self) -> bool {
        matches!(self, Self::Tar | Self::TarGz | Self::TarXz | Self::TarBz2)
    }
}

fn extraction_error(archive: &Path, reason: impl Into<String>) -> UnpackerError {
    UnpackerError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    }
}

// A tool that ran and failed means a bad archive; one that never started is a
// missing dependency.
fn map_tool_error(archive: &Path, err: UnpackerError) -> UnpackerError {
    match err {
        UnpackerError::CommandFailed {
            program,
            stderr,
            exit_code,
            ..
        } => {
            let detail = stderr.trim();
            let reason = if detail.is_empty() {
                match exit_code {
                    Some(code) => format!("{program} exited with code {code}"),
                    None => format!("{program} was killed by a signal"),
                }
            } else {
                format!("{program}: {detail}")
            };
            extraction_error(archive, reason)
        }
        UnpackerError::LaunchFailed {
            program, ..
        } => UnpackerError::MissingDependency(program),
        other => other,
    }
}

fn extract_zip(archive: PathBuf, dest: PathBuf) -> UnpackerResult<()> {
    let file = File::open(&archive).map_err(|err| extraction_error(&archive, err.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|err| extraction_error(&archive, err.to_string()))?;
    debug!(entries = zip.len(), "unpacking zip");
    zip.extract(&dest)
        .map_err(|err| extraction_error(&archive, err.to_string()))
}

/// Extracts `archive` into `dest`, creating `dest` if needed.
///
/// Runs off the caller's thread: ZIP decoding happens on the blocking pool
/// and the other formats wait on a child process.
pub async fn extract<R: CommandRunner>(runner: &R, archive: &Path, dest: &Path) -> UnpackerResult<()> {
    let format = ArchiveFormat::from_path(archive)
        .ok_or_else(|| UnpackerError::UnsupportedArchive(archive.to_path_buf()))?;

    ensure_dir_exists(dest).map_err(|err| extraction_error(archive, err.to_string()))?;
    info!(archive = %archive.display(), ?format, "extracting");

    match format {
        ArchiveFormat::Zip => {
            let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());
            tokio::task::spawn_blocking(move || extract_zip(archive, dest)).await??;
        }
        format if format.is_tarball() => {
            let spec = CommandSpec::new("tar")
                .arg("-xf")
                .arg(archive)
                .arg("-C")
                .arg(dest);
            runner
                .run(&spec)
                .await
                .map_err(|err| map_tool_error(archive, err))?;
        }
        _ => {
            let spec = if runner.probe("bsdtar").await {
                CommandSpec::new("bsdtar")
                    .arg("-xf")
                    .arg(archive)
                    .arg("-C")
                    .arg(dest)
            } else if runner.probe("7z").await {
                let mut out = std::ffi::OsString::from("-o");
                out.push(dest);
                CommandSpec::new("7z").args(["x", "-y"]).arg(out).arg(archive)
            } else {
                return Err(UnpackerError::MissingDependency("bsdtar or 7z".into()));
            };
            runner
                .run(&spec)
                .await
                .map_err(|err| map_tool_error(archive, err))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs, io::Write, process::Command, sync::Mutex};

    use zip::{write::SimpleFileOptions, ZipWriter};

    use super::*;
    use crate::command::{CommandOutput, ProcessRunner};

    enum Outcome {
        Succeeds,
        Fails(&'static str),
        WontStart,
    }

    /// Reports `available` tools as present and answers every run with
    /// `outcome`.
    struct ToolRunner {
        available: HashSet<&'static str>,
        outcome: Outcome,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ToolRunner {
        fn new(available: &[&'static str], outcome: Outcome) -> Self {
            Self {
                available: available.iter().copied().collect(),
                outcome,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ToolRunner {
        async fn run(&self, spec: &CommandSpec) -> UnpackerResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            match self.outcome {
                Outcome::Succeeds => Ok(CommandOutput::default()),
                Outcome::Fails(stderr) => {
                    Err(UnpackerError::CommandFailed {
                        program: spec.program.clone(),
                        exit_code: Some(2),
                        stdout: String::new(),
                        stderr: stderr.into(),
                    })
                }
                Outcome::WontStart => {
                    Err(UnpackerError::LaunchFailed {
                        program: spec.program.clone(),
                        source: std::io::ErrorKind::NotFound.into(),
                    })
                }
            }
        }

        async fn probe(&self, command: &str) -> bool {
            self.available.contains(command)
        }
    }

    fn tool_available(name: &str) -> bool {
        Command::new(name).arg("--version").output().is_ok()
    }

    #[test]
    fn test_suffix_ordering() {
        assert_eq!(
            split_archive_suffix("app-1.2.3.tar.gz"),
            Some(("app-1.2.3", ArchiveFormat::TarGz))
        );
        assert_eq!(
            split_archive_suffix("App.TAR.XZ"),
            Some(("App", ArchiveFormat::TarXz))
        );
        assert_eq!(split_archive_suffix("a.tgz"), Some(("a", ArchiveFormat::TarGz)));
        assert_eq!(split_archive_suffix("a.tar"), Some(("a", ArchiveFormat::Tar)));
        assert_eq!(split_archive_suffix("a.7z"), Some(("a", ArchiveFormat::SevenZip)));
        assert_eq!(split_archive_suffix("a.gz"), None);
        assert_eq!(split_archive_suffix("notes.txt"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            ArchiveFormat::from_path("/tmp/x/foo.tar.bz2"),
            Some(ArchiveFormat::TarBz2)
        );
        assert_eq!(ArchiveFormat::from_path("/tmp/x/foo.RAR"), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::from_path("/tmp/x/"), None);
    }

    #[tokio::test]
    async fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("app.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default().unix_permissions(0o755);
            zip.add_directory("app/bin/", options).unwrap();
            zip.start_file("app/bin/app", options).unwrap();
            zip.write_all(&[0x7f, b'E', b'L', b'F', 1, 2, 3]).unwrap();
            zip.start_file("app/README", SimpleFileOptions::default()).unwrap();
            zip.write_all(b"hello").unwrap();
            zip.finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&ProcessRunner::new(), &archive, &dest).await.unwrap();
        assert_eq!(fs::read(dest.join("app/README")).unwrap(), b"hello");
        assert!(dest.join("app/bin/app").is_file());
    }

    #[tokio::test]
    async fn test_extract_corrupt_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract(&ProcessRunner::new(), &archive, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, UnpackerError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_extract_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(
            &ProcessRunner::new(),
            &dir.path().join("setup.exe"),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnpackerError::UnsupportedArchive(_)));
    }

    #[tokio::test]
    async fn test_extract_tarball() {
        if !tool_available("tar") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("tool/bin")).unwrap();
        fs::write(src.join("tool/bin/run"), b"#!/bin/sh\necho hi\n").unwrap();

        let archive = dir.path().join("tool-0.3.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(&src)
            .arg("tool")
            .status()
            .unwrap();
        assert!(status.success());

        let dest = dir.path().join("out");
        extract(&ProcessRunner::new(), &archive, &dest).await.unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("tool/bin/run")).unwrap(),
            "#!/bin/sh\necho hi\n"
        );
    }

    #[tokio::test]
    async fn test_extract_corrupt_tarball() {
        if !tool_available("tar") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        fs::write(&archive, b"garbage").unwrap();

        let err = extract(&ProcessRunner::new(), &archive, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, UnpackerError::Extraction { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_rar_prefers_bsdtar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("game-2.0.rar");
        let dest = dir.path().join("out");

        let runner = ToolRunner::new(&["bsdtar", "7z"], Outcome::Succeeds);
        extract(&runner, &archive, &dest).await.unwrap();

        let expected = CommandSpec::new("bsdtar")
            .arg("-xf")
            .arg(&archive)
            .arg("-C")
            .arg(&dest);
        assert_eq!(runner.calls(), vec![expected]);
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_seven_zip_fallback_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool.7z");
        let dest = dir.path().join("out");

        let runner = ToolRunner::new(&["7z"], Outcome::Succeeds);
        extract(&runner, &archive, &dest).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "7z");
        let args: Vec<_> = calls[0]
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "x".to_string(),
                "-y".to_string(),
                format!("-o{}", dest.display()),
                archive.display().to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_seven_zip_tool_installed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ToolRunner::new(&[], Outcome::Succeeds);

        let err = extract(&runner, &dir.path().join("a.7z"), &dir.path().join("out"))
            .await
            .unwrap_err();
        match err {
            UnpackerError::MissingDependency(tool) => assert_eq!(tool, "bsdtar or 7z"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_that_cannot_start_is_a_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ToolRunner::new(&["bsdtar"], Outcome::WontStart);

        let err = extract(&runner, &dir.path().join("a.rar"), &dir.path().join("out"))
            .await
            .unwrap_err();
        match err {
            UnpackerError::MissingDependency(tool) => assert_eq!(tool, "bsdtar"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_tool_reports_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.7z");
        let runner = ToolRunner::new(&["7z"], Outcome::Fails("  Headers Error\n"));

        let err = extract(&runner, &archive, &dir.path().join("out"))
            .await
            .unwrap_err();
        match err {
            UnpackerError::Extraction {
                archive: reported,
                reason,
            } => {
                assert_eq!(reported, archive);
                assert_eq!(reason, "7z: Headers Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tarball_tool_failure_without_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ToolRunner::new(&[], Outcome::Fails(""));

        let err = extract(&runner, &dir.path().join("a.tar.xz"), &dir.path().join("out"))
            .await
            .unwrap_err();
        match err {
            UnpackerError::Extraction {
                reason, ..
            } => assert_eq!(reason, "tar exited with code 2"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
