use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::{debug, info};
use unpacker_utils::fs::ensure_dir_exists;

use super::{stage_system_layout, InstallRequest, InstallStep, PackageManager, StepObserver};
use crate::{
    command::{CommandRunner, CommandSpec},
    error::ErrorContext,
    UnpackerError, UnpackerResult,
};

/// Result of a completed system-wide install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstallReport {
    pub package_manager: PackageManager,
    pub artifact: PathBuf,
}

/// Stages the application, builds a native package and installs it through
/// the host package manager.
#[derive(Debug, Clone)]
pub struct SystemInstaller {
    pub package_builder: String,
    pub escalation_helper: String,
    /// Skip the escalation helper; set when already running as root.
    pub is_root: bool,
}

impl SystemInstaller {
    pub fn new<B: Into<String>, H: Into<String>>(package_builder: B, escalation_helper: H) -> Self {
        Self {
            package_builder: package_builder.into(),
            escalation_helper: escalation_helper.into(),
            is_root: nix::unistd::geteuid().is_root(),
        }
    }

    /// Package builder invocation for `format`-typed output of `staging` into `out_dir`.
    pub fn build_command(
        &self,
        manager: PackageManager,
        request: &InstallRequest,
        staging: &Path,
        out_dir: &Path,
    ) -> CommandSpec {
        CommandSpec::new(&self.package_builder)
            .args(["-s", "dir", "-t", manager.format().fpm_target()])
            .arg("-n")
            .arg(request.identity.name())
            .arg("-v")
            .arg(request.identity.version())
            .arg("-C")
            .arg(staging)
            .arg("-p")
            .arg(out_dir)
            .arg(".")
    }

    /// Host install command for `artifact`, escalated unless already root.
    pub fn install_command(&self, manager: PackageManager, artifact: &Path) -> CommandSpec {
        let spec = manager.install_command(artifact);
        if self.is_root {
            spec
        } else {
            spec.escalated(&self.escalation_helper)
        }
    }

    /// Runs the whole system-wide strategy.
    ///
    /// Preconditions are checked before anything is written: a supported
    /// package manager and the package builder must both be present.
    pub async fn install<R: CommandRunner>(
        &self,
        runner: &R,
        request: &InstallRequest,
        staging: &Path,
        out_dir: &Path,
        on_step: StepObserver<'_>,
    ) -> UnpackerResult<SystemInstallReport> {
        let manager = PackageManager::detect(runner)
            .await
            .ok_or(UnpackerError::UnsupportedPackageManager)?;
        if !runner.probe(&self.package_builder).await {
            return Err(UnpackerError::MissingDependency(self.package_builder.clone()));
        }
        info!(%manager, format = %manager.format(), "using host package manager");

        on_step(InstallStep::Staging)?;
        let (req, root) = (request.clone(), staging.to_path_buf());
        let layout = tokio::task::spawn_blocking(move || stage_system_layout(&req, &root)).await??;
        debug!(root = %layout.root.display(), "staging complete");

        on_step(InstallStep::Building)?;
        ensure_dir_exists(out_dir)?;
        runner
            .run(&self.build_command(manager, request, staging, out_dir))
            .await?;
        let artifact = newest_artifact(out_dir, manager.format().artifact_glob())?;
        info!(artifact = %artifact.display(), "package built");

        on_step(InstallStep::Installing)?;
        runner
            .run(&self.install_command(manager, &artifact))
            .await?;

        Ok(SystemInstallReport {
            package_manager: manager,
            artifact,
        })
    }
}

/// Most recently modified file in `dir` whose name matches `pattern`.
pub(crate) fn newest_artifact(dir: &Path, pattern: &str) -> UnpackerResult<PathBuf> {
    let entries = fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        let name = entry.file_name();
        if !fast_glob::glob_match(pattern, name.to_string_lossy().as_ref()) {
            continue;
        }
        let meta = entry
            .metadata()
            .with_context(|| format!("reading metadata of {}", entry.path().display()))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let candidate = (modified, entry.path());
        // later mtime wins; equal mtimes fall back to the greater path
        match &best {
            Some(current) if *current >= candidate => {}
            _ => best = Some(candidate),
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        UnpackerError::NoPackageProduced {
            pattern: pattern.to_string(),
            dir: dir.to_path_buf(),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::Mutex,
        time::{Duration, SystemTime},
    };

    use super::*;
    use crate::{command::CommandOutput, identity::AppIdentity};

    /// Scripted runner: reports `available` tools as present and, when the
    /// package builder runs, drops an artifact into its `-p` directory.
    struct FakeRunner {
        available: HashSet<&'static str>,
        artifact_name: &'static str,
        fail_program: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new(available: &[&'static str], artifact_name: &'static str) -> Self {
            Self {
                available: available.iter().copied().collect(),
                artifact_name,
                fail_program: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, spec: &CommandSpec) -> UnpackerResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.to_string());
            if self.fail_program == Some(spec.program.as_str()) {
                return Err(UnpackerError::CommandFailed {
                    program: spec.program.clone(),
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "boom".into(),
                });
            }
            if spec.program == "fpm" {
                let idx = spec.args.iter().position(|a| a == "-p").unwrap();
                let out = PathBuf::from(&spec.args[idx + 1]);
                fs::write(out.join(self.artifact_name), b"pkg").unwrap();
            }
            Ok(CommandOutput::default())
        }

        async fn probe(&self, command: &str) -> bool {
            self.available.contains(command)
        }
    }

    fn fixture(root: &Path) -> InstallRequest {
        let tree = root.join("extracted");
        fs::create_dir_all(tree.join("bin")).unwrap();
        fs::write(tree.join("bin/tool"), [0x7f, b'E', b'L', b'F', 0]).unwrap();
        InstallRequest {
            executable: tree.join("bin/tool"),
            source_tree: tree,
            identity: AppIdentity::new("tool", "2.1"),
            icon: None,
            categories: "Utility;".into(),
        }
    }

    fn installer(is_root: bool) -> SystemInstaller {
        SystemInstaller {
            package_builder: "fpm".into(),
            escalation_helper: "pkexec".into(),
            is_root,
        }
    }

    #[tokio::test]
    async fn test_full_system_install_on_pacman_host() {
        let dir = tempfile::tempdir().unwrap();
        let request = fixture(dir.path());
        let staging = dir.path().join("staging");
        let out = dir.path().join("out");
        let runner = FakeRunner::new(&["pacman", "fpm"], "tool-2.1-1-x86_64.pkg.tar.zst");

        let mut steps = Vec::new();
        let report = installer(false)
            .install(&runner, &request, &staging, &out, &mut |step| {
                steps.push(step);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            steps,
            vec![InstallStep::Staging, InstallStep::Building, InstallStep::Installing]
        );
        assert_eq!(report.package_manager, PackageManager::Pacman);
        assert_eq!(report.artifact, out.join("tool-2.1-1-x86_64.pkg.tar.zst"));
        assert!(staging.join("usr/share/applications/tool.desktop").is_file());

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            format!(
                "fpm -s dir -t pacman -n tool -v 2.1 -C {} -p {} .",
                staging.display(),
                out.display()
            )
        );
        assert_eq!(
            calls[1],
            format!(
                "pkexec pacman -U --noconfirm {}",
                out.join("tool-2.1-1-x86_64.pkg.tar.zst").display()
            )
        );
    }

    #[tokio::test]
    async fn test_root_skips_escalation_and_apt_uses_deb() {
        let dir = tempfile::tempdir().unwrap();
        let request = fixture(dir.path());
        let out = dir.path().join("out");
        let runner = FakeRunner::new(&["apt", "rpm", "fpm"], "tool_2.1_amd64.deb");

        let report = installer(true)
            .install(&runner, &request, &dir.path().join("staging"), &out, &mut |_| Ok(()))
            .await
            .unwrap();

        assert_eq!(report.package_manager, PackageManager::Apt);
        let calls = runner.calls();
        assert!(calls[0].contains("-t deb"));
        assert!(calls[1].starts_with("apt-get install -y "));
    }

    #[tokio::test]
    async fn test_unsupported_package_manager() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(&["fpm"], "x.deb");
        let err = installer(false)
            .install(
                &runner,
                &fixture(dir.path()),
                &dir.path().join("s"),
                &dir.path().join("o"),
                &mut |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UnpackerError::UnsupportedPackageManager));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_builder() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(&["dnf"], "x.rpm");
        let err = installer(false)
            .install(
                &runner,
                &fixture(dir.path()),
                &dir.path().join("s"),
                &dir.path().join("o"),
                &mut |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UnpackerError::MissingDependency(tool) if tool == "fpm"));
    }

    #[tokio::test]
    async fn test_builder_failure_stops_before_install() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new(&["pacman", "fpm"], "x.pkg.tar.zst");
        runner.fail_program = Some("fpm");

        let err = installer(false)
            .install(
                &runner,
                &fixture(dir.path()),
                &dir.path().join("s"),
                &dir.path().join("o"),
                &mut |_| Ok(()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.command_output(), Some(("", "boom")));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_observer_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(&["pacman", "fpm"], "x.pkg.tar.zst");
        let err = installer(false)
            .install(
                &runner,
                &fixture(dir.path()),
                &dir.path().join("s"),
                &dir.path().join("o"),
                &mut |step| {
                    if step == InstallStep::Building {
                        Err(UnpackerError::Cancelled)
                    } else {
                        Ok(())
                    }
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UnpackerError::Cancelled));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_newest_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("app-1.deb");
        let new = dir.path().join("app-2.deb");
        fs::write(&old, b"1").unwrap();
        fs::write(&new, b"2").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        assert_eq!(newest_artifact(dir.path(), "*.deb").unwrap(), new);
        assert!(matches!(
            newest_artifact(dir.path(), "*.rpm"),
            Err(UnpackerError::NoPackageProduced { .. })
        ));
    }
}
