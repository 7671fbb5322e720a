use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, Mutex, OnceLock},
};

use unpacker_config::config::Config;
use unpacker_core::{
    command::{CommandOutput, CommandRunner, CommandSpec},
    UnpackerError, UnpackerResult,
};
use zip::{write::SimpleFileOptions, ZipWriter};

use crate::CancelHandle;

/// Config with every directory redirected under `root`.
pub fn test_config(root: &Path) -> Config {
    let dir = |name: &str| Some(root.join(name).display().to_string());
    Config {
        temp_root: dir("tmp"),
        apps_path: dir("home/apps"),
        bin_path: dir("home/bin"),
        desktop_path: dir("home/applications"),
        system_wide: Some(false),
        ..Config::default_config()
    }
}

pub fn elf_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x7f, b'E', b'L', b'F'];
    bytes.resize(len.max(4), 0);
    bytes
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default().unix_permissions(0o644);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Entries left under the configured temp root.
pub fn leftover_workdirs(root: &Path) -> Vec<PathBuf> {
    match fs::read_dir(root.join("tmp")) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn bash_available() -> bool {
    Command::new("bash")
        .arg("-c")
        .arg("true")
        .status()
        .is_ok_and(|s| s.success())
}

/// Scripted runner for the system-wide strategy. `fpm` drops an artifact
/// into its `-p` directory; every other program succeeds without output.
pub struct FakeRunner {
    available: HashSet<String>,
    artifact_name: &'static str,
    fail_program: Option<&'static str>,
    interrupt: Option<(&'static str, Arc<OnceLock<CancelHandle>>)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new(available: &[&str], artifact_name: &'static str) -> Self {
        Self {
            available: available.iter().map(|s| s.to_string()).collect(),
            artifact_name,
            fail_program: None,
            interrupt: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, program: &'static str) -> Self {
        self.fail_program = Some(program);
        self
    }

    /// Fires `handle` while `program` runs, as a Ctrl-C would.
    pub fn interrupting(mut self, program: &'static str, handle: Arc<OnceLock<CancelHandle>>) -> Self {
        self.interrupt = Some((program, handle));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> UnpackerResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        if let Some((program, handle)) = &self.interrupt {
            if *program == spec.program {
                assert!(handle.get().unwrap().cancel());
            }
        }
        if self.fail_program == Some(spec.program.as_str()) {
            return Err(UnpackerError::CommandFailed {
                program: spec.program.clone(),
                exit_code: Some(1),
                stdout: "Creating package\n".into(),
                stderr: "boom\n".into(),
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
