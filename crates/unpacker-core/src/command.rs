//! External process execution.
//!
//! Every tool the pipeline depends on (archive tools, the package builder, the
//! host package manager, `bash`) goes through [`CommandRunner`], so the
//! installers can be exercised against a scripted runner in tests.

use std::{
    env,
    ffi::{OsStr, OsString},
    fmt,
    future::Future,
    path::Path,
    process::Stdio,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{debug, trace};
use unpacker_utils::string::shell_quote;

use crate::{error::ErrorContext, UnpackerError, UnpackerResult};

/// A program and its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Wraps this command so it runs under `helper` (e.g. `pkexec`).
    pub fn escalated(self, helper: &str) -> Self {
        CommandSpec::new(helper).arg(&self.program).args(self.args)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs.
pub trait CommandRunner: Send + Sync {
    /// Runs `spec` to completion.
    ///
    /// Fails with [`UnpackerError::LaunchFailed`] when the program cannot be
    /// spawned and [`UnpackerError::CommandFailed`] on a non-zero exit.
    fn run(&self, spec: &CommandSpec)
        -> impl Future<Output = UnpackerResult<CommandOutput>> + Send;

    /// Whether `command` resolves to an executable. Never fails.
    fn probe(&self, command: &str) -> impl Future<Output = bool> + Send;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

// Reads until EOF. Invalid UTF-8 is replaced rather than aborting the drain,
// which would leave the child blocked on a full pipe.
async fn drain<R>(reader: Option<R>, stream: &'static str) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut captured = String::new();
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Some(raw) = lines.next_segment().await? {
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');
        trace!(stream, "{line}");
        captured.push_str(line);
        captured.push('\n');
    }
    Ok(captured)
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> UnpackerResult<CommandOutput> {
        debug!(command = %spec, "running");

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                UnpackerError::LaunchFailed {
                    program: spec.program.clone(),
                    source,
                }
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr, status) = tokio::join!(
            drain(stdout, "stdout"),
            drain(stderr, "stderr"),
            child.wait(),
        );

        let status = status.with_context(|| format!("waiting for {}", spec.program))?;
        let stdout = stdout.with_context(|| format!("reading stdout of {}", spec.program))?;
        let stderr = stderr.with_context(|| format!("reading stderr of {}", spec.program))?;

        if !status.success() {
            debug!(command = %spec, code = ?status.code(), "command failed");
            return Err(UnpackerError::CommandFailed {
                program: spec.program.clone(),
                exit_code: status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
        })
    }

    async fn probe(&self, command: &str) -> bool {
        let status = Command::new("which")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            // no `which` on this host
            Err(_) => search_path(command),
        }
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

fn search_path(command: &str) -> bool {
    if command.contains('/') {
        return is_executable(Path::new(command));
    }
    env::var_os("PATH")
        .is_some_and(|paths| env::split_paths(&paths).any(|dir| is_executable(&dir.join(command))))
}
