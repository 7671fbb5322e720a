//! Error types for unpacker-core.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use unpacker_config::error::ConfigError;
use unpacker_package::PackageError;
use unpacker_utils::error::{FileSystemError, LockError, PathError};

/// Everything that can end an install attempt.
#[derive(Error, Diagnostic, Debug)]
pub enum UnpackerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    #[diagnostic(
        code(unpacker::fs),
        help("Check permissions and free space in the target directory")
    )]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(unpacker::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(unpacker::lock))]
    Lock(#[from] LockError),

    #[error("Error while {action}")]
    #[diagnostic(code(unpacker::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract {}: {reason}", .archive.display())]
    #[diagnostic(
        code(unpacker::extraction),
        help("The archive may be corrupt or truncated")
    )]
    Extraction { archive: PathBuf, reason: String },

    #[error("Unsupported archive type: {}", .0.display())]
    #[diagnostic(
        code(unpacker::unsupported_archive),
        help("Supported: .tar, .tar.gz, .tgz, .tar.xz, .tar.bz2, .zip, .7z, .rar")
    )]
    UnsupportedArchive(PathBuf),

    #[error("No executable found in archive{}", format_sample(.sample))]
    #[diagnostic(
        code(unpacker::no_executable),
        help("Only ELF binaries and files starting with #! are considered")
    )]
    NoExecutableFound { sample: Vec<String> },

    #[error("Required tool `{0}` is not installed")]
    #[diagnostic(
        code(unpacker::missing_dependency),
        help("Install it with your distribution's package manager")
    )]
    MissingDependency(String),

    #[error("No supported package manager found")]
    #[diagnostic(
        code(unpacker::unsupported_package_manager),
        help("System-wide installs need pacman, apt, dnf or rpm. Use --user instead.")
    )]
    UnsupportedPackageManager,

    #[error("`{program}` exited with {}", exit_label(.exit_code))]
    #[diagnostic(code(unpacker::command_failed))]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to launch `{program}`")]
    #[diagnostic(code(unpacker::launch_failed), help("Is it installed and on PATH?"))]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Package builder produced no `{pattern}` artifact in {}", .dir.display())]
    #[diagnostic(code(unpacker::no_artifact))]
    NoPackageProduced { pattern: String, dir: PathBuf },

    #[error("Icon not found: {}", .0.display())]
    #[diagnostic(code(unpacker::icon))]
    IconNotFound(PathBuf),

    #[error("Invalid source: {0}")]
    #[diagnostic(code(unpacker::invalid_source))]
    InvalidSource(String),

    #[error("An install is already running for {}", .0.display())]
    #[diagnostic(
        code(unpacker::already_running),
        help("Wait for the running install to finish")
    )]
    AlreadyRunning(PathBuf),

    #[error("Cancelled")]
    #[diagnostic(code(unpacker::cancelled))]
    Cancelled,

    #[error("Superseded by a newer install attempt")]
    #[diagnostic(
        code(unpacker::superseded),
        help("Analyse the archive again to install it")
    )]
    Superseded,

    #[error("Background task failed: {0}")]
    #[diagnostic(code(unpacker::task))]
    Task(String),
}

fn format_sample(sample: &[String]) -> String {
    if sample.is_empty() {
        " (archive is empty)".to_string()
    } else {
        format!("; files: {}", sample.join(", "))
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |code| format!("exit code {code}"))
}

impl UnpackerError {
    /// Captured output of a failed command, for the log transcript.
    pub fn command_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::CommandFailed {
                stdout,
                stderr,
                ..
            } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for UnpackerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, UnpackerError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, UnpackerError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            UnpackerError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
