//! Error types for the package crate.

use miette::Diagnostic;
use thiserror::Error;
use unpacker_utils::error::FileSystemError;

#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(unpacker_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(unpacker_package::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("Invalid desktop entry: {0}")]
    #[diagnostic(
        code(unpacker_package::desktop_entry),
        help("Desktop entry values must be a single line")
    )]
    InvalidDesktopEntry(String),
}

pub type Result<T> = std::result::Result<T, PackageError>;

/// Attaches a description of the failed action to I/O errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
