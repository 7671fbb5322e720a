//! Package-level building blocks for unpacker.
//!
//! - [`classify_file`] sniffs ELF binaries and `#!` scripts by their leading bytes.
//! - [`DesktopEntry`] renders and writes launcher entries.
//! - [`PackageFormat`] describes the native package formats the builder can emit.
//!
//! # Example
//!
//! ```no_run
//! use unpacker_package::{classify_file, FileKind};
//!
//! if let Ok(Some(FileKind::Elf)) = classify_file("/opt/app/bin/app") {
//!     println!("ELF binary");
//! }
//! ```

pub mod desktop;
pub mod error;
pub mod formats;

pub use desktop::DesktopEntry;
pub use error::{ErrorContext, PackageError, Result};
pub use formats::{classify_file, get_file_type, FileKind, PackageFormat, ELF_MAGIC_BYTES};
