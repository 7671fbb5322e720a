//! The archive-to-installed-application pipeline stages.
//!
//! Each stage is usable on its own: [`extract::extract`] unpacks an archive,
//! [`identity::infer`] derives a name and version from its file name,
//! [`detect::detect`] picks the primary executable, and the installers in
//! [`install`] put it on the host. Sequencing, logging and cleanup live in
//! `unpacker-operations`.

pub mod command;
pub mod constants;
pub mod detect;
pub mod error;
pub mod extract;
pub mod identity;
pub mod install;
pub mod workdir;

pub use error::UnpackerError;

pub type UnpackerResult<T> = std::result::Result<T, UnpackerError>;
