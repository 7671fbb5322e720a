use miette::Diagnostic;
use thiserror::Error;
use unpacker_utils::error::{FileSystemError, PathError, UtilsError};

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(unpacker_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(unpacker_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(unpacker_config::already_exists),
        help("Remove the existing config file or point UNPACKER_CONFIG elsewhere")
    )]
    ConfigAlreadyExists,

    #[error("`{0}` must name an executable")]
    #[diagnostic(
        code(unpacker_config::empty_tool),
        help("Set it to a program on PATH, or remove the key to use the default")
    )]
    EmptyTool(&'static str),

    #[error("IO error: {0}")]
    #[diagnostic(code(unpacker_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(unpacker_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(unpacker_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(unpacker_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
