use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum PathError {
    CurrentDir { source: std::io::Error },

    Empty,

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "Path is empty"),
            PathError::CurrentDir { source } => {
                write!(f, "Failed to get current directory: {source}")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "Unclosed variable expression starting at `{input}`")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "Environment variable `{var}` not set in `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum FileSystemError {
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Symlink {
        from: PathBuf,
        target: PathBuf,
        source: std::io::Error,
    },

    NotADirectory {
        path: PathBuf,
    },
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::File {
                path,
                action,
                source,
            } => {
                write!(f, "Failed to {action} file `{}`: {source}", path.display())
            }
            FileSystemError::Directory {
                path,
                action,
                source,
            } => {
                write!(
                    f,
                    "Failed to {action} directory `{}`: {source}",
                    path.display()
                )
            }
            FileSystemError::Symlink {
                from,
                target,
                source,
            } => {
                write!(
                    f,
                    "Failed to link `{}` -> `{}`: {source}",
                    from.display(),
                    target.display()
                )
            }
            FileSystemError::NotADirectory { path } => {
                write!(f, "`{}` is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::File { source, .. } => Some(source),
            FileSystemError::Directory { source, .. } => Some(source),
            FileSystemError::Symlink { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum LockError {
    Io(std::io::Error),

    AcquireFailed(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Io(err) => write!(f, "Archive lock I/O error: {err}"),
            LockError::AcquireFailed(reason) => write!(f, "Failed to acquire lock: {reason}"),
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LockError::Io(err) => Some(err),
            LockError::AcquireFailed(_) => None,
        }
    }
}

impl From<std::io::Error> for LockError {
    fn from(err: std::io::Error) -> Self {
        LockError::Io(err)
    }
}

#[derive(Debug)]
pub enum UtilsError {
    Path(PathError),
    FileSystem(FileSystemError),
    Lock(LockError),
}

impl fmt::Display for UtilsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilsError::Path(err) => write!(f, "{err}"),
            UtilsError::FileSystem(err) => write!(f, "{err}"),
            UtilsError::Lock(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UtilsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UtilsError::Path(err) => Some(err),
            UtilsError::FileSystem(err) => Some(err),
            UtilsError::Lock(err) => Some(err),
        }
    }
}

impl From<PathError> for UtilsError {
    fn from(err: PathError) -> Self {
        UtilsError::Path(err)
    }
}

impl From<FileSystemError> for UtilsError {
    fn from(err: FileSystemError) -> Self {
        UtilsError::FileSystem(err)
    }
}

impl From<LockError> for UtilsError {
    fn from(err: LockError) -> Self {
        UtilsError::Lock(err)
    }
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type LockResult<T> = std::result::Result<T, LockError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

pub type UtilsResult<T> = std::result::Result<T, UtilsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_path_error_display_and_source() {
        let io_error = io::Error::other("some error");
        let current_dir_error = PathError::CurrentDir { source: io_error };
        assert_eq!(
            current_dir_error.to_string(),
            "Failed to get current directory: some error"
        );
        assert!(current_dir_error.source().is_some());

        let empty_error = PathError::Empty;
        assert_eq!(empty_error.to_string(), "Path is empty");
        assert!(empty_error.source().is_none());

        let missing_env_var_error = PathError::MissingEnvVar {
            var: "VAR".to_string(),
            input: "$VAR".to_string(),
        };
        assert_eq!(
            missing_env_var_error.to_string(),
            "Environment variable `VAR` not set in `$VAR`"
        );
    }

    #[test]
    fn test_file_system_error_display_and_source() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let file_error = FileSystemError::File {
            path: PathBuf::from("/file"),
            action: "copy",
            source: io_error,
        };
        assert_eq!(
            file_error.to_string(),
            "Failed to copy file `/file`: permission denied"
        );
        assert!(file_error.source().is_some());

        let link_error = FileSystemError::Symlink {
            from: PathBuf::from("/opt/app/bin/app"),
            target: PathBuf::from("/usr/bin/app"),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "exists"),
        };
        assert_eq!(
            link_error.to_string(),
            "Failed to link `/opt/app/bin/app` -> `/usr/bin/app`: exists"
        );

        let not_a_dir_error = FileSystemError::NotADirectory {
            path: PathBuf::from("/path"),
        };
        assert_eq!(not_a_dir_error.to_string(), "`/path` is not a directory");
        assert!(not_a_dir_error.source().is_none());
    }

    #[test]
    fn test_utils_error_from() {
        let utils_error = UtilsError::from(PathError::Empty);
        assert_eq!(utils_error.to_string(), "Path is empty");
        assert!(utils_error.source().is_some());

        let utils_error = UtilsError::from(LockError::AcquireFailed("busy".into()));
        assert_eq!(utils_error.to_string(), "Failed to acquire lock: busy");
    }
}
