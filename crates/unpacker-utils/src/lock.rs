//! Advisory `flock` guards on source archives.
//!
//! Two installer processes pointed at the same archive would race on the same
//! staging names and package artifacts, so each run holds an exclusive lock on
//! the archive file itself for as long as it works on it. The lock follows the
//! inode, so every spelling of a path (relative, `..`, symlinked) shares it and
//! distinct files never do.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};

use crate::error::{LockError, LockResult};

/// Exclusive lock released on drop.
pub struct FileLock {
    _file: Flock<File>,
    path: PathBuf,
}

impl FileLock {
    /// Locks `archive`, opened read-only. Returns `Ok(None)` when another
    /// holder already owns it.
    ///
    /// # Errors
    ///
    /// [`LockError::Io`] when the archive cannot be opened.
    pub fn try_acquire(archive: &Path) -> LockResult<Option<Self>> {
        let file = File::open(archive)?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(Self {
                    _file: file,
                    path: archive.to_path_buf(),
                }))
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, err)) => {
                Err(LockError::AcquireFailed(format!(
                    "{}: {err}",
                    archive.display()
                )))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
