use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, warn};
use unpacker_utils::fs::ensure_dir_exists;

use crate::{
    constants::{INSTALL_SCRIPT_NAME, WORKDIR_PREFIX},
    error::ErrorContext,
    UnpackerResult,
};

/// Scratch tree owned by exactly one install attempt.
///
/// ```text
/// <temp_root>/unpacker-XXXXXX/
///   extracted/   archive contents
///   staging/     system-wide package root
///   out/         package builder output
///   install.sh   user-local install script
/// ```
///
/// Removed by [`WorkingDirectory::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    guard: Option<TempDir>,
}

impl WorkingDirectory {
    /// Creates a fresh, uniquely named directory under `temp_root`.
    pub fn create<P: AsRef<Path>>(temp_root: P) -> UnpackerResult<Self> {
        let temp_root = temp_root.as_ref();
        ensure_dir_exists(temp_root)?;

        let guard = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(temp_root)
            .with_context(|| format!("creating working directory in {}", temp_root.display()))?;
        let path = guard.path().to_path_buf();
        debug!(path = %path.display(), "created working directory");

        Ok(Self {
            path,
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extracted(&self) -> PathBuf {
        self.path.join("extracted")
    }

    pub fn staging(&self) -> PathBuf {
        self.path.join("staging")
    }

    pub fn output(&self) -> PathBuf {
        self.path.join("out")
    }

    pub fn script_path(&self) -> PathBuf {
        self.path.join(INSTALL_SCRIPT_NAME)
    }

    /// Deletes the tree now, reporting failure instead of swallowing it.
    pub fn release(mut self) -> UnpackerResult<()> {
        match self.guard.take() {
            Some(guard) => remove(guard),
            None => Ok(()),
        }
    }
}

fn remove(guard: TempDir) -> UnpackerResult<()> {
    let path = guard.path().to_path_buf();
    // Archives regularly ship read-only directories; unlock them first so the
    // tree can be removed without root.
    relax_permissions(&path);
    guard
        .close()
        .with_context(|| format!("removing working directory {}", path.display()))?;
    debug!(path = %path.display(), "removed working directory");
    Ok(())
}

fn relax_permissions(dir: &Path) {
    let Ok(meta) = fs::symlink_metadata(dir) else {
        return;
    };
    if !meta.is_dir() {
        return;
    }
    let mode = meta.permissions().mode();
    if mode & 0o700 != 0o700 {
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o700));
    }
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            relax_permissions(&entry.path());
        }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            if let Err(err) = remove(guard) {
                warn!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_release() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkingDirectory::create(root.path()).unwrap();
        let path = work.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("unpacker-"));
        assert_eq!(work.extracted(), path.join("extracted"));
        assert_eq!(work.script_path(), path.join("install.sh"));

        fs::create_dir_all(work.extracted().join("a/b")).unwrap();
        work.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_tree() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkingDirectory::create(root.path()).unwrap();
            fs::write(work.path().join("file"), b"x").unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_unique_per_attempt() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkingDirectory::create(root.path()).unwrap();
        let b = WorkingDirectory::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_release_handles_read_only_directories() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkingDirectory::create(root.path()).unwrap();
        let locked = work.extracted().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("file"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let path = work.path().to_path_buf();
        work.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_missing_temp_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("not/yet/there");
        let work = WorkingDirectory::create(&nested).unwrap();
        assert!(work.path().starts_with(&nested));
    }
}
