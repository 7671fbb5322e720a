use std::{
    fs,
    os::unix::fs::{symlink, PermissionsExt},
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates `path` and its parents unless it is already a directory.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if creation fails.
/// * [`FileSystemError::NotADirectory`] if something else already lives at `path`.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    fs::create_dir_all(path).map_err(|err| {
        FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        }
    })
}

/// Recursively walks `dir`, invoking `action` on every non-directory entry.
///
/// Entries are visited in lexicographic order so repeated walks over the same tree produce the
/// same sequence. Symlinks are reported as entries and never followed. A missing `dir` is
/// treated as empty.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if a directory cannot be read.
/// * Any error returned by `action`.
pub fn walk_dir<P, F, E>(dir: P, action: &mut F) -> Result<(), E>
where
    P: AsRef<Path>,
    F: FnMut(&Path) -> Result<(), E>,
    E: From<FileSystemError>,
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<PathBuf>>>()
        })
        .map_err(|err| {
            FileSystemError::Directory {
                path: dir.to_path_buf(),
                action: "read",
                source: err,
            }
        })?;
    entries.sort();

    for path in entries {
        if path.is_dir() && !path.is_symlink() {
            walk_dir(&path, action)?;
        } else {
            action(&path)?;
        }
    }

    Ok(())
}

/// Copies the contents of `src` into `dst`, creating `dst` as needed.
///
/// Regular files keep their permission bits and symlinks are recreated verbatim (the link
/// target is not resolved).
pub fn copy_dir_all<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> FileSystemResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    ensure_dir_exists(dst)?;

    let entries = fs::read_dir(src).map_err(|err| {
        FileSystemError::Directory {
            path: src.to_path_buf(),
            action: "read",
            source: err,
        }
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| {
            FileSystemError::Directory {
                path: src.to_path_buf(),
                action: "read",
                source: err,
            }
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if from.is_symlink() {
            let target = fs::read_link(&from).map_err(|err| {
                FileSystemError::File {
                    path: from.clone(),
                    action: "read link",
                    source: err,
                }
            })?;
            create_symlink(&target, &to)?;
        } else if from.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|err| {
                FileSystemError::File {
                    path: from.clone(),
                    action: "copy",
                    source: err,
                }
            })?;
        }
    }

    Ok(())
}

/// Creates a symlink at `link` pointing to `target`.
///
/// Parent directories of `link` are created first. An existing symlink at `link` is replaced;
/// any other existing file is left alone and reported as an error.
pub fn create_symlink<P: AsRef<Path>, Q: AsRef<Path>>(target: P, link: Q) -> FileSystemResult<()> {
    let target = target.as_ref();
    let link = link.as_ref();

    if let Some(parent) = link.parent() {
        ensure_dir_exists(parent)?;
    }

    if link.is_symlink() {
        fs::remove_file(link).map_err(|err| {
            FileSystemError::File {
                path: link.to_path_buf(),
                action: "remove",
                source: err,
            }
        })?;
    }

    symlink(target, link).map_err(|err| {
        FileSystemError::Symlink {
            from: target.to_path_buf(),
            target: link.to_path_buf(),
            source: err,
        }
    })
}

/// Sets `rwxr-xr-x` permissions on `path`.
pub fn set_executable<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|err| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "chmod",
            source: err,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("new_dir");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_already_exists() {
        let dir = tempdir().unwrap();
        ensure_dir_exists(dir.path()).unwrap();
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(ensure_dir_exists(&file_path).is_err());
    }

    #[test]
    fn test_walk_dir_is_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b/nested/d.txt"), "d").unwrap();

        let mut seen = Vec::new();
        walk_dir(dir.path(), &mut |path: &Path| -> FileSystemResult<()> {
            seen.push(path.strip_prefix(dir.path()).unwrap().to_path_buf());
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b/nested/d.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_walk_dir_missing_dir() {
        let dir = tempdir().unwrap();
        let mut count = 0;
        walk_dir(dir.path().join("missing"), &mut |_: &Path| -> FileSystemResult<()> {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_copy_dir_all_preserves_tree_and_links() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/tool"), "#!/bin/sh\n").unwrap();
        set_executable(src.join("bin/tool")).unwrap();
        symlink("bin/tool", src.join("tool-link")).unwrap();

        let dst = dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("bin/tool")).unwrap(), "#!/bin/sh\n");
        let mode = fs::metadata(dst.join("bin/tool")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(
            fs::read_link(dst.join("tool-link")).unwrap(),
            PathBuf::from("bin/tool")
        );
    }

    #[test]
    fn test_create_symlink_replaces_existing_link() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("usr/bin/app");

        create_symlink("/opt/old/app", &link).unwrap();
        create_symlink("/opt/new/app", &link).unwrap();

        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("/opt/new/app"));
    }

    #[test]
    fn test_create_symlink_refuses_regular_file() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("app");
        fs::write(&link, "not a link").unwrap();

        assert!(create_symlink("/opt/app/app", &link).is_err());
        assert_eq!(fs::read_to_string(&link).unwrap(), "not a link");
    }
}
