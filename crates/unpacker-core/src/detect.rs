//! Heuristic selection of the application's main executable.
//!
//! Selection order, first match wins:
//!
//! 1. ELF files whose letters-only name contains, or is contained in, the
//!    letters-only app name. Shortest file name wins, so `app` beats
//!    `app-bin` and `app-wrapper`.
//! 2. The largest ELF file.
//! 3. The script with the shortest file name.
//!
//! Ties are broken by path so the result is stable for a given tree.

use std::{
    cmp::Reverse,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};
use unpacker_package::{classify_file, FileKind};
use unpacker_utils::{fs::walk_dir, string::simplify};

use crate::{constants::DIAGNOSTIC_SAMPLE_LEN, UnpackerError, UnpackerResult};

/// A file that could be the application's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCandidate {
    pub path: PathBuf,
    pub kind: FileKind,
    pub size: u64,
}

impl ExecutableCandidate {
    pub fn is_elf(&self) -> bool {
        self.kind == FileKind::Elf
    }

    pub fn is_script(&self) -> bool {
        self.kind == FileKind::Script
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// All regular files under a root, split into candidates and the rest.
#[derive(Debug, Default)]
pub struct Scan {
    pub candidates: Vec<ExecutableCandidate>,
    /// Every regular file visited, relative to the root, in walk order.
    pub files: Vec<String>,
}

/// Walks `root` in sorted order and classifies every non-empty regular file.
/// Symlinks are neither followed nor considered. Files that cannot be read
/// are listed but never become candidates.
pub fn scan<P: AsRef<Path>>(root: P) -> UnpackerResult<Scan> {
    scan_with(root.as_ref(), |path| classify_file(path))
}

fn scan_with<F, E>(root: &Path, classify: F) -> UnpackerResult<Scan>
where
    F: Fn(&Path) -> Result<Option<FileKind>, E>,
    E: std::fmt::Display,
{
    let mut scan = Scan::default();

    walk_dir(root, &mut |path: &Path| -> UnpackerResult<()> {
        let Ok(meta) = fs::symlink_metadata(path) else {
            return Ok(());
        };
        if !meta.is_file() {
            return Ok(());
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        scan.files.push(relative.to_string_lossy().into_owned());

        if meta.len() == 0 {
            return Ok(());
        }
        match classify(path) {
            Ok(Some(kind)) => {
                trace!(path = %path.display(), ?kind, "candidate");
                scan.candidates.push(ExecutableCandidate {
                    path: path.to_path_buf(),
                    kind,
                    size: meta.len(),
                });
            }
            Ok(None) => {}
            Err(err) => debug!(path = %path.display(), "skipping unreadable file: {err}"),
        }
        Ok(())
    })?;

    Ok(scan)
}

fn name_len(candidate: &ExecutableCandidate) -> usize {
    candidate.file_name().chars().count()
}

/// Picks the best candidate. Pure: depends only on the slice contents.
pub fn select<'a>(
    candidates: &'a [ExecutableCandidate],
    app_name: &str,
) -> Option<&'a ExecutableCandidate> {
    let key = simplify(app_name);
    let elves = || candidates.iter().filter(|c| c.is_elf());

    let by_name = elves()
        .filter(|c| {
            let file_key = simplify(&c.file_name());
            !key.is_empty()
                && !file_key.is_empty()
                && (file_key.contains(&key) || key.contains(&file_key))
        })
        .min_by(|a, b| name_len(a).cmp(&name_len(b)).then_with(|| a.path.cmp(&b.path)));
    if by_name.is_some() {
        return by_name;
    }

    let largest = elves().min_by(|a, b| {
        Reverse(a.size)
            .cmp(&Reverse(b.size))
            .then_with(|| a.path.cmp(&b.path))
    });
    if largest.is_some() {
        return largest;
    }

    candidates
        .iter()
        .filter(|c| c.is_script())
        .min_by(|a, b| name_len(a).cmp(&name_len(b)).then_with(|| a.path.cmp(&b.path)))
}

/// Scans `root` and selects the executable for `app_name`.
///
/// Fails with [`UnpackerError::NoExecutableFound`] carrying up to the first
/// twenty file names when nothing qualifies.
pub fn detect<P: AsRef<Path>>(root: P, app_name: &str) -> UnpackerResult<ExecutableCandidate> {
    let scan = scan(root)?;
    debug!(
        files = scan.files.len(),
        candidates = scan.candidates.len(),
        "scanned extracted tree"
    );

    select(&scan.candidates, app_name)
        .cloned()
        .ok_or_else(|| {
            UnpackerError::NoExecutableFound {
                sample: scan
                    .files
                    .into_iter()
                    .take(DIAGNOSTIC_SAMPLE_LEN)
                    .collect(),
            }
        })
}
