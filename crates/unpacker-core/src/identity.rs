//! Application name and version inferred from an archive's file name.

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use unpacker_utils::string::sanitize_name;

use crate::{
    constants::{FALLBACK_APP_NAME, FALLBACK_VERSION},
    extract::split_archive_suffix,
};

// MAJOR.MINOR[.PATCH] with an optional `-alpha`/`-beta.2`/`-rc1` style tag.
// Arbitrary `-suffix` is not accepted so that `1.0-x86_64` stays `1.0`.
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\.\d+(?:\.\d+)?(?:-(?:alpha|beta|rc|pre|preview|dev)[0-9a-z]*(?:\.[0-9a-z]+)*)?")
        .expect("version regex is valid")
});

/// Sanitised name and version of the application being installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    name: String,
    version: String,
}

impl AppIdentity {
    /// Builds an identity, applying the same sanitisation as [`infer`].
    ///
    /// Names keep only `[a-z0-9_-]` after lowercasing. Versions keep
    /// `[A-Za-z0-9.+~_-]`. Either falls back to its default when nothing
    /// survives.
    pub fn new(name: &str, version: &str) -> Self {
        let version: String = version
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | '_' | '-'))
            .collect();

        Self {
            name: sanitize_name(name).unwrap_or_else(|| FALLBACK_APP_NAME.to_string()),
            version: if version.is_empty() {
                FALLBACK_VERSION.to_string()
            } else {
                version
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Applies optional user overrides on top of an inferred identity.
    pub fn with_overrides(&self, name: Option<&str>, version: Option<&str>) -> Self {
        Self::new(
            name.unwrap_or(&self.name),
            version.unwrap_or(&self.version),
        )
    }
}

/// Strips the archive suffix from `file_name`, leaving it untouched when the
/// suffix is not recognised.
pub fn archive_stem(file_name: &str) -> &str {
    split_archive_suffix(file_name).map_or(file_name, |(stem, _)| stem)
}

/// Infers an [`AppIdentity`] from an archive file name.
///
/// ```
/// use unpacker_core::identity::infer;
///
/// let id = infer("MyApp-2.5.1.tar.gz");
/// assert_eq!(id.version(), "2.5.1");
/// assert_eq!(id.name(), "myapp-251");
/// ```
pub fn infer(file_name: &str) -> AppIdentity {
    let stem = archive_stem(file_name);
    let version = VERSION_RE
        .find(stem)
        .map_or(FALLBACK_VERSION, |m| m.as_str());
    AppIdentity::new(stem, version)
}

/// [`infer`] applied to the last component of `path`.
pub fn infer_from_path<P: AsRef<Path>>(path: P) -> AppIdentity {
    let file_name = path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    infer(&file_name)
}
