//! Constants used throughout unpacker-core.

/// Name used when nothing usable survives sanitisation of the archive stem.
pub const FALLBACK_APP_NAME: &str = "unpacked-app";

/// Version used when the archive name carries no version number.
pub const FALLBACK_VERSION: &str = "1.0.0";

/// How many file names a `NoExecutableFound` error lists.
pub const DIAGNOSTIC_SAMPLE_LEN: usize = 20;

/// Prefix for per-attempt working directories.
pub const WORKDIR_PREFIX: &str = "unpacker-";

/// Name of the generated user-local install script inside the working directory.
pub const INSTALL_SCRIPT_NAME: &str = "install.sh";

/// Desktop entry categories when none are configured.
pub const DEFAULT_CATEGORIES: &str = "Utility;";
