use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};
use unpacker_utils::path::{resolve_path, xdg_config_home};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_PACKAGE_BUILDER: &str = "fpm";
pub const DEFAULT_ESCALATION_HELPER: &str = "pkexec";
pub const DEFAULT_CATEGORIES: &str = "Utility;";

/// unpacker configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Directory in which per-install working directories are created.
    /// Override: UNPACKER_TEMP_ROOT
    /// Default: the system temporary directory
    pub temp_root: Option<String>,

    /// Package builder invoked for system-wide installs.
    /// Default: fpm
    pub package_builder: Option<String>,

    /// Helper used to run the host package manager with elevated privileges.
    /// It is skipped when unpacker already runs as root.
    /// Default: pkexec
    pub escalation_helper: Option<String>,

    /// Root under which user-local applications are copied, one directory per app.
    /// Override: UNPACKER_APPS
    /// Default: $XDG_DATA_HOME/unpacker/apps
    pub apps_path: Option<String>,

    /// Directory receiving launcher symlinks for user-local installs.
    /// Override: UNPACKER_BIN
    /// Default: ~/.local/bin
    pub bin_path: Option<String>,

    /// Directory receiving .desktop entries for user-local installs.
    /// Default: $XDG_DATA_HOME/applications
    pub desktop_path: Option<String>,

    /// Install system-wide as a native package unless --user is given.
    /// Default: true
    pub system_wide: Option<bool>,

    /// Categories written into generated desktop entries.
    /// Default: Utility;
    pub categories: Option<String>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("UNPACKER_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home().join("unpacker").join("config.toml"),
    })
});

/// Loads the configuration file into the global slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// Returns the loaded configuration, or defaults when [`init`] was never called.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut slot = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    slot.get_or_insert_with(Config::default_config).clone()
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_config_path<P: AsRef<Path>>(path: P) {
    *CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner) = path.as_ref().to_path_buf();
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            temp_root: Some(std::env::temp_dir().display().to_string()),
            package_builder: Some(DEFAULT_PACKAGE_BUILDER.to_string()),
            escalation_helper: Some(DEFAULT_ESCALATION_HELPER.to_string()),
            apps_path: Some("$XDG_DATA_HOME/unpacker/apps".to_string()),
            bin_path: Some("~/.local/bin".to_string()),
            desktop_path: Some("$XDG_DATA_HOME/applications".to_string()),
            system_wide: Some(true),
            categories: Some(DEFAULT_CATEGORIES.to_string()),
        }
    }

    /// Reads the file at [`config_path`], falling back to defaults when it is absent.
    pub fn new() -> Result<Self> {
        let path = config_path();

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    /// Fills unset keys with defaults and rejects blank tool names.
    pub fn resolve(&mut self) -> Result<()> {
        let defaults = Self::default_config();

        if self.package_builder.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ConfigError::EmptyTool("package_builder"));
        }
        if self.escalation_helper.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ConfigError::EmptyTool("escalation_helper"));
        }

        self.temp_root = self.temp_root.take().or(defaults.temp_root);
        self.package_builder = self.package_builder.take().or(defaults.package_builder);
        self.escalation_helper = self.escalation_helper.take().or(defaults.escalation_helper);
        self.apps_path = self.apps_path.take().or(defaults.apps_path);
        self.bin_path = self.bin_path.take().or(defaults.bin_path);
        self.desktop_path = self.desktop_path.take().or(defaults.desktop_path);
        self.system_wide.get_or_insert(true);
        self.categories
            .get_or_insert_with(|| DEFAULT_CATEGORIES.to_string());

        Ok(())
    }

    fn resolve_key(
        &self,
        env_key: Option<&str>,
        value: Option<&str>,
        default: &str,
    ) -> Result<PathBuf> {
        if let Some(path) = env_key.and_then(env_override) {
            return Ok(resolve_path(&path)?);
        }
        Ok(resolve_path(value.unwrap_or(default))?)
    }

    pub fn get_temp_root(&self) -> Result<PathBuf> {
        if let Some(path) = env_override("UNPACKER_TEMP_ROOT") {
            return Ok(resolve_path(&path)?);
        }
        match &self.temp_root {
            Some(path) => Ok(resolve_path(path)?),
            None => Ok(std::env::temp_dir()),
        }
    }

    pub fn get_apps_path(&self) -> Result<PathBuf> {
        self.resolve_key(
            Some("UNPACKER_APPS"),
            self.apps_path.as_deref(),
            "$XDG_DATA_HOME/unpacker/apps",
        )
    }

    pub fn get_bin_path(&self) -> Result<PathBuf> {
        self.resolve_key(Some("UNPACKER_BIN"), self.bin_path.as_deref(), "~/.local/bin")
    }

    pub fn get_desktop_path(&self) -> Result<PathBuf> {
        self.resolve_key(None, self.desktop_path.as_deref(), "$XDG_DATA_HOME/applications")
    }

    pub fn package_builder(&self) -> &str {
        self.package_builder
            .as_deref()
            .unwrap_or(DEFAULT_PACKAGE_BUILDER)
    }

    pub fn escalation_helper(&self) -> &str {
        self.escalation_helper
            .as_deref()
            .unwrap_or(DEFAULT_ESCALATION_HELPER)
    }

    pub fn system_wide(&self) -> bool {
        self.system_wide.unwrap_or(true)
    }

    pub fn categories(&self) -> &str {
        self.categories.as_deref().unwrap_or(DEFAULT_CATEGORIES)
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.to_annotated_document()?.to_string())?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Serializes to TOML with each key preceded by its documentation.
    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let mut doc = toml::to_string_pretty(self)?.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut())?;
        Ok(doc)
    }
}

/// Writes the documented default configuration to [`config_path`].
///
/// Never overwrites: an existing file yields [`ConfigError::ConfigAlreadyExists`].
pub fn generate_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let doc = Config::default_config().to_annotated_document()?;
    fs::write(&path, doc.to_string())?;

    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(path)
}
