//! The two installation strategies and the pieces they share.

mod package_manager;
mod staging;
mod system;
mod user;

use std::path::{Path, PathBuf};

pub use package_manager::PackageManager;
pub use staging::{stage_system_layout, StagedLayout};
pub use system::{SystemInstallReport, SystemInstaller};
pub use user::{InstallPlan, UserInstaller};

use crate::{identity::AppIdentity, UnpackerError, UnpackerResult};

/// Everything an installer needs about the application being installed.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Root of the extracted archive.
    pub source_tree: PathBuf,
    /// Detected executable; must live inside `source_tree`.
    pub executable: PathBuf,
    pub identity: AppIdentity,
    pub icon: Option<PathBuf>,
    pub categories: String,
}

impl InstallRequest {
    /// Path of the executable relative to the source tree.
    pub fn relative_executable(&self) -> UnpackerResult<PathBuf> {
        self.executable
            .strip_prefix(&self.source_tree)
            .map(Path::to_path_buf)
            .map_err(|_| {
                UnpackerError::InvalidSource(format!(
                    "{} is outside {}",
                    self.executable.display(),
                    self.source_tree.display()
                ))
            })
    }

    /// The icon path and the `icon.<ext>` name it is installed under.
    ///
    /// Fails when an icon was requested but does not exist.
    pub fn icon_target(&self) -> UnpackerResult<Option<(PathBuf, String)>> {
        let Some(icon) = &self.icon else {
            return Ok(None);
        };
        if !icon.is_file() {
            return Err(UnpackerError::IconNotFound(icon.clone()));
        }
        let ext = icon
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "png".to_string());
        Ok(Some((icon.clone(), format!("icon.{ext}"))))
    }
}

/// Strategy steps reported to the caller as they start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    Staging,
    Building,
    Copying,
    Installing,
}

/// Called before each [`InstallStep`]. Returning an error aborts the install,
/// which is how callers cancel between steps.
pub type StepObserver<'a> = &'a mut (dyn FnMut(InstallStep) -> UnpackerResult<()> + Send);

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn request(root: &Path) -> InstallRequest {
        InstallRequest {
            source_tree: root.join("extracted"),
            executable: root.join("extracted/app/bin/app"),
            identity: AppIdentity::new("app", "1.0"),
            icon: None,
            categories: "Utility;".into(),
        }
    }

    #[test]
    fn test_relative_executable() {
        let req = request(Path::new("/w"));
        assert_eq!(req.relative_executable().unwrap(), PathBuf::from("app/bin/app"));

        let outside = InstallRequest {
            executable: PathBuf::from("/elsewhere/app"),
            ..req
        };
        assert!(matches!(
            outside.relative_executable(),
            Err(UnpackerError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_icon_target() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("Logo.SVG");
        fs::write(&icon, b"<svg/>").unwrap();

        let mut req = request(dir.path());
        assert!(req.icon_target().unwrap().is_none());

        req.icon = Some(icon.clone());
        assert_eq!(req.icon_target().unwrap(), Some((icon, "icon.svg".to_string())));

        req.icon = Some(dir.path().join("missing.png"));
        assert!(matches!(req.icon_target(), Err(UnpackerError::IconNotFound(_))));
    }
}
