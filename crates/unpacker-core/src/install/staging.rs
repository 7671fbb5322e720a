use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;
use unpacker_package::DesktopEntry;
use unpacker_utils::fs::{copy_dir_all, create_symlink, set_executable};

use super::InstallRequest;
use crate::{error::ErrorContext, UnpackerResult};

/// Paths written into a system-wide staging root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLayout {
    pub root: PathBuf,
    /// `opt/<name>` inside the staging root.
    pub app_dir: PathBuf,
    /// `usr/bin/<name>` inside the staging root.
    pub bin_link: PathBuf,
    /// `usr/share/applications/<name>.desktop` inside the staging root.
    pub desktop_file: PathBuf,
    /// Icon copy inside `app_dir`, when one was requested.
    pub icon: Option<PathBuf>,
}

/// Builds the tree the package builder turns into a native package.
///
/// The layout mirrors the installed filesystem: the application lands in
/// `/opt/<name>`, a launcher symlink in `/usr/bin/<name>` points at the
/// executable there, and the desktop entry is written last.
pub fn stage_system_layout(request: &InstallRequest, staging_root: &Path) -> UnpackerResult<StagedLayout> {
    let name = request.identity.name();
    let relative = request.relative_executable()?;
    let icon = request.icon_target()?;

    let app_dir = staging_root.join("opt").join(name);
    let installed_dir = Path::new("/opt").join(name);

    copy_dir_all(&request.source_tree, &app_dir)?;
    set_executable(app_dir.join(&relative))?;
    debug!(app_dir = %app_dir.display(), "copied application tree");

    let staged_icon = match &icon {
        Some((source, file_name)) => {
            let target = app_dir.join(file_name);
            fs::copy(source, &target)
                .with_context(|| format!("copying icon {}", source.display()))?;
            Some(target)
        }
        None => None,
    };

    let bin_link = staging_root.join("usr/bin").join(name);
    create_symlink(installed_dir.join(&relative), &bin_link)?;

    let mut entry = DesktopEntry::new(name, format!("/usr/bin/{name}"))
        .with_categories(request.categories.as_str());
    if let Some((_, file_name)) = &icon {
        entry = entry.with_icon(installed_dir.join(file_name).to_string_lossy());
    }
    let desktop_file = staging_root
        .join("usr/share/applications")
        .join(format!("{name}.desktop"));
    entry.write_to(&desktop_file)?;

    Ok(StagedLayout {
        root: staging_root.to_path_buf(),
        app_dir,
        bin_link,
        desktop_file,
        icon: staged_icon,
    })
}
