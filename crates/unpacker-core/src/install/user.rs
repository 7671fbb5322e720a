use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use unpacker_package::DesktopEntry;
use unpacker_utils::{fs::set_executable, string::shell_quote};

use super::{InstallRequest, InstallStep, StepObserver};
use crate::{
    command::{CommandRunner, CommandSpec},
    error::ErrorContext,
    UnpackerResult,
};

const DESKTOP_HEREDOC: &str = "UNPACKER_DESKTOP_ENTRY";

/// Where a user-local install puts each piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub source_tree: PathBuf,
    /// `<apps>/<name>`, receives a copy of the extracted tree.
    pub app_dir: PathBuf,
    /// Executable inside `app_dir`.
    pub executable: PathBuf,
    /// `<bin>/<name>`, symlink to `executable`.
    pub bin_link: PathBuf,
    /// `<applications>/<name>.desktop`.
    pub desktop_file: PathBuf,
    /// Icon source and its destination inside `app_dir`.
    pub icon: Option<(PathBuf, PathBuf)>,
    pub entry: DesktopEntry,
}

/// Installs into per-user directories without privileges.
#[derive(Debug, Clone)]
pub struct UserInstaller {
    pub apps_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub desktop_dir: PathBuf,
}

impl UserInstaller {
    pub fn new<A, B, D>(apps_dir: A, bin_dir: B, desktop_dir: D) -> Self
    where
        A: Into<PathBuf>,
        B: Into<PathBuf>,
        D: Into<PathBuf>,
    {
        Self {
            apps_dir: apps_dir.into(),
            bin_dir: bin_dir.into(),
            desktop_dir: desktop_dir.into(),
        }
    }

    pub fn plan(&self, request: &InstallRequest) -> UnpackerResult<InstallPlan> {
        let name = request.identity.name();
        let relative = request.relative_executable()?;
        let app_dir = self.apps_dir.join(name);
        let executable = app_dir.join(&relative);
        let bin_link = self.bin_dir.join(name);

        let icon = request
            .icon_target()?
            .map(|(source, file_name)| (source, app_dir.join(file_name)));

        let mut entry = DesktopEntry::new(name, bin_link.to_string_lossy())
            .with_categories(request.categories.as_str());
        if let Some((_, target)) = &icon {
            entry = entry.with_icon(target.to_string_lossy());
        }

        Ok(InstallPlan {
            source_tree: request.source_tree.clone(),
            desktop_file: self.desktop_dir.join(format!("{name}.desktop")),
            app_dir,
            executable,
            bin_link,
            icon,
            entry,
        })
    }

    /// Renders `plan` as a standalone bash script.
    ///
    /// Every path is quoted. The launcher symlink and the desktop entry come
    /// last so a failed copy never leaves a dangling menu item.
    pub fn render_script(&self, plan: &InstallPlan) -> String {
        let q = |path: &Path| shell_quote(&path.to_string_lossy());
        let app_dir = q(&plan.app_dir);

        let mut lines = vec![
            "#!/usr/bin/env bash".to_string(),
            format!("# Installs {} for the current user.", plan.entry.name),
            "set -euo pipefail".to_string(),
            String::new(),
            format!(
                "mkdir -p {} {} {}",
                q(&self.apps_dir),
                q(&self.bin_dir),
                q(&self.desktop_dir)
            ),
            format!("rm -rf -- {app_dir}"),
            format!("mkdir -p -- {app_dir}"),
            format!("cp -a -- {}/. {app_dir}/", q(&plan.source_tree)),
            format!("chmod 755 -- {}", q(&plan.executable)),
        ];
        if let Some((source, target)) = &plan.icon {
            lines.push(format!("cp -- {} {}", q(source), q(target)));
        }
        lines.push(format!(
            "ln -sfn -- {} {}",
            q(&plan.executable),
            q(&plan.bin_link)
        ));
        lines.push(format!(
            "cat > {} <<'{DESKTOP_HEREDOC}'",
            q(&plan.desktop_file)
        ));
        lines.extend(plan.entry.render().lines().map(str::to_string));
        lines.push(DESKTOP_HEREDOC.to_string());

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }

    /// Plans, writes the script to `script_path`, and runs it with `bash`.
    pub async fn install<R: CommandRunner>(
        &self,
        runner: &R,
        request: &InstallRequest,
        script_path: &Path,
        on_step: StepObserver<'_>,
    ) -> UnpackerResult<InstallPlan> {
        on_step(InstallStep::Staging)?;
        let plan = self.plan(request)?;
        plan.entry.validate()?;

        let script = self.render_script(&plan);
        fs::write(script_path, &script)
            .with_context(|| format!("writing install script {}", script_path.display()))?;
        set_executable(script_path)?;
        debug!(script = %script_path.display(), "install script written");

        on_step(InstallStep::Copying)?;
        runner
            .run(&CommandSpec::new("bash").arg(script_path))
            .await?;
        info!(app_dir = %plan.app_dir.display(), "installed for current user");

        Ok(plan)
    }
}
