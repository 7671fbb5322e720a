use std::sync::PoisonError;

use tracing::{debug, warn};
use unpacker_core::{
    command::CommandRunner,
    detect::ExecutableCandidate,
    identity::AppIdentity,
    install::{InstallRequest, InstallStep, SystemInstaller, UserInstaller},
    workdir::WorkingDirectory,
    UnpackerError, UnpackerResult,
};
use unpacker_events::PipelineStage;

use crate::{
    context::Held,
    progress::Attempt,
    transcript::Transcript,
    types::{Analysis, InstallOptions, InstallOutcome, InstallStatus, InstalledApp, InstalledTo},
    Unpacker,
};

impl<R: CommandRunner> Unpacker<R> {
    /// Installs an analysed archive and removes its working directory,
    /// whatever the result.
    pub async fn install(&self, analysis: Analysis, options: InstallOptions) -> InstallOutcome {
        let Analysis {
            identity,
            executable,
            mut attempt,
            held,
            ..
        } = analysis;

        let parked = held.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Held {
            workdir,
            flight: _flight,
        }) = parked
        else {
            let (err, transcript) = abort(attempt, None, UnpackerError::Superseded);
            return InstallOutcome {
                status: InstallStatus::Failure(err),
                transcript,
            };
        };

        let identity = identity.with_overrides(options.name.as_deref(), options.version.as_deref());
        let result = self
            .install_in(&workdir, &mut attempt, identity, executable, &options)
            .await;

        match result {
            Ok(app) => {
                attempt.succeed();
                release_workdir(workdir, &attempt.transcript);
                attempt.finish(None);
                InstallOutcome {
                    status: InstallStatus::Success(app),
                    transcript: attempt.transcript.lines(),
                }
            }
            Err(err) => {
                let (err, transcript) = abort(attempt, Some(workdir), err);
                InstallOutcome {
                    status: InstallStatus::Failure(err),
                    transcript,
                }
            }
        }
    }

    async fn install_in(
        &self,
        workdir: &WorkingDirectory,
        attempt: &mut Attempt,
        identity: AppIdentity,
        executable: ExecutableCandidate,
        options: &InstallOptions,
    ) -> UnpackerResult<InstalledApp> {
        let system_wide = options
            .system_wide
            .unwrap_or_else(|| self.config.system_wide());
        let request = InstallRequest {
            source_tree: workdir.extracted(),
            executable: executable.path,
            identity: identity.clone(),
            icon: options.icon.clone(),
            categories: self.config.categories().to_string(),
        };
        // fail before any stage runs rather than halfway through staging
        request.icon_target()?;

        let builder = self.config.package_builder().to_string();
        let mut on_step = |step: InstallStep| -> UnpackerResult<()> {
            let (stage, message) = match step {
                InstallStep::Staging => (PipelineStage::Staging, "Staging files".to_string()),
                InstallStep::Building => {
                    (PipelineStage::Building, format!("Building package with {builder}"))
                }
                InstallStep::Copying => {
                    (PipelineStage::Copying, "Running install script".to_string())
                }
                InstallStep::Installing => {
                    (PipelineStage::Installing, "Installing package".to_string())
                }
            };
            attempt.enter(stage)?;
            attempt.transcript.info(&message);
            Ok(())
        };

        let location = if system_wide {
            let installer = SystemInstaller::new(
                self.config.package_builder(),
                self.config.escalation_helper(),
            );
            let report = installer
                .install(
                    &self.runner,
                    &request,
                    &workdir.staging(),
                    &workdir.output(),
                    &mut on_step,
                )
                .await?;
            InstalledTo::System(report)
        } else {
            let installer = UserInstaller::new(
                self.config.get_apps_path()?,
                self.config.get_bin_path()?,
                self.config.get_desktop_path()?,
            );
            let plan = installer
                .install(&self.runner, &request, &workdir.script_path(), &mut on_step)
                .await?;
            InstalledTo::User(plan)
        };

        let summary = match &location {
            InstalledTo::System(report) => {
                format!(
                    "Installed {} {} via {}",
                    identity.name(),
                    identity.version(),
                    report.package_manager
                )
            }
            InstalledTo::User(plan) => {
                format!(
                    "Installed {} {} to {}",
                    identity.name(),
                    identity.version(),
                    plan.app_dir.display()
                )
            }
        };
        attempt.transcript.info(&summary);

        Ok(InstalledApp {
            identity,
            location,
        })
    }
}

/// Fails the attempt, removes the working directory and reports the end of
/// the run. Returns the error and the full transcript.
pub(crate) fn abort(
    mut attempt: Attempt,
    workdir: Option<WorkingDirectory>,
    err: UnpackerError,
) -> (UnpackerError, Vec<String>) {
    attempt.fail(&err);
    if let Some(workdir) = workdir {
        release_workdir(workdir, &attempt.transcript);
    }
    attempt.finish(Some(&err));
    (err, attempt.transcript.lines())
}

/// Best effort: a failed removal is logged, never returned.
pub(crate) fn release_workdir(workdir: WorkingDirectory, transcript: &Transcript) {
    let path = workdir.path().to_path_buf();
    match workdir.release() {
        Ok(()) => debug!(path = %path.display(), "working directory removed"),
        Err(err) => {
            warn!(path = %path.display(), "{err}");
            transcript.warn(&format!("Could not remove {}: {err}", path.display()));
        }
    }
}
