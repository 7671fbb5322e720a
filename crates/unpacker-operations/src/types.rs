use std::{
    path::{Path, PathBuf},
    sync::PoisonError,
};

use unpacker_core::{
    detect::ExecutableCandidate,
    identity::AppIdentity,
    install::{InstallPlan, SystemInstallReport},
    UnpackerError, UnpackerResult,
};
use unpacker_events::{OperationId, PipelineStage};

use crate::{cancel::CancelToken, context::HeldSlot, progress::Attempt};

// ---- Analyze ----

/// An extracted archive with its inferred identity and chosen executable,
/// waiting to be installed.
///
/// Owns the working directory. Passing it to
/// [`Unpacker::install`](crate::Unpacker::install) or dropping it removes
/// the directory, and so does starting another attempt on the same
/// [`Unpacker`](crate::Unpacker).
pub struct Analysis {
    pub source: PathBuf,
    /// Editable before install. Use [`AppIdentity::with_overrides`] to keep
    /// the sanitisation rules.
    pub identity: AppIdentity,
    pub executable: ExecutableCandidate,
    pub(crate) workdir: PathBuf,
    pub(crate) extracted: PathBuf,
    pub(crate) attempt: Attempt,
    pub(crate) held: HeldSlot,
}

impl Analysis {
    pub fn op_id(&self) -> OperationId {
        self.attempt.op_id()
    }

    pub fn stage(&self) -> PipelineStage {
        self.attempt.stage()
    }

    pub fn extracted_root(&self) -> &Path {
        &self.extracted
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Cancels this attempt only. Takes effect at its next stage boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.attempt.cancel_token().clone()
    }

    /// False once a newer attempt has taken over and removed the working
    /// directory.
    pub fn is_current(&self) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The executable relative to the extracted root.
    pub fn relative_executable(&self) -> PathBuf {
        self.executable
            .path
            .strip_prefix(&self.extracted)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.executable.path.clone())
    }

    pub fn transcript(&self) -> Vec<String> {
        self.attempt.transcript.lines()
    }
}

// ---- Install ----

/// Per-install choices. Unset fields fall back to the configuration or the
/// inferred identity.
#[derive(Debug, Default, Clone)]
pub struct InstallOptions {
    pub system_wide: Option<bool>,
    pub icon: Option<PathBuf>,
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Where an application ended up.
#[derive(Debug)]
pub enum InstalledTo {
    /// Built as a native package and installed by the host package manager.
    System(SystemInstallReport),
    /// Copied into the user's directories.
    User(InstallPlan),
}

#[derive(Debug)]
pub struct InstalledApp {
    pub identity: AppIdentity,
    pub location: InstalledTo,
}

/// Terminal result of a pipeline run.
#[derive(Debug)]
pub enum InstallStatus {
    Success(InstalledApp),
    Failure(UnpackerError),
}

/// Terminal status plus every transcript line the run produced.
#[derive(Debug)]
pub struct InstallOutcome {
    pub status: InstallStatus,
    pub transcript: Vec<String>,
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, InstallStatus::Success(_))
    }

    /// Human-readable failure reason, `None` on success.
    pub fn reason(&self) -> Option<String> {
        match &self.status {
            InstallStatus::Success(_) => None,
            InstallStatus::Failure(err) => Some(err.to_string()),
        }
    }

    pub fn into_result(self) -> UnpackerResult<InstalledApp> {
        match self.status {
            InstallStatus::Success(app) => Ok(app),
            InstallStatus::Failure(err) => Err(err),
        }
    }
}
