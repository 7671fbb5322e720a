use std::{path::Path, sync::PoisonError};

use tracing::{debug, info};
use unpacker_core::{
    command::CommandRunner,
    detect::{detect, ExecutableCandidate},
    extract::{extract, ArchiveFormat},
    identity::{infer_from_path, AppIdentity},
    workdir::WorkingDirectory,
    UnpackerError, UnpackerResult,
};
use unpacker_events::PipelineStage;
use unpacker_package::FileKind;

use crate::{
    cancel::CancelToken,
    context::{FlightGuard, Held, HeldSlot},
    install::{abort, release_workdir},
    progress::Attempt,
    types::Analysis,
    Unpacker,
};

impl<R: CommandRunner> Unpacker<R> {
    /// Extracts `source` and picks its executable, keeping the working
    /// directory for a later [`Unpacker::install`].
    ///
    /// On failure the working directory is already gone and the pipeline has
    /// reported `Failed`.
    pub async fn analyze(&self, source: &Path) -> UnpackerResult<Analysis> {
        self.start(source).await.map_err(|(err, _)| err)
    }

    /// [`analyze`](Self::analyze), handing back the transcript on failure.
    pub(crate) async fn start(
        &self,
        source: &Path,
    ) -> Result<Analysis, (UnpackerError, Vec<String>)> {
        let mut attempt = Attempt::new(self.events.clone(), CancelToken::new());
        attempt
            .transcript
            .info(&format!("Selected {}", source.display()));

        let slot = HeldSlot::default();
        let (flight, workdir) = match self.prepare(source, &attempt, &slot) {
            Ok(prepared) => prepared,
            Err(err) => return Err(abort(attempt, None, err)),
        };

        let (identity, executable) =
            match self.extract_and_detect(source, &workdir, &mut attempt).await {
                Ok(found) => found,
                Err(err) => return Err(abort(attempt, Some(workdir), err)),
            };

        // Parked under the slot lock so a newer attempt either sees the
        // resources and takes them, or has already cancelled this one.
        let mut parked = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = attempt.cancel_token().check() {
            drop(parked);
            return Err(abort(attempt, Some(workdir), err));
        }
        let workdir_path = workdir.path().to_path_buf();
        let extracted = workdir.extracted();
        *parked = Some(Held {
            workdir,
            flight,
        });
        drop(parked);

        Ok(Analysis {
            source: source.to_path_buf(),
            identity,
            executable,
            workdir: workdir_path,
            extracted,
            attempt,
            held: slot,
        })
    }

    fn prepare(
        &self,
        source: &Path,
        attempt: &Attempt,
        slot: &HeldSlot,
    ) -> UnpackerResult<(FlightGuard, WorkingDirectory)> {
        if !source.is_file() {
            return Err(UnpackerError::InvalidSource(format!(
                "{} is not a readable file",
                source.display()
            )));
        }
        if ArchiveFormat::from_path(source).is_none() {
            return Err(UnpackerError::UnsupportedArchive(source.to_path_buf()));
        }

        let flight = self.claim(source)?;
        if let Some(previous) =
            self.supersede(attempt.op_id(), attempt.cancel_token().clone(), slot)
        {
            attempt.transcript.info("Discarding the previous analysis");
            release_workdir(previous.workdir, &attempt.transcript);
        }

        let workdir = WorkingDirectory::create(self.config.get_temp_root()?)?;
        Ok((flight, workdir))
    }

    async fn extract_and_detect(
        &self,
        source: &Path,
        workdir: &WorkingDirectory,
        attempt: &mut Attempt,
    ) -> UnpackerResult<(AppIdentity, ExecutableCandidate)> {
        let root = workdir.extracted();

        attempt.enter(PipelineStage::Extracting)?;
        attempt.transcript.info(&format!(
            "Extracting {}",
            source.file_name().unwrap_or(source.as_os_str()).to_string_lossy()
        ));
        extract(&self.runner, source, &root).await?;
        debug!(root = %root.display(), "extraction finished");

        attempt.enter(PipelineStage::Detecting)?;
        let identity = infer_from_path(source);
        attempt.transcript.info(&format!(
            "Name: {}, version: {}",
            identity.name(),
            identity.version()
        ));

        let name = identity.name().to_string();
        let scan_root = root.clone();
        let executable =
            tokio::task::spawn_blocking(move || detect(&scan_root, &name)).await??;

        let kind = match executable.kind {
            FileKind::Elf => "ELF binary",
            FileKind::Script => "script",
        };
        let relative = executable
            .path
            .strip_prefix(&root)
            .unwrap_or(&executable.path);
        attempt.transcript.info(&format!(
            "Executable: {} ({kind}, {} bytes)",
            relative.display(),
            executable.size
        ));
        info!(
            name = identity.name(),
            version = identity.version(),
            executable = %executable.path.display(),
            "analysis complete"
        );

        Ok((identity, executable))
    }
}
