use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use unpacker_core::{UnpackerError, UnpackerResult};
use unpacker_events::{EventSinkHandle, OperationId, PipelineStage, UnpackerEvent};

use crate::{cancel::CancelToken, transcript::Transcript};

/// Generates a unique operation ID.
pub fn next_op_id() -> OperationId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Stage bookkeeping and transcript for one install attempt.
pub(crate) struct Attempt {
    stage: PipelineStage,
    events: EventSinkHandle,
    cancel: CancelToken,
    pub(crate) transcript: Transcript,
}

impl Attempt {
    pub(crate) fn new(events: EventSinkHandle, cancel: CancelToken) -> Self {
        let op_id = next_op_id();
        Self {
            stage: PipelineStage::Idle,
            transcript: Transcript::new(op_id, events.clone()),
            events,
            cancel,
        }
    }

    pub(crate) fn op_id(&self) -> OperationId {
        self.transcript.op_id()
    }

    pub(crate) fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Moves to `next` unless the run was cancelled.
    pub(crate) fn enter(&mut self, next: PipelineStage) -> UnpackerResult<()> {
        self.cancel.check()?;
        if !self.stage.can_advance_to(next) {
            return Err(UnpackerError::Task(format!(
                "illegal stage transition {} -> {next}",
                self.stage
            )));
        }
        self.set(next);
        Ok(())
    }

    fn set(&mut self, stage: PipelineStage) {
        debug!(op_id = self.op_id(), from = %self.stage, to = %stage, "stage");
        self.stage = stage;
        self.events.emit(UnpackerEvent::Stage {
            op_id: self.op_id(),
            stage,
        });
    }

    pub(crate) fn succeed(&mut self) {
        if !self.stage.is_terminal() {
            self.set(PipelineStage::Done);
        }
    }

    /// Records `err` with any captured command output and moves to `Failed`.
    pub(crate) fn fail(&mut self, err: &UnpackerError) {
        self.transcript.error(&format!("Failed: {err}"));
        if let Some((stdout, stderr)) = err.command_output() {
            for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
                self.transcript.error(&format!("  stdout: {line}"));
            }
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                self.transcript.error(&format!("  stderr: {line}"));
            }
        }
        if !self.stage.is_terminal() {
            self.set(PipelineStage::Failed);
        }
    }

    /// Emits the terminal event. Call after cleanup so its warnings land
    /// before it.
    pub(crate) fn finish(&self, error: Option<&UnpackerError>) {
        self.events.emit(UnpackerEvent::Finished {
            op_id: self.op_id(),
            error: error.map(ToString::to_string),
        });
    }
}
