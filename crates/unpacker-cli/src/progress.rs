use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, Arc, LazyLock},
    thread::JoinHandle,
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::{Green, Red};
use tracing::{debug, error, info, warn};
use unpacker_events::{LogLevel, OperationId, PipelineStage, UnpackerEvent};

use crate::utils::{progress_enabled, Colored};

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the background thread started by [`spawn_event_handler`].
///
/// Drop the [`Unpacker`](unpacker_operations::Unpacker) holding the channel
/// sender before calling [`finish`](ProgressGuard::finish), otherwise the
/// thread keeps waiting for events.
pub struct ProgressGuard {
    handle: Option<JoinHandle<()>>,
}

impl ProgressGuard {
    /// Wait for the handler to drain remaining events.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn create_spinner(stage: PipelineStage) -> ProgressBar {
    let pb = if progress_enabled() {
        MULTI.add(ProgressBar::new_spinner())
    } else {
        MULTI.add(ProgressBar::hidden())
    };
    pb.set_style(spinner_style());
    pb.set_message(stage_message(stage));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn stage_message(stage: PipelineStage) -> String {
    let msg = match stage {
        PipelineStage::Idle => "Waiting",
        PipelineStage::Extracting => "Extracting archive",
        PipelineStage::Detecting => "Looking for the executable",
        PipelineStage::Staging => "Staging files",
        PipelineStage::Building => "Building package",
        PipelineStage::Copying => "Copying files",
        PipelineStage::Installing => "Installing package",
        PipelineStage::Done => "Done",
        PipelineStage::Failed => "Failed",
    };
    msg.to_string()
}

/// Spawn a background thread that renders [`UnpackerEvent`]s.
///
/// Transcript lines go through `tracing` so `--json` and `--quiet` apply to
/// them. Each operation gets one spinner showing its current stage; it is
/// cleared when the operation finishes.
pub fn spawn_event_handler(receiver: Receiver<UnpackerEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<OperationId, ProgressBar> = HashMap::new();

        while let Ok(event) = receiver.recv() {
            match event {
                UnpackerEvent::Log {
                    op_id,
                    level,
                    line,
                } => {
                    match level {
                        LogLevel::Debug => debug!(op_id, "{line}"),
                        LogLevel::Info => info!(op_id, "{line}"),
                        LogLevel::Warning => warn!(op_id, "{line}"),
                        LogLevel::Error => error!(op_id, "{line}"),
                    }
                }
                UnpackerEvent::Stage {
                    op_id,
                    stage,
                } => {
                    debug!(op_id, stage = %stage, "stage changed");
                    if stage.is_terminal() {
                        if let Some(pb) = jobs.remove(&op_id) {
                            pb.finish_and_clear();
                        }
                        continue;
                    }
                    jobs.entry(op_id)
                        .or_insert_with(|| create_spinner(stage))
                        .set_message(stage_message(stage));
                }
                UnpackerEvent::Finished {
                    op_id,
                    error,
                } => {
                    if let Some(pb) = jobs.remove(&op_id) {
                        pb.finish_and_clear();
                    }
                    MULTI.suspend(|| {
                        match error {
                            Some(_) => eprintln!(" {} {}", Colored(Red, "✗"), Colored(Red, "failed")),
                            None => eprintln!(" {} {}", Colored(Green, "✓"), Colored(Green, "done")),
                        }
                    });
                }
            }
        }

        for (_, pb) in jobs {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}
