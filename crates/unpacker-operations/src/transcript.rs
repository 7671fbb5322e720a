use std::sync::{Mutex, PoisonError};

use unpacker_events::{EventSinkHandle, LogLevel, OperationId, UnpackerEvent};
use unpacker_utils::time::stamped;

/// Append-only, timestamped log of one pipeline run.
///
/// Every line is stored and emitted while the lock is held, so the stored
/// order matches the order sinks observe and a line is never split or
/// interleaved with another.
pub struct Transcript {
    op_id: OperationId,
    events: EventSinkHandle,
    lines: Mutex<Vec<String>>,
}

impl Transcript {
    pub fn new(op_id: OperationId, events: EventSinkHandle) -> Self {
        Self {
            op_id,
            events,
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn op_id(&self) -> OperationId {
        self.op_id
    }

    /// Appends `message` as `[HH:MM:SS] message`. Multi-line messages become
    /// one stamped line each.
    pub fn append(&self, level: LogLevel, message: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        for part in message.lines() {
            let line = stamped(part);
            self.events.emit(UnpackerEvent::Log {
                op_id: self.op_id,
                level,
                line: line.clone(),
            });
            lines.push(line);
        }
    }

    pub fn info(&self, message: &str) {
        self.append(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.append(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.append(LogLevel::Error, message);
    }

    /// Snapshot of every line appended so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
