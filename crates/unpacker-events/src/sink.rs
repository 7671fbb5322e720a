use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex, PoisonError,
};

use crate::UnpackerEvent;

/// Consumer of pipeline events.
///
/// Emitting must never fail the pipeline; sinks swallow delivery errors.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: UnpackerEvent);
}

/// Forwards events over an mpsc channel to a single consumer.
pub struct ChannelSink {
    sender: Sender<UnpackerEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<UnpackerEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: UnpackerEvent) {
        let _ = self.sender.send(event);
    }
}

/// Drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: UnpackerEvent) {}
}

/// Keeps every event in memory for later inspection.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<UnpackerEvent>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<UnpackerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Transcript lines only, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| {
                match event {
                    UnpackerEvent::Log {
                        line, ..
                    } => Some(line),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: UnpackerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
