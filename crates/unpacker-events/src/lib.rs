mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Identifies one pipeline run within a process.
pub type OperationId = u64;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;
