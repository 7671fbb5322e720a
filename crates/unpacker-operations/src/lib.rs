//! The unpacker pipeline: extract, detect, stage, install, clean up.
//!
//! [`Unpacker::run`] does everything in one call. Frontends that let the user
//! review or edit the inferred name before installing call
//! [`Unpacker::analyze`] first and hand the [`Analysis`] to
//! [`Unpacker::install`]. Progress is reported through the configured
//! [`EventSink`](unpacker_events::EventSink) as stage changes and
//! timestamped transcript lines.

pub mod cancel;
pub mod context;
pub mod progress;
pub mod transcript;
pub mod types;

pub mod analyze;
pub mod install;
pub mod run;

#[cfg(test)]
mod test_utils;

pub use cancel::CancelToken;
pub use context::{CancelHandle, Unpacker};
pub use transcript::Transcript;
pub use types::*;
