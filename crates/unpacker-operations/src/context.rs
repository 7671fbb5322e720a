use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tracing::debug;
use unpacker_config::config::Config;
use unpacker_core::{command::ProcessRunner, workdir::WorkingDirectory, UnpackerError, UnpackerResult};
use unpacker_events::{EventSinkHandle, NullSink, OperationId};
use unpacker_utils::lock::FileLock;

use crate::cancel::CancelToken;

type InFlight = Arc<Mutex<HashSet<PathBuf>>>;
type CurrentCell = Arc<Mutex<Option<Current>>>;

/// Runs the archive pipeline with one configuration, event sink and
/// command runner.
///
/// At most one analysis or install is active per source archive. A second
/// request for the same archive fails with [`UnpackerError::AlreadyRunning`]
/// until the first one finishes, whether it runs in this process or another.
///
/// At most one attempt is current per instance. Starting an attempt on a
/// different archive cancels the previous one and removes its working
/// directory; an [`Analysis`](crate::Analysis) left over from it can no
/// longer be installed.
pub struct Unpacker<R = ProcessRunner> {
    pub(crate) config: Config,
    pub(crate) events: EventSinkHandle,
    pub(crate) runner: R,
    in_flight: InFlight,
    current: CurrentCell,
}

impl Unpacker<ProcessRunner> {
    pub fn new(config: Config, events: EventSinkHandle) -> Self {
        Self::with_runner(config, events, ProcessRunner::new())
    }
}

impl<R> Unpacker<R> {
    pub fn with_runner(config: Config, events: EventSinkHandle, runner: R) -> Self {
        Self {
            config,
            events,
            runner,
            in_flight: Arc::default(),
            current: Arc::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    /// A handle that cancels whichever attempt is current when it fires.
    /// Later attempts are unaffected.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.current))
    }

    /// Claims `source` for one pipeline run.
    pub(crate) fn claim(&self, source: &Path) -> UnpackerResult<FlightGuard> {
        let key = std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains(&key) {
            return Err(UnpackerError::AlreadyRunning(source.to_path_buf()));
        }
        let lock = FileLock::try_acquire(&key)?
            .ok_or_else(|| UnpackerError::AlreadyRunning(source.to_path_buf()))?;
        in_flight.insert(key.clone());
        debug!(source = %key.display(), "claimed archive");

        Ok(FlightGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
            _lock: lock,
        })
    }

    /// Makes the attempt owning `cancel` and `slot` the current one. The
    /// previous attempt is cancelled and whatever it parked in its slot is
    /// handed back for release.
    pub(crate) fn supersede(
        &self,
        op_id: OperationId,
        cancel: CancelToken,
        slot: &HeldSlot,
    ) -> Option<Held> {
        let next = Current {
            op_id,
            cancel,
            held: Arc::downgrade(slot),
        };
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(next)?;

        previous.cancel.cancel();
        let slot = previous.held.upgrade()?;
        let held = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if held.is_some() {
            debug!(op_id = previous.op_id, "superseded outstanding analysis");
        }
        held
    }
}

impl Default for Unpacker<ProcessRunner> {
    fn default() -> Self {
        Self::new(Config::default_config(), Arc::new(NullSink))
    }
}

/// Cancels the current attempt of an [`Unpacker`] from anywhere, for
/// example a signal handler.
#[derive(Clone)]
pub struct CancelHandle(CurrentCell);

impl CancelHandle {
    /// Returns whether there was an attempt to cancel.
    pub fn cancel(&self) -> bool {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(current) => {
                current.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

struct Current {
    op_id: OperationId,
    cancel: CancelToken,
    held: Weak<Mutex<Option<Held>>>,
}

/// Resources an analysed archive keeps until it is installed.
pub(crate) struct Held {
    pub(crate) workdir: WorkingDirectory,
    // declared last so the claim outlives the working directory
    pub(crate) flight: FlightGuard,
}

/// Shared between an [`Analysis`](crate::Analysis) and the instance that
/// created it, so a newer attempt can take the resources back.
pub(crate) type HeldSlot = Arc<Mutex<Option<Held>>>;

/// Releases the claim on a source archive when dropped.
pub(crate) struct FlightGuard {
    key: PathBuf,
    in_flight: InFlight,
    _lock: FileLock,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
