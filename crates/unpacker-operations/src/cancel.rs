use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use unpacker_core::{UnpackerError, UnpackerResult};

/// Cooperative cancellation flag shared between a pipeline and its caller.
///
/// The pipeline checks it before entering each stage; a stage that is
/// already running is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> UnpackerResult<()> {
        if self.is_cancelled() {
            Err(UnpackerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());

        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(UnpackerError::Cancelled)));
    }
}
