//! Cooperative cancellation for the blocking acquisition pipeline.
//!
//! The pipeline is synchronous and single-threaded, so cancellation is a
//! shared flag checked once per loop iteration (and between reads while the
//! synchronizer is accumulating bytes). Setting the flag asks the pipeline to
//! stop after the packet in flight; the active segment is flushed and closed
//! before the loop returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared between the acquisition loop and an
/// external controller (typically a Ctrl-C handler).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        token.cancel();
        assert!(observer.is_cancelled());
    }
}
