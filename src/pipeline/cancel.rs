//! Cancellation token shared across pipeline stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-way cancellation signal.
///
/// Cloned into every stage; set exactly once and never reset. Stages check it
/// between work items and in bounded waits. There is deliberately no way to
/// un-cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_threads() {
        let token = CancelToken::new();
        let clone = token.clone();

        let handle = std::thread::spawn(move || {
            clone.cancel();
        });
        handle.join().unwrap();

        assert!(token.is_cancelled());
    }
}
