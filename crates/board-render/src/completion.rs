//! One-shot, idempotent completion signal
//!
//! A consumer waiting on a render gets a [`Completion`]. It resolves when the
//! render settles (success, failure or skip) or when the consumer detaches,
//! whichever comes first. Resolving twice is harmless.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared completion signal
#[derive(Debug, Clone)]
pub struct Completion {
    tx: Arc<watch::Sender<bool>>,
}

impl Completion {
    /// Unresolved signal
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal that is already resolved
    #[must_use]
    pub fn resolved() -> Self {
        let completion = Self::new();
        completion.resolve();
        completion
    }

    /// Resolve; later calls are no-ops
    pub fn resolve(&self) {
        self.tx.send_replace(true);
    }

    /// True once resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until resolved
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(|done| *done).await;
    }

    /// True if both values are the same signal
    #[must_use]
    pub fn same_as(&self, other: &Completion) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
