use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use circ_core::{BookId, MemberId};

use crate::engine::EngineInner;

/// Identifies the hold an expiry action was scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hold {
    pub(crate) book_id: BookId,
    pub(crate) holder: MemberId,
    pub(crate) ticket: u64,
}

/// One deferred task per reservation. There is no cancellation: every task
/// fires once and performs a conditional release under the engine lock.
#[derive(Debug, Default)]
pub(crate) struct ExpiryScheduler {
    pending: Arc<AtomicUsize>,
}

impl ExpiryScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawn the expiry action for `hold` onto the current Tokio runtime.
    ///
    /// The task only holds a weak reference: once every engine handle is
    /// dropped, pending actions wake up and do nothing.
    pub(crate) fn schedule(&self, engine: Weak<EngineInner>, hold: Hold, ttl: Duration) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(engine) = engine.upgrade() {
                engine.expire_reservation(hold).await;
            }
            pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Actions scheduled but not yet completed.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
