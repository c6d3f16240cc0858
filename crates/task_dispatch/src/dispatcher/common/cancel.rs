//! Cooperative cancellation for in-progress dispatches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that stops a dispatch from submitting further tasks.
///
/// Clones observe the same flag. Cancelling does not interrupt a task that is
/// already running; workers stop picking up new tasks and the waiting caller
/// gets `DispatchError::Cancelled` on its next poll.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
