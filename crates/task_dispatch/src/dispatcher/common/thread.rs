//! Thread-local storage for worker identification.
//!
//! Each pool thread records its index when spawned so that task functions and
//! log events can tell which worker ran them.

use std::cell::Cell;

thread_local! {
    /// Thread-local worker ID.
    ///
    /// `None` on threads that were not spawned by a dispatch pool.
    pub(crate) static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Index of the pool worker running the current thread (0 to num_workers-1).
///
/// Returns `None` when called outside a dispatch worker, e.g. from the caller's
/// thread.
pub fn worker_id() -> Option<usize> {
    WORKER_ID.with(Cell::get)
}

pub(crate) fn set_worker_id(id: usize) {
    WORKER_ID.with(|cell| cell.set(Some(id)));
}
