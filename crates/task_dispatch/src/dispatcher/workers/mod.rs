//! Worker management for parallel dispatch.
//!
//! This module provides the abstractions for multi-threaded task execution:
//! - `pool`: Worker pool implementation
//! - `run`: One dispatch call's submission window and completion stream

pub(crate) mod pool;
pub(crate) mod run;

/// Lifecycle of a single dispatch call, reported in `tracing` events.
///
/// `Formatting -> PoolAcquired -> Dispatching -> (Completed | Failed) -> PoolReleased`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchPhase {
    Formatting,
    PoolAcquired,
    Dispatching,
    Completed,
    Failed,
    PoolReleased,
}
