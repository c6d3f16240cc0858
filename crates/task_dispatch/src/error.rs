//! Error types for task dispatch.

use std::time::Duration;
use thiserror::Error;

/// Main error type returned by a dispatch call or surfaced by a result stream.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The task function returned an error or panicked.
    #[error("Task {index} failed: {source}")]
    TaskExecution {
        index: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A running task exceeded the configured timeout.
    #[error("Task {index} exceeded timeout of {timeout:?} ({in_flight} tasks in flight)")]
    TaskTimeout {
        index: usize,
        timeout: Duration,
        in_flight: usize,
    },

    #[error("Dispatch cancelled after {completed} of {total} tasks completed")]
    Cancelled { completed: usize, total: usize },

    #[error("Worker pool failure: {source}")]
    WorkerPool {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DispatchError {
    pub(crate) fn task(index: usize, error: anyhow::Error) -> Self {
        DispatchError::TaskExecution {
            index,
            source: error.into(),
        }
    }

    pub(crate) fn pool(error: anyhow::Error) -> Self {
        DispatchError::WorkerPool {
            source: error.into(),
        }
    }

    /// Index of the failing task, for execution errors and timeouts.
    pub fn task_index(&self) -> Option<usize> {
        match self {
            DispatchError::TaskExecution { index, .. } | DispatchError::TaskTimeout { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }
}

/// Errors raised while validating dispatcher configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown dispatch mode: {0:?} (expected \"ordered\" or \"unordered\")")]
    UnknownMode(String),

    #[error("Invalid num_workers: 0 (must be > 0, or unset to use host parallelism)")]
    ZeroWorkers,

    #[error("Invalid prefetch_factor: 0 (must be > 0 to make progress)")]
    ZeroPrefetch,

    #[error("Invalid timeout: zero duration")]
    ZeroTimeout,

    #[error("Invalid poll_interval: zero duration")]
    ZeroPollInterval,
}
