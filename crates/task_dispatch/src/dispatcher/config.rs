//! src/dispatcher/config.rs
//!
//! Configuration for dispatch behaviour
//!
//! The `DispatchConfig` struct stores the parameters that control
//! how tasks are run on the worker pool.
//!
//! Example:
//! ```ignore
//! let config = DispatchConfig::builder()
//!     .num_workers(4)
//!     .prefetch_factor(2)
//!     .timeout(Duration::from_secs(30))
//!     .max_retries(1)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `num_workers`: More workers raise throughput for CPU-bound tasks, up to the core count
//! - `prefetch_factor`: Higher values keep workers busy but hold more queued inputs and outputs
//! - `poll_interval`: Lower values make cancellation more responsive at the cost of wakeups

use std::num::NonZero;
use std::time::Duration;

use super::common::cancel::CancellationToken;
use crate::error::ConfigError;

/// Configuration for TaskDispatcher
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of worker threads (defaults to host parallelism if not specified)
    pub num_workers: Option<usize>,
    /// Number of in-flight tasks per worker (must be > 0)
    pub prefetch_factor: usize,
    /// Maximum time a single task may run, retries included, counted from when a
    /// worker picks it up. If exceeded, the dispatch fails with `TaskTimeout`.
    /// Default: no limit.
    pub timeout: Option<Duration>,
    /// How often idle workers and a waiting caller check for shutdown or cancellation.
    /// Not an error timeout - just a polling interval. Default: 100ms.
    pub poll_interval: Duration,
    /// Extra attempts for a task whose function returned an error. Panics are never retried.
    pub max_retries: usize,
    /// Token that stops the dispatch when cancelled
    pub cancellation: Option<CancellationToken>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: None,
            prefetch_factor: 2,
            timeout: None,
            poll_interval: Duration::from_millis(100),
            max_retries: 0,
            cancellation: None,
        }
    }
}

impl DispatchConfig {
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }

    /// Checks every setting, returning the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.prefetch_factor == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Number of workers to spawn for `task_count` tasks.
    ///
    /// Uses the configured size or the host's available parallelism, capped at
    /// the task count so no worker is spawned without work. Always at least 1.
    pub fn resolved_workers(&self, task_count: usize) -> usize {
        let workers = self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZero::get)
                .unwrap_or(1)
        });
        workers.min(task_count).max(1)
    }

    /// Maximum number of submitted but uncollected tasks for a pool of `workers`.
    pub(crate) fn in_flight_window(&self, workers: usize) -> usize {
        workers.saturating_mul(self.prefetch_factor).max(1)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Builder for DispatchConfig with method chaining
#[derive(Default)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    /// Set the number of workers (must be > 0)
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = Some(workers);
        self
    }

    /// Set the number of in-flight tasks per worker.
    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// Set the per-task timeout.
    ///
    /// - Too low: May fail dispatches during legitimate heavy processing
    /// - Too high: Delays detection of stuck tasks.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the polling interval
    ///
    /// - Too low: More responsive shutdown, higher CPU usage.
    /// - Too high: Less CPU overhead, slower shutdown response
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Retry a failing task up to `retries` extra times.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DispatchConfig {
        self.config
    }
}
