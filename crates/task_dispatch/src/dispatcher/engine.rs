//! src/dispatcher/engine.rs
//!
//! The `TaskDispatcher` and its constructors.
//!
//! # Constructor Overview
//!
//! - `new()` - Ordered dispatch, results as `Vec<R>` in input order
//! - `unordered()` - Unordered dispatch, results as a lazy `UnorderedResults<R>`
//! - `with_mode()` - Mode picked at runtime, results as `Dispatched<R>`
//! - `with_strategy()` - Any `DispatchStrategy` implementation
//!
//! Any of them can be followed by `with_config()` to size the pool, set a
//! timeout, enable retries or attach a cancellation token.
//!
//! # Call shape
//!
//! `dispatch(function, primary, fixed)` runs `function(&primary[i], &fixed)` for
//! every element of `primary`. `fixed` is any value, usually a tuple bundling
//! the broadcast arguments (`()` when there are none):
//!
//! ```ignore
//! let dispatcher = TaskDispatcher::new();
//! let sums = dispatcher.dispatch(|x, (y,)| Ok(x + y), vec![1i32, 2, 3], (10i32,))?;
//! assert_eq!(sums, vec![11, 12, 13]);
//! ```

use std::fmt;

use super::arguments::ArgumentStream;
use super::config::DispatchConfig;
use super::mode::DispatchMode;
use super::strategy::{DispatchStrategy, ModeDispatch, OrderedDispatch, UnorderedDispatch};
use super::workers::run::DispatchRun;
use super::workers::DispatchPhase;
use crate::error::DispatchError;

/// Runs one function over a sequence of inputs on a scoped worker pool.
///
/// The strategy is fixed at construction. The dispatcher keeps no state between
/// calls: each `dispatch` formats its own arguments, acquires its own pool and
/// releases it before returning (or, for streamed results, when the stream
/// ends). Calls may come from several threads at once.
#[derive(Debug, Clone)]
pub struct TaskDispatcher<S = OrderedDispatch> {
    strategy: S,
    config: DispatchConfig,
}

impl TaskDispatcher<OrderedDispatch> {
    /// Creates an ordered dispatcher, the default mode.
    pub fn new() -> Self {
        Self::with_strategy(OrderedDispatch)
    }
}

impl Default for TaskDispatcher<OrderedDispatch> {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskDispatcher<UnorderedDispatch> {
    /// Creates a dispatcher that streams results in completion order.
    pub fn unordered() -> Self {
        Self::with_strategy(UnorderedDispatch)
    }
}

impl TaskDispatcher<ModeDispatch> {
    /// Creates a dispatcher whose mode is only known at runtime.
    pub fn with_mode(mode: DispatchMode) -> Self {
        Self::with_strategy(ModeDispatch(mode))
    }
}

impl<S: DispatchStrategy> TaskDispatcher<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            strategy,
            config: DispatchConfig::default(),
        }
    }

    /// Replaces the configuration after validating it.
    pub fn with_config(mut self, config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn mode(&self) -> DispatchMode {
        self.strategy.mode()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs `function(&p, &fixed)` for every `p` in `primary`.
    ///
    /// The output type depends on the strategy: `Vec<R>` in input order for
    /// ordered dispatch, a lazy completion-order stream for unordered dispatch.
    /// An empty `primary` runs nothing and returns an empty output.
    ///
    /// # Errors
    /// - `Configuration` if the config is invalid
    /// - `TaskExecution` if the function fails or panics (ordered mode; unordered
    ///   mode yields it from the stream)
    /// - `TaskTimeout`, `Cancelled` or `WorkerPool` per the config and pool state
    pub fn dispatch<F, I, P, A, R>(
        &self,
        function: F,
        primary: I,
        fixed: A,
    ) -> Result<S::Output<R>, DispatchError>
    where
        F: Fn(&P, &A) -> anyhow::Result<R> + Send + Sync + 'static,
        I: IntoIterator<Item = P>,
        P: Send + 'static,
        A: Send + Sync + 'static,
        R: Send + 'static,
    {
        self.config.validate()?;

        tracing::debug!(
            mode = %self.mode(),
            phase = ?DispatchPhase::Formatting,
            "formatting arguments"
        );
        let arguments = ArgumentStream::new(primary, fixed);

        let run = DispatchRun::start(function, arguments, &self.config)?;
        self.strategy.run(run)
    }
}

impl<S: DispatchStrategy> fmt::Display for TaskDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskDispatcher({})", self.mode())
    }
}
