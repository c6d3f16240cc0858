//! src/dispatcher/mod.rs
//!
//! This module implements the `TaskDispatcher`.
//!
//! The `TaskDispatcher` runs one function over a sequence of primary arguments,
//! broadcasting a bundle of fixed arguments to every call, on a worker pool that
//! lives exactly as long as the dispatch.
//!
//! # Architecture Overview
//!
//! ```text
//!          primary: [p0, p1, ...]      fixed: A
//!                         │              │
//!                         ↓              ↓
//!                  ┌──────────────────────────┐
//!                  │      ArgumentStream      │ (i, p_i) + shared Arc<A>
//!                  └────────────┬─────────────┘
//!                               │
//!                               ↓
//!                  ┌──────────────────────────┐
//!                  │       DispatchRun        │ ←───── DispatchConfig (workers, window, timeout, ...)
//!                  └────────────┬─────────────┘
//!                               │ bounded task channel
//!                               ↓
//!                      [Worker Threads] (scoped to this call)
//!                               │
//!                               │ (index, Result<R>)
//!                               ↓
//!                  ┌──────────────────────────┐
//!                  │     DispatchStrategy     │ Ordered → Vec<R>
//!                  └──────────────────────────┘ Unordered → UnorderedResults<R>
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dispatcher/
//! ├── mod.rs             # Public API exports + module-level architecture docs
//! ├── config.rs          # DispatchConfig, builder, and validation
//! ├── engine.rs          # TaskDispatcher struct and constructors
//! ├── mode.rs            # DispatchMode enum, parsing and serde names
//! ├── strategy.rs        # DispatchStrategy trait and the ordered/unordered strategies
//! ├── arguments.rs       # ArgumentStream: broadcasting fixed arguments
//! ├── workers/
//! │   ├── mod.rs         # Dispatch lifecycle phases
//! │   ├── pool.rs        # Generic `WorkerPool<Task, Output>` implementation
//! │   └── run.rs         # DispatchRun: in-flight window, timeout, cancellation
//! └── common/
//!     ├── mod.rs         # Module declarations for shared utilities
//!     ├── cancel.rs      # CancellationToken
//!     └── thread.rs      # Thread-local worker ID
//! ```
//!
//! # Example Usage
//!
//! ## Ordered results:
//! ```ignore
//! let dispatcher = TaskDispatcher::new();
//! let sums = dispatcher.dispatch(|x, (y,)| Ok(x + y), vec![1, 2, 3], (10,))?;
//! assert_eq!(sums, vec![11, 12, 13]);
//! ```
//!
//! ## Streaming results as they complete:
//! ```ignore
//! let dispatcher = TaskDispatcher::unordered();
//! for result in dispatcher.dispatch(|path, _| load(path), paths, ())? {
//!     let item = result?;
//!     // Items arrive in completion order
//! }
//! ```
//!
//! ## Bounded pool with timeout and retries
//! ```ignore
//! let config = DispatchConfig::builder()
//!     .num_workers(4)
//!     .timeout(Duration::from_secs(30))
//!     .max_retries(2)
//!     .build();
//!
//! let dispatcher = TaskDispatcher::new().with_config(config)?;
//! ```
//!
//! # Failure Semantics
//! - Ordered: the first failing task fails the whole call; no partial results.
//! - Unordered: the failure is yielded where it is observed, earlier results
//!   remain valid, and the stream ends.
//! - A panicking task is reported like an error; the worker survives.
//!
//! # Notes:
//! - Task functions must be `Send + Sync + 'static`; share large read-only data
//!   through the fixed arguments rather than cloning it into the closure.
//! - Every call spawns and joins its own workers. Prefer fewer, larger dispatches
//!   over many tiny ones.

// Module declarations
mod arguments;
mod common;
mod config;
mod engine;
mod mode;
mod strategy;
mod workers;

// Public re-exports
pub use common::cancel::CancellationToken;
pub use common::thread::worker_id;
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use engine::TaskDispatcher;
pub use mode::DispatchMode;
pub use strategy::{
    DispatchStrategy, Dispatched, DispatchedIter, ModeDispatch, OrderedDispatch,
    UnorderedDispatch, UnorderedResults,
};
pub use workers::run::{Completion, DispatchRun};
