//! Shared utilities for the dispatcher.
//!
//! This module contains:
//! - `thread`: Thread-local worker identification
//! - `cancel`: Cooperative cancellation token

pub(crate) mod cancel;
pub(crate) mod thread;
