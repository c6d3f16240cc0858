pub mod dispatcher;
pub mod error;
pub mod logging;

pub use dispatcher::{
    worker_id, CancellationToken, DispatchConfig, DispatchMode, DispatchStrategy, Dispatched,
    ModeDispatch, OrderedDispatch, TaskDispatcher, UnorderedDispatch, UnorderedResults,
};
pub use error::{ConfigError, DispatchError};
pub use logging::{format_header, Logger};
