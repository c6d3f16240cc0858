//! Dispatch modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// How a dispatcher surfaces results.
///
/// - `Ordered`: blocks until every task is done; results follow input order.
/// - `Unordered`: yields results lazily as tasks finish, in completion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    #[serde(alias = "starmap")]
    Ordered,
    #[serde(alias = "imap_unordered")]
    Unordered,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Ordered => write!(f, "Ordered"),
            DispatchMode::Unordered => write!(f, "Unordered"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    /// Accepts `ordered`/`starmap` and `unordered`/`imap_unordered`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" | "starmap" => Ok(DispatchMode::Ordered),
            "unordered" | "imap_unordered" => Ok(DispatchMode::Unordered),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}
