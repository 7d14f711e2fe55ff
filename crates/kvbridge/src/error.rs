//! # Error Definitions
//!
//! The central ledger of fabric failures.
//!
//! Decode failures are deliberately absent: malformed or foreign store
//! entries are dropped silently, since the store may be shared with
//! unrelated writers.

use crate::store;

/// Operational failures surfaced by the bridge.
#[derive(Debug, Clone)]
pub enum Error {
    /// No response arrived within the configured window.
    Timeout,
    /// The remote handler raised; carries its description.
    Remote(String),
    /// A locally dispatched request handler raised.
    Handler(String),
    /// The underlying store rejected a write or clear.
    Store(store::Error),
    /// A wire record could not be serialized.
    Codec(String),
    /// The response channel closed without settling the call.
    ChannelClosed,
    /// The bridge terminated while the call was outstanding.
    Terminated,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "Request timed out"),
            Self::Remote(info) => write!(f, "Remote handler failed: {}", info),
            Self::Handler(info) => write!(f, "Local handler failed: {}", info),
            Self::Store(e) => write!(f, "Store error: {}", e),
            Self::Codec(info) => write!(f, "Codec error: {}", info),
            Self::ChannelClosed => write!(f, "Response channel closed"),
            Self::Terminated => write!(f, "Bridge terminated"),
        }
    }
}

impl std::error::Error for Error {}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Self {
        Self::Store(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
