//! # Store Abstraction
//!
//! A minimal, async interface over the shared key-value store.
//!
//! ## Philosophy
//!
//! - **String-Oriented**: The store knows nothing about messages or peers.
//!   It moves opaque key/value strings.
//! - **Observed Elsewhere**: A write is visible to *other* contexts as a
//!   change event carrying `(key, new_value)`; the writer never observes its
//!   own changes. Delivery of those events to [`crate::Bridge::on_change`]
//!   is the host's job, not the store's.

use std::fmt;

/// Errors that occur at the store layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The store is gone or the context was detached from it.
    Closed(String),
    /// Generic I/O or internal store failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(msg) => write!(f, "Store closed: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A shared key-value store with change notifications.
///
/// This trait is designed to be object-safe (`Arc<dyn Store>`).
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Writes a value under a key, observable by other contexts.
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. Also observable as a change event (with no value).
    async fn clear(&self, key: &str) -> Result<()>;
}
