//! # KvRPC
//!
//! The wire protocol for peer messaging over a shared key-value store.
//!
//! ## Architecture
//!
//! Contexts that share nothing but a key-value store (where every write is
//! observable by *other* contexts as a change event) exchange two kinds of
//! messages: fire-and-forget broadcasts and correlated request/response
//! calls. This crate defines the message shape, the storage-key scheme that
//! routes a message to its target, and the JSON record formats — plus the
//! monotonic call-id sequence that correlates requests with responses.
//!
//! ## Invariants
//! - **Panic Safety**: Decoding never panics on unknown data; malformed or
//!   foreign store entries decode to `None`.
//! - **Namespace Isolation**: Keys outside the configured protocol prefix
//!   are ignored, so independent fabrics can share one store.

pub mod codec;
pub mod message;
pub mod seq;

pub use codec::decode;
pub use codec::encode;
pub use message::Message;
pub use message::Status;
pub use seq::CallSequence;

#[cfg(test)]
mod tests;
