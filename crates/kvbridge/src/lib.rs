//! # KvBridge
//!
//! A peer-to-peer messaging fabric for isolated contexts that share only a
//! key-value store with change notifications.
//!
//! ## Architecture
//!
//! Each context owns one [`Bridge`]. The bridge announces itself over the
//! store, keeps a [`roster::Roster`] of every peer it has heard from, and
//! routes outbound traffic either to local subscribers or onto the store
//! (write, then immediately clear — the clear guarantees a detectable change
//! even when the same value is written twice in a row). Inbound change
//! events are decoded by `kvrpc` and dispatched to the event bus or, for
//! responses, to the pending-call table.
//!
//! There is no central broker: peer discovery is a two-way handshake over
//! the same broadcast channel as application traffic.

pub mod bridge;
pub mod bus;
pub mod error;
pub mod memory;
pub mod pending;
pub mod roster;
pub mod store;

pub use bridge::Bridge;
pub use bridge::BridgeConfig;
pub use bridge::Lifecycle;
pub use error::Error;
pub use error::Result;
pub use kvrpc::CallSequence;
pub use kvrpc::Message;
pub use kvrpc::Status;
pub use roster::Peer;
pub use roster::Selector;
pub use store::Store;
