//! # Call Sequence
//!
//! The monotonic call-id generator behind request/response correlation.
//!
//! Call ids must be unique within a context's lifetime: a response is routed
//! back to its request purely by id. The sequence is a cloneable handle on a
//! shared atomic counter rather than a hidden global — every bridge running
//! in the same context must be handed the same sequence, otherwise two
//! bridges could issue colliding ids over the same store.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// A shared, strictly increasing source of call ids.
///
/// Clones share the same counter. The first id issued is `1`; id `0` is
/// reserved to mark broadcast messages.
#[derive(Clone, Debug)]
pub struct CallSequence {
    next: Arc<AtomicU64>,
}

impl CallSequence {
    pub fn new() -> Self {
        Self { next: Arc::new(AtomicU64::new(1)) }
    }

    /// Issues the next call id.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for CallSequence {
    fn default() -> Self {
        Self::new()
    }
}
