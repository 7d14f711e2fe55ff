//! # Pending Calls
//!
//! Tracks outstanding requests by call id and correlates them with inbound
//! responses, in the manner of an async reply pump: each entry holds a
//! oneshot sender the caller awaits, plus the timer task that will evict
//! and reject the entry if no response arrives in time.
//!
//! ## Invariants
//! - At most one entry exists per call id.
//! - An entry settles exactly once: whichever of response, timeout, or
//!   drain removes it from the map wins; the others become no-ops.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::Error;

/// One outstanding request.
struct PendingCall {
    tx: oneshot::Sender<Result<Value, Error>>,
    timer: Option<JoinHandle<()>>,
}

/// The table of outstanding requests for one bridge.
pub struct PendingCalls {
    entries: Arc<DashMap<u64, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::new()) }
    }

    /// Registers a call and returns the receiver the caller awaits.
    ///
    /// A positive `timeout_ms` starts a timer that rejects the call with
    /// [`Error::Timeout`] if it is still pending on expiry. Zero or
    /// negative disables the timer; such a call settles only by response
    /// or by [`PendingCalls::drain`].
    pub fn register(&self, call_id: u64, timeout_ms: i64) -> oneshot::Receiver<Result<Value, Error>> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(call_id, PendingCall { tx, timer: None });

        if timeout_ms > 0 {
            let entries = self.entries.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms as u64)).await;
                if let Some((_, call)) = entries.remove(&call_id) {
                    let _ = call.tx.send(Err(Error::Timeout));
                }
            });
            // The entry may already have settled while spawning; the timer
            // then fires against an absent id, which is a no-op.
            if let Some(mut entry) = self.entries.get_mut(&call_id) {
                entry.timer = Some(timer);
            }
        }

        rx
    }

    /// Settles a call with a response outcome.
    ///
    /// Unknown ids (already timed out, or never registered) are ignored.
    pub fn settle(&self, call_id: u64, outcome: Result<Value, String>) {
        let Some((_, call)) = self.entries.remove(&call_id) else {
            return;
        };
        if let Some(timer) = call.timer {
            timer.abort();
        }
        let _ = call.tx.send(outcome.map_err(Error::Remote));
    }

    /// Evicts a call without settling it. Used when the request was never
    /// actually transmitted; the caller already holds the real error.
    pub fn discard(&self, call_id: u64) {
        if let Some((_, call)) = self.entries.remove(&call_id) {
            if let Some(timer) = call.timer {
                timer.abort();
            }
        }
    }

    /// Rejects every outstanding call with [`Error::Terminated`].
    pub fn drain(&self) {
        let ids: Vec<u64> = self.entries.iter().map(|entry| *entry.key()).collect();
        for call_id in ids {
            if let Some((_, call)) = self.entries.remove(&call_id) {
                if let Some(timer) = call.timer {
                    timer.abort();
                }
                let _ = call.tx.send(Err(Error::Terminated));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
