//! # Message
//!
//! The in-memory shape of everything that crosses the store.
//!
//! A message is one of three kinds, distinguished by `call_id` and `status`:
//! - `call_id == 0` — broadcast; status is meaningless.
//! - `call_id > 0`, `Status::Unanswered` — request in flight.
//! - `call_id > 0`, `Status::Success`/`Status::Failure` — response.
//!
//! A request becomes its own response in place via [`Message::to_response`]:
//! origin and target swap, and an unanswered status is forced to success
//! (later overwritten by [`Message::fail`] if the handler reported an error).

use serde_json::Value;

use crate::seq::CallSequence;

/// The answer state of a call message.
///
/// On the wire this is the `error` slot: `null` while unanswered, `false`
/// for a successful response, and the failure description otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Request, not yet answered.
    Unanswered,
    /// Response; the handler succeeded and `data` carries the result.
    Success,
    /// Response; the handler raised. Carries a human-readable description.
    Failure(String),
}

/// A single unit of traffic between contexts.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Namespace prefix; keys outside it belong to other fabrics.
    pub protocol: String,
    /// Id of the sending context.
    pub origin: String,
    /// Id of the receiving context; empty means "everyone".
    pub target: String,
    /// Subscription name the receiver dispatches on.
    pub method: String,
    /// Opaque application payload. Never inspected by the fabric.
    pub data: Value,
    /// Correlation id; `0` marks a broadcast.
    pub call_id: u64,
    pub status: Status,
}

impl Message {
    /// Builds a broadcast. An empty `target` addresses every context.
    pub fn broadcast(
        protocol: &str,
        origin: &str,
        target: &str,
        method: &str,
        data: Value,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            origin: origin.to_string(),
            target: target.to_string(),
            method: method.to_string(),
            data,
            call_id: 0,
            status: Status::Unanswered,
        }
    }

    /// Builds a request, consuming the next id from the shared sequence.
    pub fn request(
        protocol: &str,
        origin: &str,
        target: &str,
        method: &str,
        data: Value,
        seq: &CallSequence,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            origin: origin.to_string(),
            target: target.to_string(),
            method: method.to_string(),
            data,
            call_id: seq.next(),
            status: Status::Unanswered,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.call_id == 0
    }

    pub fn is_request(&self) -> bool {
        self.call_id > 0 && self.status == Status::Unanswered
    }

    pub fn is_response(&self) -> bool {
        self.call_id > 0 && self.status != Status::Unanswered
    }

    /// Converts a request into its response in place.
    ///
    /// Swaps origin and target so the message routes back to the caller.
    /// An unanswered status is forced to success; a failure recorded via
    /// [`Message::fail`] is preserved.
    pub fn to_response(&mut self) {
        std::mem::swap(&mut self.origin, &mut self.target);
        if self.status == Status::Unanswered {
            self.status = Status::Success;
        }
    }

    /// Records a handler failure. The payload is dropped so the request
    /// data does not leak back to the caller.
    pub fn fail(&mut self, info: impl Into<String>) {
        self.status = Status::Failure(info.into());
        self.data = Value::Null;
    }
}
