//! # Codec
//!
//! Translates a [`Message`] to and from the store's `(key, value)` pair.
//!
//! ## Key scheme
//! - `"<protocol>:broadcast"` — broadcast to everyone.
//! - `"<protocol>:<targetId>"` — broadcast to one context.
//! - `"<protocol>:<targetId>:<originId>"` — request or response.
//!
//! ## Invariants
//! - **Silent Rejection**: The store may be shared with unrelated writers;
//!   anything malformed or foreign decodes to `None`, never an error.
//! - **Minimal Records**: Each kind serializes exactly the fields the
//!   receiver needs; routing identities live in the key, not the value.

use serde::Serialize;
use serde::Serializer;
use serde_json::Value;

use crate::message::Message;
use crate::message::Status;

/// Key suffix for the everyone-broadcast.
const BROADCAST_SEGMENT: &str = "broadcast";

/// Wire record for a broadcast. Target is implied by the key.
#[derive(Serialize)]
struct BroadcastRecord<'a> {
    data: &'a Value,
    origin: &'a str,
    method: &'a str,
}

/// Wire record for a request or response. Target and origin live in the key;
/// the `error` slot doubles as the kind marker (`null` request, `false`
/// success, string failure).
#[derive(Serialize)]
struct CallRecord<'a> {
    id: u64,
    data: &'a Value,
    #[serde(serialize_with = "serialize_error_slot")]
    error: &'a Status,
    method: &'a str,
}

fn serialize_error_slot<S: Serializer>(status: &Status, s: S) -> Result<S::Ok, S::Error> {
    match status {
        Status::Unanswered => s.serialize_none(),
        Status::Success => s.serialize_bool(false),
        Status::Failure(info) => s.serialize_str(info),
    }
}

/// Derives the storage key a message is written under.
pub fn storage_key(message: &Message) -> String {
    if message.is_broadcast() {
        if message.target.is_empty() {
            format!("{}:{}", message.protocol, BROADCAST_SEGMENT)
        } else {
            format!("{}:{}", message.protocol, message.target)
        }
    } else {
        format!("{}:{}:{}", message.protocol, message.target, message.origin)
    }
}

/// Encodes a message into the `(key, value)` pair to write to the store.
pub fn encode(message: &Message) -> serde_json::Result<(String, String)> {
    let key = storage_key(message);
    let value = if message.is_broadcast() {
        serde_json::to_string(&BroadcastRecord {
            data: &message.data,
            origin: &message.origin,
            method: &message.method,
        })?
    } else {
        serde_json::to_string(&CallRecord {
            id: message.call_id,
            data: &message.data,
            error: &message.status,
            method: &message.method,
        })?
    };
    Ok((key, value))
}

/// Decodes an inbound change event addressed to `self_id`.
///
/// Returns `None` for anything this context should ignore: clears (no
/// value), unparseable values, keys outside the protocol namespace, and
/// messages addressed to other contexts.
pub fn decode(self_id: &str, protocol: &str, key: &str, value: Option<&str>) -> Option<Message> {
    let value: Value = serde_json::from_str(value?).ok()?;
    if value.is_null() || !key.starts_with(protocol) {
        return None;
    }

    let broadcast_key = format!("{protocol}:{BROADCAST_SEGMENT}");
    let self_prefix = format!("{protocol}:{self_id}");

    // Broadcast: no id slot, addressed to everyone or to this context.
    if value.get("id").is_none()
        && value.get("method").is_some_and(Value::is_string)
        && value.get("origin").is_some_and(Value::is_string)
        && value.get("data").is_some()
        && (key == broadcast_key || key.starts_with(&self_prefix))
    {
        let target = if key == broadcast_key { "" } else { self_id };
        return Some(Message::broadcast(
            protocol,
            value["origin"].as_str()?,
            target,
            value["method"].as_str()?,
            value["data"].clone(),
        ));
    }

    // Request/response: id slot present, origin recovered from the key.
    if value.get("id").is_some_and(Value::is_u64)
        && value.get("method").is_some_and(Value::is_string)
        && value.get("error").is_some()
        && value.get("data").is_some()
        && key.starts_with(&self_prefix)
    {
        let origin = key.strip_prefix(&format!("{self_prefix}:"))?;
        let status = match &value["error"] {
            Value::String(info) => Status::Failure(info.clone()),
            Value::Bool(false) => Status::Success,
            _ => Status::Unanswered,
        };
        return Some(Message {
            protocol: protocol.to_string(),
            origin: origin.to_string(),
            target: self_id.to_string(),
            method: value["method"].as_str()?.to_string(),
            data: value["data"].clone(),
            call_id: value["id"].as_u64()?,
            status,
        });
    }

    None
}
