use serde_json::Value;
use serde_json::json;

use crate::CallSequence;
use crate::Message;
use crate::Status;
use crate::codec;

const PROTOCOL: &str = "bridge";

fn seq() -> CallSequence {
    CallSequence::new()
}

// ============================================================================
//  ENCODE
// ============================================================================

#[test]
fn global_broadcast_key_and_record() {
    let message = Message::broadcast(PROTOCOL, "AAA", "", "visit", json!({"n": 1}));
    let (key, value) = codec::encode(&message).unwrap();

    assert_eq!(key, "bridge:broadcast");
    let record: Value = serde_json::from_str(&value).unwrap();
    assert_eq!(record["method"], "visit");
    assert_eq!(record["origin"], "AAA");
    assert_eq!(record["data"], json!({"n": 1}));
    assert!(record.get("id").is_none());
}

#[test]
fn targeted_broadcast_key() {
    let message = Message::broadcast(PROTOCOL, "AAA", "BBB", "visit", Value::Null);
    let (key, _) = codec::encode(&message).unwrap();
    assert_eq!(key, "bridge:BBB");
}

#[test]
fn request_key_and_error_slot() {
    let message = Message::request(PROTOCOL, "AAA", "BBB", "say", json!("hi"), &seq());
    let (key, value) = codec::encode(&message).unwrap();

    assert_eq!(key, "bridge:BBB:AAA");
    let record: Value = serde_json::from_str(&value).unwrap();
    assert_eq!(record["id"], 1);
    assert_eq!(record["error"], Value::Null);
    assert_eq!(record["method"], "say");
}

#[test]
fn success_response_encodes_error_false() {
    let mut message = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, &seq());
    message.data = json!("hello");
    message.to_response();

    let (key, value) = codec::encode(&message).unwrap();
    assert_eq!(key, "bridge:AAA:BBB");
    let record: Value = serde_json::from_str(&value).unwrap();
    assert_eq!(record["error"], json!(false));
    assert_eq!(record["data"], json!("hello"));
}

#[test]
fn failure_response_encodes_message_and_nulls_data() {
    let mut message = Message::request(PROTOCOL, "AAA", "BBB", "say", json!("secret"), &seq());
    message.fail("boom");
    message.to_response();

    let (_, value) = codec::encode(&message).unwrap();
    let record: Value = serde_json::from_str(&value).unwrap();
    assert_eq!(record["error"], json!("boom"));
    assert_eq!(record["data"], Value::Null);
}

// ============================================================================
//  DECODE
// ============================================================================

#[test]
fn broadcast_round_trip_at_receiver() {
    let message = Message::broadcast(PROTOCOL, "AAA", "", "visit", json!([1, 2]));
    let (key, value) = codec::encode(&message).unwrap();

    let decoded = codec::decode("BBB", PROTOCOL, &key, Some(&value)).unwrap();
    assert!(decoded.is_broadcast());
    assert_eq!(decoded.method, "visit");
    assert_eq!(decoded.origin, "AAA");
    assert_eq!(decoded.target, "");
    assert_eq!(decoded.data, json!([1, 2]));
}

#[test]
fn targeted_broadcast_decodes_only_at_target() {
    let message = Message::broadcast(PROTOCOL, "AAA", "BBB", "visit", Value::Null);
    let (key, value) = codec::encode(&message).unwrap();

    let decoded = codec::decode("BBB", PROTOCOL, &key, Some(&value)).unwrap();
    assert_eq!(decoded.target, "BBB");

    assert!(codec::decode("CCC", PROTOCOL, &key, Some(&value)).is_none());
}

#[test]
fn request_round_trip_recovers_origin_from_key() {
    let message = Message::request(PROTOCOL, "AAA", "BBB", "say", json!(7), &seq());
    let (key, value) = codec::encode(&message).unwrap();

    let decoded = codec::decode("BBB", PROTOCOL, &key, Some(&value)).unwrap();
    assert!(decoded.is_request());
    assert_eq!(decoded.call_id, message.call_id);
    assert_eq!(decoded.origin, "AAA");
    assert_eq!(decoded.target, "BBB");
    assert_eq!(decoded.status, Status::Unanswered);
}

#[test]
fn response_round_trip_preserves_status() {
    let sequence = seq();
    let mut ok = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, &sequence);
    ok.data = json!("hello");
    ok.to_response();
    let (key, value) = codec::encode(&ok).unwrap();
    let decoded = codec::decode("AAA", PROTOCOL, &key, Some(&value)).unwrap();
    assert_eq!(decoded.status, Status::Success);
    assert_eq!(decoded.data, json!("hello"));

    let mut failed = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, &sequence);
    failed.fail("boom");
    failed.to_response();
    let (key, value) = codec::encode(&failed).unwrap();
    let decoded = codec::decode("AAA", PROTOCOL, &key, Some(&value)).unwrap();
    assert_eq!(decoded.status, Status::Failure("boom".into()));
}

#[test]
fn decode_rejects_foreign_and_malformed_entries() {
    // Cleared key: no value at all.
    assert!(codec::decode("AAA", PROTOCOL, "bridge:broadcast", None).is_none());
    // Unparseable value.
    assert!(codec::decode("AAA", PROTOCOL, "bridge:broadcast", Some("{nope")).is_none());
    // JSON null value.
    assert!(codec::decode("AAA", PROTOCOL, "bridge:broadcast", Some("null")).is_none());
    // Foreign namespace.
    let record = r#"{"data":null,"origin":"BBB","method":"visit"}"#;
    assert!(codec::decode("AAA", PROTOCOL, "other:broadcast", Some(record)).is_none());
    // Unrelated writer on the same store.
    assert!(codec::decode("AAA", PROTOCOL, "bridge:broadcast", Some(r#"{"x":1}"#)).is_none());
    // Call record missing the data slot.
    let partial = r#"{"id":3,"error":null,"method":"say"}"#;
    assert!(codec::decode("AAA", PROTOCOL, "bridge:AAA:BBB", Some(partial)).is_none());
}

// ============================================================================
//  MESSAGE STATE
// ============================================================================

#[test]
fn to_response_swaps_identities_and_forces_success() {
    let mut message = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, &seq());
    message.to_response();
    assert_eq!(message.origin, "BBB");
    assert_eq!(message.target, "AAA");
    assert_eq!(message.status, Status::Success);

    // An already-recorded failure survives the conversion.
    let mut message = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, &seq());
    message.fail("boom");
    message.to_response();
    assert_eq!(message.status, Status::Failure("boom".into()));
}

#[test]
fn call_ids_are_strictly_increasing_across_clones() {
    let sequence = seq();
    let alias = sequence.clone();

    let mut previous = 0;
    for i in 0..16 {
        let source = if i % 2 == 0 { &sequence } else { &alias };
        let message = Message::request(PROTOCOL, "AAA", "BBB", "say", Value::Null, source);
        assert!(message.call_id > previous);
        previous = message.call_id;
    }
}
