use serde_json::json;

use crate::types::*;

#[test]
fn serialize_variant() {
    let v = serde_json::to_value(Variant::from("Hello")).unwrap();
    assert_eq!(v, json!({"String": {"value": "Hello"}}));

    let v = serde_json::to_value(Variant::Byte(42)).unwrap();
    assert_eq!(v, json!({"Byte": 42}));
}

#[test]
fn serialize_date_time() {
    // DateTime serializes as its tick count
    let dt = DateTime::epoch();
    let v = serde_json::to_value(dt).unwrap();
    assert_eq!(v, json!(0));
    let dt2: DateTime = serde_json::from_value(v).unwrap();
    assert_eq!(dt, dt2);
}

#[test]
fn serialize_status_code() {
    // StatusCode serializes as its raw bits
    let v = serde_json::to_value(StatusCode::BadDecodingError).unwrap();
    assert_eq!(v, json!(0x8007_0000u32));
    let s: StatusCode = serde_json::from_value(v).unwrap();
    assert_eq!(s, StatusCode::BadDecodingError);
}

#[test]
fn serialize_byte_string() {
    // ByteString serializes as base64
    let v = serde_json::to_value(ByteString::from(b"hello".as_ref())).unwrap();
    assert_eq!(v, json!("aGVsbG8="));
}
