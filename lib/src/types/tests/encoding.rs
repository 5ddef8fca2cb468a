use std::io::Cursor;

use chrono::{TimeZone, Utc};

use crate::types::tests::*;

#[test]
fn encoding_bool() {
    serialize_test(true);
    serialize_test(false);
}

#[test]
fn encoding_sbyte() {
    serialize_test(0i8);
    serialize_test(100i8);
    serialize_test(-90i8);
}

#[test]
fn encoding_byte() {
    serialize_test(0u8);
    serialize_test(255u8);
    serialize_test(90u8);
}

#[test]
fn encoding_int16() {
    serialize_test(0i16);
    serialize_test(-17000i16);
    serialize_test(32000i16);
}

#[test]
fn encoding_uint16() {
    serialize_test(0u16);
    serialize_test(57000u16);
    serialize_test(32000u16);
}

#[test]
fn encoding_int32() {
    serialize_test(0i32);
    serialize_test(-17444000i32);
    serialize_test(32004440i32);
}

#[test]
fn encoding_uint32() {
    serialize_test(0u32);
    serialize_test(57055500u32);
    serialize_test(32555000u32);
}

#[test]
fn encoding_int64() {
    serialize_test(0i64);
    serialize_test(-17442224000i64);
    serialize_test(32022204440i64);
}

#[test]
fn encoding_uint64() {
    serialize_test(0u64);
    serialize_test(57054445500u64);
    serialize_test(34442555000u64);
}

#[test]
fn encoding_f32() {
    serialize_test(0f32);
    serialize_test(12.4342f32);
    serialize_test(5686.222f32);
}

#[test]
fn encoding_f64() {
    serialize_test(0f64);
    serialize_test(12.43424324234f64);
    serialize_test(5686.222342342f64);
}

#[test]
fn encoding_string() {
    // Null
    serialize_test(UAString::null());
    // UTF-8 strings
    serialize_test(UAString::from(""));
    serialize_test(UAString::from("ショッピング"));
    serialize_test(UAString::from("This is a test"));
}

#[test]
fn encode_string_part_6_5224() {
    // Sample from OPCUA Part 6 - 5.2.2.4
    let expected = [0x06, 0x00, 0x00, 0x00, 0xE6, 0xB0, 0xB4, 0x42, 0x6F, 0x79];
    let input = UAString::from("水Boy");
    serialize_and_compare(input, &expected);
}

#[test]
fn decode_string_malformed_utf8() {
    // Test that string returns a decoding error when it receives some malformed UTF-8
    // Bytes below are a mangled 水Boy, missing a byte
    let bytes = [0x06, 0x00, 0x00, 0xE6, 0xB0, 0xB4, 0x42, 0x6F, 0x79];
    let mut stream = Cursor::new(bytes);
    let decoding_options = DecodingOptions::test();
    assert_eq!(
        UAString::decode(&mut stream, &decoding_options).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn decode_string_length_limit() {
    // A string longer than the limit is rejected before anything is allocated for it
    let value = UAString::from("A string of some length");
    let mut stream = serialize_as_stream(value);
    let decoding_options = DecodingOptions {
        max_string_length: 10,
        ..Default::default()
    };
    assert_eq!(
        UAString::decode(&mut stream, &decoding_options).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn encoding_byte_string() {
    serialize_test(ByteString::null());
    serialize_test(ByteString::from(vec![]));
    serialize_test(ByteString::from(&[0x0u8, 0x1, 0x2, 0x3]));
}

#[test]
fn encoding_datetime() {
    let now = DateTime::now();
    serialize_test(now);

    let epoch = DateTime::epoch();
    serialize_test(epoch);

    let ymd = DateTime::ymd_hms(2019, 5, 21, 13, 45, 7);
    serialize_test(ymd);
}

#[test]
fn date_time_clamps_to_valid_range() {
    // Negative ticks are clamped to the epoch on encoding
    let before_epoch = DateTime::from(Utc.ymd(1066, 10, 14).and_hms(0, 0, 0));
    assert_eq!(before_epoch.checked_ticks(), 0);

    // The endtimes encode to max int64
    assert_eq!(DateTime::from(i64::MAX), DateTime::endtimes());
}

#[test]
fn encoding_guid() {
    use std::str::FromStr;
    let guid = Guid::from_str("f9e561f3-351c-47a2-b969-b8d6d7226fee").unwrap();
    let new_guid = serialize_test_and_return(guid.clone());
    assert_eq!(new_guid.to_string(), "f9e561f3-351c-47a2-b969-b8d6d7226fee");
    serialize_test(Guid::null());
    serialize_test(Guid::new());
}

#[test]
fn encoding_status_code() {
    serialize_test(StatusCode::Good);
    serialize_test(StatusCode::BadDecodingError);
    serialize_test(StatusCode::BadTimeout | StatusCode::OVERFLOW);
}

#[test]
fn encoding_data_value_value_only() {
    let data_value = DataValue::from(Variant::from(100u16));
    serialize_test(data_value);
}

#[test]
fn encoding_data_value_full() {
    let data_value = DataValue {
        value: Some(Variant::Double(1234.5678)),
        status: Some(StatusCode::Good),
        source_timestamp: Some(DateTime::now()),
        source_picoseconds: Some(100),
        server_timestamp: Some(DateTime::now()),
        server_picoseconds: Some(200),
    };
    serialize_test(data_value);
}

#[test]
fn decoding_data_value_discards_orphan_picoseconds() {
    // Picoseconds without their timestamp are dropped by the decoder
    let data_value = DataValue {
        value: None,
        status: None,
        source_timestamp: None,
        source_picoseconds: Some(100),
        server_timestamp: None,
        server_picoseconds: Some(200),
    };
    let decoded = serialize_test_and_return_expected(data_value, DataValue::null());
    assert!(decoded.source_picoseconds.is_none());
    assert!(decoded.server_picoseconds.is_none());
}
