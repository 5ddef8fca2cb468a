use std::io::Cursor;

use crate::message::*;
use crate::types::tests::{serialize_and_compare, serialize_test};
use crate::types::*;

fn decode_message(bytes: &[u8]) -> EncodingResult<UadpNetworkMessage> {
    let mut stream = Cursor::new(bytes);
    UadpNetworkMessage::decode(&mut stream, &DecodingOptions::test())
}

/// The simplest message a publisher can produce - no optional headers at all, one
/// key frame with a single Byte field.
#[test]
fn decode_minimal_key_frame() {
    let bytes = [
        // UADPFlags - version 1, nothing else
        0x01, //
        // DataSetFlags1 - valid, variant encoding, key frame
        0x01, //
        // Field count 1, then a Byte variant of value 42
        0x01, 0x00, 0x03, 0x2a,
    ];
    let message = decode_message(&bytes).unwrap();
    assert_eq!(message.message_type, NetworkMessageType::DataSetMessage);
    assert!(message.publisher_id.is_none());
    assert!(message.group_header.is_none());
    assert_eq!(message.messages.len(), 1);

    let data_set_message = &message.messages[0];
    assert!(data_set_message.valid);
    assert_eq!(data_set_message.message_type(), DataSetMessageType::KeyFrame);
    match data_set_message.payload {
        DataSetMessagePayload::KeyFrame(ref fields) => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].value(), Some(&Variant::Byte(42)));
        }
        _ => panic!("Expected a key frame"),
    }
}

#[test]
fn encode_minimal_key_frame() {
    let message = UadpNetworkMessage {
        messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(42)])],
        ..Default::default()
    };
    let expected = [0x01u8, 0x01, 0x01, 0x00, 0x03, 0x2a];
    serialize_and_compare(message, &expected);
}

/// The header shape the tutorial publisher produces - a UInt16 publisher id and a
/// payload header naming the dataset writer.
#[test]
fn decode_publisher_id_and_payload_header() {
    let bytes = [
        // UADPFlags - version 1, publisher id, payload header, extended flags 1
        0xd1, //
        // ExtendedFlags1 - publisher id type UInt16
        0x01, //
        // Publisher id 2234
        0xba, 0x08, //
        // Payload header - 1 message from writer 62541
        0x01, 0x4d, 0xf4, //
        // DataSetMessage as in the minimal case
        0x01, 0x01, 0x00, 0x03, 0x2a,
    ];
    let message = decode_message(&bytes).unwrap();
    assert_eq!(message.publisher_id, Some(PublisherId::UInt16(2234)));
    assert_eq!(message.data_set_writer_ids, Some(vec![62541]));
    assert_eq!(message.messages.len(), 1);
}

#[test]
fn encode_publisher_id_and_payload_header() {
    let message = UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        data_set_writer_ids: Some(vec![62541]),
        messages: vec![DataSetMessage::key_frame(vec![Variant::Byte(42)])],
        ..Default::default()
    };
    let expected = [
        0xd1u8, 0x01, 0xba, 0x08, 0x01, 0x4d, 0xf4, 0x01, 0x01, 0x00, 0x03, 0x2a,
    ];
    serialize_and_compare(message, &expected);
}

#[test]
fn decode_group_header() {
    let bytes = [
        // UADPFlags - version 1, group header
        0x21, //
        // GroupFlags - writer group id, group version, sequence number
        0x0b, //
        // Writer group id 100
        0x64, 0x00, //
        // Group version 1000
        0xe8, 0x03, 0x00, 0x00, //
        // Sequence number 7
        0x07, 0x00, //
        // An empty key frame
        0x01, 0x00, 0x00,
    ];
    let message = decode_message(&bytes).unwrap();
    let group_header = message.group_header.as_ref().unwrap();
    assert_eq!(group_header.writer_group_id, Some(100));
    assert_eq!(group_header.group_version, Some(1000));
    assert_eq!(group_header.network_message_number, None);
    assert_eq!(group_header.sequence_number, Some(7));
    assert_eq!(message.writer_group_id(), Some(100));

    match message.messages[0].payload {
        DataSetMessagePayload::KeyFrame(ref fields) => assert!(fields.is_empty()),
        _ => panic!("Expected a key frame"),
    }
}

/// When the payload header advertises more than one message, a sizes array delimits them
#[test]
fn multiple_messages_round_trip() {
    let message = UadpNetworkMessage {
        publisher_id: Some(PublisherId::Byte(60)),
        data_set_writer_ids: Some(vec![1, 2]),
        messages: vec![
            DataSetMessage::key_frame(vec![Variant::Byte(1), Variant::from("one")]),
            DataSetMessage::key_frame(vec![Variant::Double(2.0)]),
        ],
        ..Default::default()
    };
    serialize_test(message);
}

#[test]
fn sizes_array_must_match_contents() {
    // Two messages whose advertised sizes disagree with what the messages consume
    let bytes = [
        // UADPFlags - version 1, payload header
        0x41, //
        // Payload header - 2 messages
        0x02, 0x01, 0x00, 0x02, 0x00, //
        // Sizes - 7 and 5 bytes, but the first message only spans 5
        0x07, 0x00, 0x05, 0x00, //
        // Message 1 - a key frame with one Byte field plus two bytes of padding
        0x01, 0x01, 0x00, 0x03, 0x2a, 0x00, 0x00, //
        // Message 2
        0x01, 0x01, 0x00, 0x03, 0x2a,
    ];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn unsupported_version_is_rejected() {
    let bytes = [0x02u8, 0x01, 0x01, 0x00, 0x03, 0x2a];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn chunked_messages_are_rejected() {
    let bytes = [
        // UADPFlags - version 1, extended flags 1
        0x81, //
        // ExtendedFlags1 - extended flags 2 follows
        0x80, //
        // ExtendedFlags2 - chunk
        0x01,
    ];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadNotSupported);
}

#[test]
fn encrypted_messages_are_rejected() {
    let bytes = [
        // UADPFlags - version 1, extended flags 1
        0x81, //
        // ExtendedFlags1 - security
        0x10, //
        // SecurityFlags - encrypted, token id 1, empty nonce
        0x02, 0x01, 0x00, 0x00, 0x00, 0x00,
    ];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadNotSupported);
}

#[test]
fn signed_messages_decode() {
    let bytes = [
        // UADPFlags - version 1, extended flags 1
        0x81, //
        // ExtendedFlags1 - security
        0x10, //
        // SecurityFlags - signed, token id 1, 2 byte nonce
        0x01, 0x01, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb, //
        // An empty key frame
        0x01, 0x00, 0x00,
    ];
    let message = decode_message(&bytes).unwrap();
    let security_header = message.security_header.as_ref().unwrap();
    assert!(security_header.signed);
    assert!(!security_header.encrypted);
    assert_eq!(security_header.token_id, 1);
    assert_eq!(security_header.nonce, vec![0xaa, 0xbb]);
    assert_eq!(message.messages.len(), 1);
}

#[test]
fn truncated_message_is_rejected() {
    let bytes = [0x01u8, 0x01, 0x01];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn raw_field_encoding_is_rejected() {
    // DataSetFlags1 with field encoding raw data
    let bytes = [0x01u8, 0x03, 0x01, 0x00];
    assert_eq!(decode_message(&bytes).unwrap_err(), StatusCode::BadNotSupported);
}

#[test]
fn discovery_messages_skip_payload() {
    let bytes = [
        // UADPFlags - version 1, extended flags 1
        0x81, //
        // ExtendedFlags1 - extended flags 2 follows
        0x80, //
        // ExtendedFlags2 - network message type discovery request
        0x04,
    ];
    let message = decode_message(&bytes).unwrap();
    assert_eq!(message.message_type, NetworkMessageType::DiscoveryRequest);
    assert!(message.messages.is_empty());
}

#[test]
fn promoted_fields_are_skipped_as_raw_bytes() {
    let bytes = [
        // UADPFlags - version 1, extended flags 1
        0x81, //
        // ExtendedFlags1 - extended flags 2 follows
        0x80, //
        // ExtendedFlags2 - promoted fields
        0x02, //
        // Promoted fields - 3 bytes, uninterpreted
        0x03, 0x00, 0xde, 0xad, 0x01, //
        // An empty key frame
        0x01, 0x00, 0x00,
    ];
    let message = decode_message(&bytes).unwrap();
    assert_eq!(message.promoted_fields, Some(vec![0xde, 0xad, 0x01]));
    assert_eq!(message.messages.len(), 1);
}

#[test]
fn delta_frame_round_trip() {
    let message = DataSetMessage {
        sequence_number: Some(33),
        payload: DataSetMessagePayload::DeltaFrame(vec![
            (2, DataSetFieldValue::Variant(Variant::Double(99.5))),
            (5, DataSetFieldValue::Variant(Variant::Boolean(true))),
        ]),
        ..Default::default()
    };
    serialize_test(message);
}

#[test]
fn keep_alive_round_trip() {
    let message = DataSetMessage {
        sequence_number: Some(12000),
        payload: DataSetMessagePayload::KeepAlive,
        ..Default::default()
    };
    serialize_test(message);
}

#[test]
fn event_with_data_value_fields_round_trip() {
    let message = DataSetMessage {
        field_encoding: DataSetFieldEncoding::DataValue,
        timestamp: Some(DateTime::ymd_hms(2024, 3, 1, 10, 30, 0)),
        payload: DataSetMessagePayload::Event(vec![DataSetFieldValue::DataValue(
            DataValue::new_now(Variant::UInt32(1234)),
        )]),
        ..Default::default()
    };
    serialize_test(message);
}

#[test]
fn data_set_message_status_travels_as_severity() {
    // Only the top 16 bits of a status code are on the wire, which is enough to carry
    // the whole code for the codes a publisher would send
    let message = DataSetMessage {
        status: Some(StatusCode::BadConfigurationError),
        ..Default::default()
    };
    let decoded = crate::types::tests::serialize_test_and_return(message);
    assert_eq!(decoded.status, Some(StatusCode::BadConfigurationError));
}

/// A message with every optional header present survives a round trip
#[test]
fn full_header_round_trip() {
    let message = UadpNetworkMessage {
        message_type: NetworkMessageType::DataSetMessage,
        publisher_id: Some(PublisherId::String(UAString::from("publisher-7"))),
        data_set_class_id: Some(Guid::new()),
        group_header: Some(GroupHeader {
            writer_group_id: Some(100),
            group_version: Some(1_677_000_000),
            network_message_number: Some(1),
            sequence_number: Some(4660),
        }),
        data_set_writer_ids: Some(vec![62541]),
        timestamp: Some(DateTime::ymd_hms(2024, 3, 1, 10, 30, 0)),
        picoseconds: Some(500),
        promoted_fields: Some(vec![0x01, 0x02, 0x03]),
        security_header: Some(SecurityHeader {
            signed: true,
            encrypted: false,
            force_key_reset: false,
            token_id: 99,
            nonce: vec![1, 2, 3, 4],
            footer_size: Some(0),
        }),
        messages: vec![DataSetMessage {
            valid: true,
            field_encoding: DataSetFieldEncoding::Variant,
            sequence_number: Some(7),
            timestamp: Some(DateTime::ymd_hms(2024, 3, 1, 10, 30, 0)),
            picoseconds: Some(10),
            status: Some(StatusCode::Good),
            config_version_major: Some(1),
            config_version_minor: Some(2),
            payload: DataSetMessagePayload::KeyFrame(vec![
                DataSetFieldValue::Variant(Variant::Byte(1)),
                DataSetFieldValue::Variant(Variant::from(DateTime::ymd_hms(2024, 3, 1, 10, 30, 0))),
            ]),
        }],
    };
    serialize_test(message);
}
