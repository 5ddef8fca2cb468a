use std::io::Cursor;

use crate::types::tests::*;

#[test]
fn variant_scalars() {
    serialize_test(Variant::Empty);
    serialize_test(Variant::Boolean(true));
    serialize_test(Variant::SByte(-5));
    serialize_test(Variant::Byte(0xff));
    serialize_test(Variant::Int16(-1003));
    serialize_test(Variant::UInt16(1003));
    serialize_test(Variant::Int32(-56543));
    serialize_test(Variant::UInt32(56543));
    serialize_test(Variant::Int64(-87_224_460_000));
    serialize_test(Variant::UInt64(87_224_460_000));
    serialize_test(Variant::Float(123.456));
    serialize_test(Variant::Double(123.456789));
    serialize_test(Variant::from("a string"));
    serialize_test(Variant::from(DateTime::now()));
    serialize_test(Variant::from(Guid::new()));
    serialize_test(Variant::from(StatusCode::BadDataLost));
    serialize_test(Variant::from(ByteString::from(&[0x1u8, 0x2, 0x3])));
}

#[test]
fn variant_single_dimension_array() {
    let values = vec![Variant::Int32(100), Variant::Int32(200), Variant::Int32(300)];
    let array = Array::new_single(VariantTypeId::Int32, values).unwrap();
    serialize_test(Variant::from(array));
}

#[test]
fn variant_multi_dimension_array() {
    let values = (0..6).map(Variant::Int32).collect::<Vec<_>>();
    let array = Array::new_multi(VariantTypeId::Int32, values, vec![2u32, 3u32]).unwrap();
    serialize_test(Variant::from(array));
}

#[test]
fn variant_from_slice() {
    let v = Variant::from(vec![100u8, 200u8]);
    if let Variant::Array(array) = &v {
        assert_eq!(array.value_type, VariantTypeId::Byte);
        assert_eq!(array.values.len(), 2);
    } else {
        panic!("Expected an array variant");
    }
    serialize_test(v);
}

#[test]
fn variant_array_type_mismatch() {
    // An array cannot be created over values of differing types
    let values = vec![Variant::Int32(100), Variant::Byte(1)];
    assert!(Array::new_single(VariantTypeId::Int32, values).is_err());
}

#[test]
fn variant_unsupported_type_is_rejected() {
    // 17 is the encoding mask of a NodeId, which is not a valid dataset field value here
    let bytes = [17u8, 0x00, 0x01, 0x00];
    let mut stream = Cursor::new(bytes);
    let decoding_options = DecodingOptions::test();
    assert_eq!(
        Variant::decode(&mut stream, &decoding_options).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn variant_array_length_limit() {
    let values = (0..20).map(Variant::Int32).collect::<Vec<_>>();
    let array = Array::new_single(VariantTypeId::Int32, values).unwrap();
    let mut stream = serialize_as_stream(Variant::from(array));
    let decoding_options = DecodingOptions {
        max_array_length: 10,
        ..Default::default()
    };
    assert_eq!(
        Variant::decode(&mut stream, &decoding_options).unwrap_err(),
        StatusCode::BadEncodingLimitsExceeded
    );
}

#[test]
fn variant_type_id() {
    assert_eq!(Variant::Byte(1).type_id(), VariantTypeId::Byte);
    assert_eq!(Variant::from(DateTime::now()).type_id(), VariantTypeId::DateTime);
    assert!(Variant::Double(1.0).is_numeric());
    assert!(!Variant::from("s").is_numeric());
    assert!(Variant::Empty.is_empty());
}
