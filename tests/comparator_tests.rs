//! Byte-level comparison against the value order.

use std::cmp::Ordering;

use spindle::{
    ArrayBuilder, CodecError, CodecSession, Comparator, Config, FullSerializer, GenericCodec,
    RecordField, RecordValue, Schema, Value,
};

fn heterogeneous() -> Vec<Value> {
    vec![
        Value::Null,
        Value::Boolean(true),
        Value::Long(-3),
        Value::Long(5),
        Value::Double(5.0),
        Value::Double(-0.0),
        Value::Double(0.0),
        Value::from("a"),
        Value::from("ab"),
        Value::binary(b"ab"),
        Value::array(vec![Value::Long(1)]),
        Value::array(vec![Value::Long(1), Value::Null]),
        Value::Record(RecordValue::from_pairs([("a", Value::Long(1))]).unwrap()),
        Value::Date(0),
        Value::span(0, 1).unwrap(),
    ]
}

#[test]
fn test_byte_order_agrees_with_value_order() {
    let codec = GenericCodec::new();
    let mut comparator = Comparator::generic();
    let values = heterogeneous();
    let encoded: Vec<Vec<u8>> = values.iter().map(|v| codec.to_bytes(v).unwrap()).collect();
    for (x, ex) in values.iter().zip(&encoded) {
        for (y, ey) in values.iter().zip(&encoded) {
            assert_eq!(
                comparator.compare_slices(ex, ey).unwrap(),
                x.try_cmp(y).unwrap(),
                "{x} vs {y}"
            );
        }
    }
}

#[test]
fn test_long_sorts_before_double_of_equal_magnitude() {
    let codec = GenericCodec::new();
    let mut comparator = Comparator::generic();
    let long = codec.to_bytes(&Value::Long(5)).unwrap();
    let double = codec.to_bytes(&Value::Double(5.0)).unwrap();
    assert_eq!(comparator.compare_slices(&long, &double).unwrap(), Ordering::Less);
    assert_eq!(comparator.compare_slices(&double, &long).unwrap(), Ordering::Greater);
}

#[test]
fn test_sort_encoded_values() {
    let codec = GenericCodec::new();
    let mut comparator = Comparator::generic();
    let mut values = heterogeneous();
    values.reverse();
    let mut encoded: Vec<Vec<u8>> = values.iter().map(|v| codec.to_bytes(v).unwrap()).collect();
    encoded.sort_by(|a, b| comparator.compare_slices(a, b).unwrap());

    let mut expected = values.clone();
    expected.sort();
    let decoded: Vec<Value> = encoded.iter().map(|b| codec.from_bytes(b).unwrap()).collect();
    assert_eq!(decoded, expected);
}

#[test]
fn test_hash_agrees_across_encodings() {
    let session = CodecSession::new(Config::default());
    let mut builder = session.array_builder();
    for i in 0..5000 {
        builder.push(Value::Long(i)).unwrap();
    }
    let spilled = builder.build();
    let fixed = Value::array((0..5000).map(Value::Long).collect());
    assert_eq!(spilled, fixed);

    let codec = session.generic();
    let (a, b) = (codec.to_bytes(&spilled).unwrap(), codec.to_bytes(&fixed).unwrap());
    assert_ne!(a, b);
    let mut comparator = session.comparator();
    assert_eq!(comparator.compare_slices(&a, &b).unwrap(), Ordering::Equal);
    assert_eq!(
        comparator.long_hash(&a, 0, a.len()).unwrap(),
        comparator.long_hash(&b, 0, b.len()).unwrap()
    );
    assert_eq!(spilled.long_hash(), fixed.long_hash());
}

#[test]
fn test_spilled_fast_path_stops_at_first_difference() {
    let mut builder = ArrayBuilder::spilling(GenericCodec::new(), 4);
    for i in 0..100 {
        builder.push(Value::Long(i)).unwrap();
    }
    let spilled = builder.build();
    let mut comparator = Comparator::generic();

    let smaller = Value::array(vec![Value::Long(0), Value::Long(0)]);
    assert_eq!(comparator.compare_values(&spilled, &smaller).unwrap(), Ordering::Greater);
    let prefix = Value::array((0..100).map(Value::Long).collect());
    assert_eq!(comparator.compare_values(&prefix, &spilled).unwrap(), Ordering::Equal);
}

#[test]
fn test_schema_comparator_on_records() {
    let schema = Schema::record(
        vec![
            RecordField::required("k", Schema::string()),
            RecordField::optional("v", Schema::long()),
        ],
        None,
    )
    .unwrap();
    let session = CodecSession::default();
    let codec = session.codec_for(&schema);
    let mut comparator = session.comparator_for(&schema);

    let rows = [
        RecordValue::from_pairs([("k", Value::from("a"))]).unwrap(),
        RecordValue::from_pairs([("k", Value::from("a")), ("v", Value::Long(2))]).unwrap(),
        RecordValue::from_pairs([("k", Value::from("b")), ("v", Value::Long(-1))]).unwrap(),
    ];
    let values: Vec<Value> = rows.into_iter().map(Value::Record).collect();
    for x in &values {
        for y in &values {
            let (bx, by) = (codec.to_bytes(x).unwrap(), codec.to_bytes(y).unwrap());
            assert_eq!(
                comparator.compare_slices(&bx, &by).unwrap(),
                x.try_cmp(y).unwrap()
            );
        }
    }
}

#[test]
fn test_function_comparison_is_an_error() {
    let codec = GenericCodec::new();
    let f = Value::Function(spindle::FunctionValue::new("f", Vec::<(&str, Value)>::new()).unwrap());
    let bytes = codec.to_bytes(&f).unwrap();
    let mut comparator = Comparator::generic();
    let err = comparator.compare_slices(&bytes, &bytes).unwrap_err();
    assert!(matches!(err, CodecError::NotComparable(_)));
    assert!(!err.is_recoverable());
    assert!(comparator.long_hash(&bytes, 0, bytes.len()).is_err());
}
