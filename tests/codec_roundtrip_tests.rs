//! Round trips through the generic and schema-specialized codecs.

use std::str::FromStr;

use rust_decimal::Decimal;
use spindle::{
    ArrayValue, CodecError, FullSerializer, FunctionValue, GenericCodec, JavaObjectValue,
    RecordField, RecordValue, Schema, SchemaCodec, Value,
};

fn record(pairs: Vec<(&str, Value)>) -> Value {
    Value::Record(RecordValue::from_pairs(pairs).unwrap())
}

/// One value of every kind, plus nesting.
fn sample_values() -> Vec<Value> {
    vec![
        Value::Null,
        Value::Boolean(false),
        Value::Boolean(true),
        Value::Long(0),
        Value::Long(-120),
        Value::Long(i64::MIN),
        Value::Long(i64::MAX),
        Value::Double(-0.0),
        Value::Double(f64::NAN),
        Value::Double(1e300),
        Value::Decimal(Decimal::from_str("-12.500").unwrap()),
        Value::from(""),
        Value::from("héllo wörld"),
        Value::binary([0u8, 255, 7]),
        Value::Date(1_700_000_000_000),
        Value::array(vec![]),
        Value::array(vec![Value::Long(1), Value::array(vec![Value::Null])]),
        record(vec![]),
        record(vec![("b", Value::Long(2)), ("a", Value::from("x"))]),
        Value::Function(FunctionValue::new("x -> x + k", [("k", Value::Long(3))]).unwrap()),
        Value::schema(Schema::array_of(Schema::long())),
        Value::JavaObject(JavaObjectValue::new("java.util.UUID", vec![1u8, 2, 3])),
        Value::regex("a+b", "i").unwrap(),
        Value::span(3, 9).unwrap(),
    ]
}

#[test]
fn test_generic_round_trip_every_kind() {
    let codec = GenericCodec::new();
    for value in sample_values() {
        let bytes = codec.to_bytes(&value).unwrap();
        let back = codec.from_bytes(&bytes).unwrap();
        assert_eq!(back, value, "{value}");
        assert_eq!(back.encoding(), value.encoding());
    }
}

#[test]
fn test_generic_round_trip_is_bit_exact() {
    let codec = GenericCodec::new();
    let value = Value::Decimal(Decimal::from_str("1.2300").unwrap());
    let back = codec.from_bytes(&codec.to_bytes(&value).unwrap()).unwrap();
    assert_eq!(back.as_decimal().map(|d| d.scale()), Some(4));

    let nan = Value::Double(f64::from_bits(0x7ff8_0000_0000_0001));
    let back = codec.from_bytes(&codec.to_bytes(&nan).unwrap()).unwrap();
    assert_eq!(back.as_double().map(f64::to_bits), Some(0x7ff8_0000_0000_0001));
}

#[test]
fn test_skip_advances_exactly_past_the_value() {
    let codec = GenericCodec::new();
    for value in sample_values() {
        let mut bytes = codec.to_bytes(&value).unwrap();
        let written = bytes.len();
        bytes.extend_from_slice(&[0xde, 0xad]);
        let mut input = bytes.as_slice();
        codec.skip(&mut input).unwrap();
        assert_eq!(bytes.len() - input.len(), written, "{value}");
    }
}

#[test]
fn test_mixed_array_without_schema() {
    let codec = GenericCodec::new();
    let value = Value::array(vec![Value::Long(1), Value::Long(2), Value::from("x")]);
    let back = codec.from_bytes(&codec.to_bytes(&value).unwrap()).unwrap();
    assert_eq!(back, value);
    assert_eq!(back.as_array().map(ArrayValue::len), Some(3));
}

#[test]
fn test_specialized_round_trip_matching_values() {
    let cases = vec![
        (Schema::long_range(Some(0), None).unwrap(), Value::Long(17)),
        (Schema::string(), Value::from("plain")),
        (Schema::fixed_string(2), Value::from("ok")),
        (Schema::constant(&Value::Long(4)).unwrap(), Value::Long(4)),
        (
            Schema::array(vec![Schema::long()], Some(Schema::string())),
            Value::array(vec![Value::Long(1), Value::from("a"), Value::from("b")]),
        ),
        (
            Schema::record(
                vec![
                    RecordField::required("id", Schema::long()),
                    RecordField::optional("tags", Schema::array_of(Schema::string())),
                ],
                Some(Schema::any()),
            )
            .unwrap(),
            record(vec![
                ("id", Value::Long(9)),
                ("tags", Value::array(vec![Value::from("t")])),
                ("zzz", Value::Double(0.25)),
            ]),
        ),
        (
            Schema::or([Schema::null(), Schema::date()]),
            Value::Date(86_400_000),
        ),
        (Schema::any(), Value::span(1, 2).unwrap()),
    ];
    for (schema, value) in cases {
        assert!(schema.matches(&value), "{schema} should match {value}");
        let codec = SchemaCodec::new(&schema);
        let bytes = codec.to_bytes(&value).unwrap();
        assert_eq!(codec.from_bytes(&bytes).unwrap(), value, "{schema}");

        let mut input = bytes.as_slice();
        codec.skip(&mut input).unwrap();
        assert!(input.is_empty());
    }
}

#[test]
fn test_specialized_encoding_is_shorter() {
    let schema = Schema::array(vec![Schema::long()], Some(Schema::string()));
    let value = Value::array(vec![
        Value::Long(1),
        Value::from("a"),
        Value::from("b"),
        Value::from("c"),
    ]);
    let specialized = SchemaCodec::new(&schema).to_bytes(&value).unwrap();
    let generic = GenericCodec::new().to_bytes(&value).unwrap();
    // One tag per element plus the array tag
    assert_eq!(generic.len() - specialized.len(), 5);
}

#[test]
fn test_schema_values_round_trip() {
    let schema = Schema::record(
        vec![
            RecordField::required("a", Schema::or([Schema::long(), Schema::string()])),
            RecordField::optional("b", Schema::string_with(None, Some(4), Some("[a-z]*")).unwrap()),
        ],
        None,
    )
    .unwrap();
    let codec = GenericCodec::new();
    let value = Value::schema(schema.clone());
    let back = codec.from_bytes(&codec.to_bytes(&value).unwrap()).unwrap();
    assert_eq!(back.as_schema(), Some(&schema));
}

#[test]
fn test_truncated_input_is_recoverable() {
    let codec = GenericCodec::new();
    let bytes = codec
        .to_bytes(&record(vec![("a", Value::from("abcdef")), ("b", Value::Long(1))]))
        .unwrap();
    for cut in 1..bytes.len() {
        let err = codec.from_bytes(&bytes[..cut]).unwrap_err();
        assert!(err.is_recoverable(), "cut at {cut}: {err}");
    }
}

#[test]
fn test_trailing_bytes_rejected() {
    let codec = GenericCodec::new();
    let mut bytes = codec.to_bytes(&Value::Long(1)).unwrap();
    bytes.push(0);
    assert!(matches!(codec.from_bytes(&bytes), Err(CodecError::Malformed(_))));
}

#[test]
fn test_specialized_truncation_never_yields_partial_values() {
    let fields = (0..10)
        .map(|i| RecordField::required(format!("field{i}"), Schema::long()))
        .collect();
    let schema = Schema::record(fields, None).unwrap();
    let value = Value::Record(
        RecordValue::from_pairs((0..10).map(|i| (format!("field{i}"), Value::Long(i * 1000))))
            .unwrap(),
    );
    let codec = SchemaCodec::new(&schema);
    let bytes = codec.to_bytes(&value).unwrap();
    for cut in 0..bytes.len() {
        assert!(matches!(
            codec.from_bytes(&bytes[..cut]),
            Err(CodecError::Truncated)
        ));
    }
}

#[test]
fn test_invalid_content_is_malformed() {
    let mut bad_decimal = vec![4u8];
    let mut payload = [0u8; 16];
    payload[2] = 29;
    bad_decimal.extend_from_slice(&payload);

    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("string with invalid UTF-8", vec![5, 1, 0xff]),
        ("regex that does not compile", vec![14, 1, b'(', 0]),
        ("decimal scale above 28", bad_decimal),
        ("spilled element with invalid UTF-8", vec![9, 1, 3, 5, 1, 0xff]),
        ("spilled element with bad regex", vec![9, 1, 4, 14, 1, b'(', 0]),
        ("record field with invalid UTF-8", vec![10, 1, 1, b'a', 5, 1, 0xff]),
        ("span ending before it begins", vec![15, 0x85, 0x81]),
    ];
    let codec = GenericCodec::new();
    for (what, bytes) in cases {
        let err = codec.from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)), "{what}: {err}");
        assert!(err.is_recoverable(), "{what}");
    }
}

#[test]
fn test_lazy_record_with_invalid_content_is_malformed() {
    let fields = (0..8)
        .map(|i| RecordField::required(format!("f{i}"), Schema::string()))
        .collect();
    let codec = SchemaCodec::new(&Schema::record(fields, None).unwrap());
    let mut bytes = codec
        .to_bytes(&Value::Record(
            RecordValue::from_pairs((0..8).map(|i| (format!("f{i}"), Value::from("x")))).unwrap(),
        ))
        .unwrap();
    let last = bytes.len() - 1;
    bytes[last] = 0xff;
    assert!(matches!(codec.from_bytes(&bytes), Err(CodecError::Malformed(_))));
}
