//! Property-based codec, comparator and schema tests (proptest).

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::cmp::Ordering;

use spindle::{
    Comparator, FullSerializer, GenericCodec, RecordField, RecordValue, Schema, SchemaCodec, Value,
};

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Long),
        (-1000i64..1000).prop_map(Value::Long),
        any::<f64>().prop_map(Value::Double),
        (any::<i64>(), 0u32..10).prop_map(|(m, s)| Value::Decimal(Decimal::new(m, s))),
        "[a-zé]{0,8}".prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::binary),
        any::<i64>().prop_map(Value::Date),
        (any::<i32>(), 0i64..100).prop_map(|(begin, len)| {
            Value::span(i64::from(begin), i64::from(begin) + len).unwrap()
        }),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::array),
            prop::collection::btree_map("[a-d]{1,2}", inner, 0..4)
                .prop_map(|fields| Value::Record(RecordValue::from_pairs(fields).unwrap())),
        ]
    })
}

/// The most specific unconstrained schema describing `value`'s shape.
fn shape_of(value: &Value) -> Schema {
    match value {
        Value::Null => Schema::null(),
        Value::Boolean(_) => Schema::boolean(),
        Value::Long(_) => Schema::long(),
        Value::Double(_) => Schema::double(),
        Value::Decimal(_) => Schema::decimal(),
        Value::String(_) => Schema::string(),
        Value::Binary(_) => Schema::binary(),
        Value::Date(_) => Schema::date(),
        Value::Span(..) => Schema::span(),
        Value::Array(items) => Schema::array(items.iter().map(|v| shape_of(&v)).collect(), None),
        Value::Record(record) => Schema::record(
            record
                .iter()
                .map(|(name, v)| RecordField::required(name, shape_of(v)))
                .collect(),
            None,
        )
        .unwrap(),
        _ => Schema::any(),
    }
}

fn sign(ord: Ordering) -> i8 {
    ord as i8
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Decoding an encoded value yields an equal value
    #[test]
    fn prop_generic_round_trip(v in arb_value()) {
        let codec = GenericCodec::new();
        let bytes = codec.to_bytes(&v).unwrap();
        prop_assert_eq!(codec.from_bytes(&bytes).unwrap(), v);
    }

    /// Skip consumes exactly the bytes write produced
    #[test]
    fn prop_skip_matches_write(v in arb_value(), tail in prop::collection::vec(any::<u8>(), 0..4)) {
        let codec = GenericCodec::new();
        let mut bytes = codec.to_bytes(&v).unwrap();
        let written = bytes.len();
        bytes.extend_from_slice(&tail);
        let mut input = bytes.as_slice();
        codec.skip(&mut input).unwrap();
        prop_assert_eq!(input.len(), tail.len());
        prop_assert_eq!(bytes.len() - tail.len(), written);
    }

    /// Byte comparison has the sign of value comparison
    #[test]
    fn prop_comparator_agrees_with_values(a in arb_value(), b in arb_value()) {
        let codec = GenericCodec::new();
        let mut comparator = Comparator::generic();
        let (ea, eb) = (codec.to_bytes(&a).unwrap(), codec.to_bytes(&b).unwrap());
        prop_assert_eq!(
            sign(comparator.compare_slices(&ea, &eb).unwrap()),
            sign(a.try_cmp(&b).unwrap())
        );
    }

    /// Equal values hash equally, encoded or not
    #[test]
    fn prop_hash_agrees_with_equality(a in arb_value(), b in arb_value()) {
        let codec = GenericCodec::new();
        let mut comparator = Comparator::generic();
        let ea = codec.to_bytes(&a).unwrap();
        prop_assert_eq!(comparator.long_hash(&ea, 0, ea.len()).unwrap(), a.long_hash());
        if a.try_cmp(&b).unwrap() == Ordering::Equal {
            prop_assert_eq!(a.long_hash(), b.long_hash());
        }
    }

    /// The encoded order is transitive
    #[test]
    fn prop_total_order_transitive(a in arb_value(), b in arb_value(), c in arb_value()) {
        let codec = GenericCodec::new();
        let mut comparator = Comparator::generic();
        let (ea, eb, ec) = (
            codec.to_bytes(&a).unwrap(),
            codec.to_bytes(&b).unwrap(),
            codec.to_bytes(&c).unwrap(),
        );
        let ab = comparator.compare_slices(&ea, &eb).unwrap();
        let bc = comparator.compare_slices(&eb, &ec).unwrap();
        if ab != Ordering::Greater && bc != Ordering::Greater {
            prop_assert_ne!(comparator.compare_slices(&ea, &ec).unwrap(), Ordering::Greater);
        }
    }

    /// Values round trip through the codec of their own shape
    #[test]
    fn prop_specialized_round_trip(v in arb_value()) {
        let schema = shape_of(&v);
        prop_assert!(schema.matches(&v));
        let codec = SchemaCodec::new(&schema);
        let bytes = codec.to_bytes(&v).unwrap();
        prop_assert_eq!(codec.from_bytes(&bytes).unwrap(), v);
    }

    /// A merged schema matches what either operand matched, and merging
    /// commutes
    #[test]
    fn prop_merge_covers_both_operands(a in arb_value(), b in arb_value()) {
        let (sa, sb) = (shape_of(&a), shape_of(&b));
        let merged = sa.merge_or_union(&sb);
        prop_assert!(merged.matches(&a), "{} does not match {}", merged, a);
        prop_assert!(merged.matches(&b), "{} does not match {}", merged, b);
        prop_assert_eq!(&merged, &sb.merge_or_union(&sa));
        if let Some(strict) = sa.merge(&sb) {
            prop_assert!(strict.matches(&a) && strict.matches(&b));
        }
    }

    /// Values sharing a merged schema compare correctly in its encoding
    #[test]
    fn prop_specialized_compare(a in arb_value(), b in arb_value()) {
        let schema = shape_of(&a).merge_or_union(&shape_of(&b));
        let codec = SchemaCodec::new(&schema);
        let (ea, eb) = (codec.to_bytes(&a).unwrap(), codec.to_bytes(&b).unwrap());
        let ord = codec.compare(&mut ea.as_slice(), &mut eb.as_slice()).unwrap();
        prop_assert_eq!(sign(ord), sign(a.try_cmp(&b).unwrap()));
    }
}
