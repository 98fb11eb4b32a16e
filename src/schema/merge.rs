//! Merging, unions and subsumption.
//!
//! `merge` returns the most specific schema matching every value either
//! operand matches, or `None` when the shapes cannot be generalised into one
//! schema of a single kind. `merge_or_union` falls back to an `Or`.

use std::cmp::{max, min};

use super::{
    ArraySchema, BinarySchema, NumericSchema, RecordField, RecordSchema, Schema, SchemaKind,
    StringSchema,
};
use crate::value::Value;

impl Schema {
    /// Canonical union: nested unions are flattened, members subsumed by
    /// another member are dropped and the rest is sorted. A single surviving
    /// member is returned as is.
    pub fn or(members: impl IntoIterator<Item = Schema>) -> Schema {
        let mut flat = Vec::new();
        for member in members {
            flatten_into(member, &mut flat);
        }
        if flat.iter().any(|m| matches!(m.kind, SchemaKind::Any)) {
            return Schema::any();
        }
        flat.sort();
        flat.dedup();

        // Of two equivalent members the first one stays
        let kept: Vec<Schema> = flat
            .iter()
            .enumerate()
            .filter(|(i, m)| {
                !flat.iter().enumerate().any(|(j, other)| {
                    j != *i && m.is_subsumed_by(other) && (j < *i || !other.is_subsumed_by(m))
                })
            })
            .map(|(_, m)| m.clone())
            .collect();

        if kept.len() == 1 {
            kept.into_iter().next().unwrap_or_else(Schema::any)
        } else {
            Schema::new(SchemaKind::Or(kept))
        }
    }

    /// Merges with `other`, falling back to their union.
    pub fn merge_or_union(&self, other: &Schema) -> Schema {
        self.merge(other)
            .unwrap_or_else(|| Schema::or([self.clone(), other.clone()]))
    }

    /// Most specific single schema matching every value either operand
    /// matches. Commutative.
    ///
    /// Returns `None` for different kinds, and for an array schema that
    /// matches only the empty array against one that matches only non-empty
    /// arrays.
    pub fn merge(&self, other: &Schema) -> Option<Schema> {
        use SchemaKind as K;

        if self == other {
            return Some(self.clone());
        }
        let kind = match (&self.kind, &other.kind) {
            (K::Any, _) | (_, K::Any) => K::Any,
            (K::Or(_), _) | (_, K::Or(_)) => {
                return Some(Schema::or([self.clone(), other.clone()]));
            }
            (K::Null, K::Null) => K::Null,
            (K::Boolean { value: a }, K::Boolean { value: b }) => K::Boolean {
                value: if a == b { *a } else { None },
            },
            (K::Long(a), K::Long(b)) => K::Long(merge_numeric(a, b)),
            (K::Double(a), K::Double(b)) => K::Double(merge_numeric(a, b)),
            (K::Decimal(a), K::Decimal(b)) => K::Decimal(merge_numeric(a, b)),
            (K::Date(a), K::Date(b)) => K::Date(merge_numeric(a, b)),
            (K::String(a), K::String(b)) => K::String(merge_string(a, b)),
            (K::Binary(a), K::Binary(b)) => K::Binary(merge_binary(a, b)),
            (K::Array(a), K::Array(b)) => K::Array(merge_array(a, b)?),
            (K::Record(a), K::Record(b)) => K::Record(merge_record(a, b)),
            (K::JavaObject { class: a }, K::JavaObject { class: b }) => K::JavaObject {
                class: if a == b { a.clone() } else { None },
            },
            (K::SchemaType, K::SchemaType) => K::SchemaType,
            (K::Function, K::Function) => K::Function,
            (K::Regex, K::Regex) => K::Regex,
            (K::Span, K::Span) => K::Span,
            _ => return None,
        };
        let annotation = if self.annotation == other.annotation {
            self.annotation.clone()
        } else {
            None
        };
        Some(Schema { kind, annotation })
    }

    /// Whether every value matching `self` also matches `other`.
    ///
    /// Conservative: `false` may be returned for some subsumed schemas, never
    /// `true` for one that is not.
    pub fn is_subsumed_by(&self, other: &Schema) -> bool {
        use SchemaKind as K;

        match (&self.kind, &other.kind) {
            (_, K::Any) => true,
            (K::Or(members), _) => members.iter().all(|m| m.is_subsumed_by(other)),
            (_, K::Or(members)) => members.iter().any(|m| self.is_subsumed_by(m)),
            (K::Null, K::Null)
            | (K::SchemaType, K::SchemaType)
            | (K::Function, K::Function)
            | (K::Regex, K::Regex)
            | (K::Span, K::Span) => true,
            (K::Boolean { value: a }, K::Boolean { value: b }) => b.is_none() || a == b,
            (K::Long(a), K::Long(b))
            | (K::Double(a), K::Double(b))
            | (K::Decimal(a), K::Decimal(b))
            | (K::Date(a), K::Date(b)) => numeric_within(a, b),
            (K::String(a), K::String(b)) => string_within(a, b),
            (K::Binary(a), K::Binary(b)) => binary_within(a, b),
            (K::Array(a), K::Array(b)) => array_within(a, b),
            (K::Record(a), K::Record(b)) => record_within(a, b),
            (K::JavaObject { class: a }, K::JavaObject { class: b }) => b.is_none() || a == b,
            _ => false,
        }
    }
}

fn flatten_into(schema: Schema, out: &mut Vec<Schema>) {
    match schema.kind {
        SchemaKind::Or(members) => {
            for member in members {
                flatten_into(member, out);
            }
        }
        _ => out.push(schema),
    }
}

/// Folds schemas into one with `merge_or_union`, in schema order so the
/// result does not depend on operand order.
fn merge_all(mut schemas: Vec<&Schema>) -> Option<Schema> {
    schemas.sort();
    schemas
        .into_iter()
        .cloned()
        .reduce(|acc, s| acc.merge_or_union(&s))
}

fn lower<'a>(a: Option<&'a Value>, b: Option<&'a Value>) -> Option<Value> {
    Some(min(a?, b?).clone())
}

fn upper<'a>(a: Option<&'a Value>, b: Option<&'a Value>) -> Option<Value> {
    Some(max(a?, b?).clone())
}

fn merge_numeric(a: &NumericSchema, b: &NumericSchema) -> NumericSchema {
    if a.value.is_some() && a.value == b.value {
        return a.clone();
    }
    let (a_lo, a_hi) = a.range();
    let (b_lo, b_hi) = b.range();
    NumericSchema {
        min: lower(a_lo, b_lo),
        max: upper(a_hi, b_hi),
        value: None,
    }
}

fn merge_lengths(
    (a_lo, a_hi): (Option<u64>, Option<u64>),
    (b_lo, b_hi): (Option<u64>, Option<u64>),
) -> (Option<u64>, Option<u64>) {
    (
        a_lo.zip(b_lo).map(|(x, y)| x.min(y)),
        a_hi.zip(b_hi).map(|(x, y)| x.max(y)),
    )
}

fn merge_string(a: &StringSchema, b: &StringSchema) -> StringSchema {
    if a.value.is_some() && a.value == b.value {
        return a.clone();
    }
    let (min_length, max_length) = merge_lengths(a.length_range(), b.length_range());
    let pattern = match (&a.pattern, &b.pattern, &a.value, &b.value) {
        (Some(pa), Some(pb), _, _) if pa == pb => Some(pa.clone()),
        (Some(p), None, _, Some(v)) | (None, Some(p), Some(v), _) if p.is_match(v) => {
            Some(p.clone())
        }
        _ => None,
    };
    StringSchema {
        min_length,
        max_length,
        pattern,
        value: None,
    }
}

fn merge_binary(a: &BinarySchema, b: &BinarySchema) -> BinarySchema {
    if a.value.is_some() && a.value == b.value {
        return a.clone();
    }
    let (min_length, max_length) = merge_lengths(a.length_range(), b.length_range());
    BinarySchema {
        min_length,
        max_length,
        value: None,
    }
}

/// The merged head is as long as the shorter head; every longer position
/// and both rests fold into the merged rest.
fn merge_array(a: &ArraySchema, b: &ArraySchema) -> Option<ArraySchema> {
    if (a.is_empty_only() && !b.head.is_empty()) || (b.is_empty_only() && !a.head.is_empty()) {
        return None;
    }
    // Head positions are required, so the merged head is the shorter head
    // even when both sides have a rest. A longer head would reject the
    // shorter operand's shortest arrays.
    let n = a.head.len().min(b.head.len());
    let head = a.head[..n]
        .iter()
        .zip(&b.head[..n])
        .map(|(x, y)| x.merge_or_union(y))
        .collect();
    let spill: Vec<&Schema> = a.head[n..]
        .iter()
        .chain(&b.head[n..])
        .chain(a.rest.as_deref())
        .chain(b.rest.as_deref())
        .collect();
    Some(ArraySchema {
        head,
        rest: merge_all(spill).map(Box::new),
    })
}

fn one_sided(field: &RecordField, other_additional: Option<&Schema>) -> RecordField {
    RecordField {
        name: field.name.clone(),
        schema: match other_additional {
            Some(additional) => field.schema.merge_or_union(additional),
            None => field.schema.clone(),
        },
        optional: true,
    }
}

fn merge_record(a: &RecordSchema, b: &RecordSchema) -> RecordSchema {
    let mut fields = Vec::with_capacity(a.fields.len().max(b.fields.len()));
    let (mut i, mut j) = (0, 0);
    loop {
        match (a.fields.get(i), b.fields.get(j)) {
            (Some(fa), Some(fb)) => match fa.name.as_bytes().cmp(fb.name.as_bytes()) {
                std::cmp::Ordering::Equal => {
                    fields.push(RecordField {
                        name: fa.name.clone(),
                        schema: fa.schema.merge_or_union(&fb.schema),
                        optional: fa.optional || fb.optional,
                    });
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    fields.push(one_sided(fa, b.additional.as_deref()));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    fields.push(one_sided(fb, a.additional.as_deref()));
                    j += 1;
                }
            },
            (Some(fa), None) => {
                fields.push(one_sided(fa, b.additional.as_deref()));
                i += 1;
            }
            (None, Some(fb)) => {
                fields.push(one_sided(fb, a.additional.as_deref()));
                j += 1;
            }
            (None, None) => break,
        }
    }
    let additional = match (a.additional.as_deref(), b.additional.as_deref()) {
        (Some(x), Some(y)) => Some(Box::new(x.merge_or_union(y))),
        (Some(x), None) | (None, Some(x)) => Some(Box::new(x.clone())),
        (None, None) => None,
    };
    RecordSchema { fields, additional }
}

fn numeric_within(a: &NumericSchema, b: &NumericSchema) -> bool {
    if let Some(bv) = &b.value {
        return a.value.as_ref() == Some(bv);
    }
    let (a_lo, a_hi) = a.range();
    b.min.as_ref().map_or(true, |b_lo| a_lo.is_some_and(|a_lo| a_lo >= b_lo))
        && b.max.as_ref().map_or(true, |b_hi| a_hi.is_some_and(|a_hi| a_hi <= b_hi))
}

fn lengths_within((a_lo, a_hi): (Option<u64>, Option<u64>), b_lo: Option<u64>, b_hi: Option<u64>) -> bool {
    b_lo.map_or(true, |b_lo| a_lo.is_some_and(|a_lo| a_lo >= b_lo))
        && b_hi.map_or(true, |b_hi| a_hi.is_some_and(|a_hi| a_hi <= b_hi))
}

fn string_within(a: &StringSchema, b: &StringSchema) -> bool {
    if let Some(bv) = &b.value {
        return a.value.as_ref() == Some(bv);
    }
    if let Some(av) = &a.value {
        return b.accepts(av);
    }
    let patterns_ok = match (&a.pattern, &b.pattern) {
        (_, None) => true,
        (Some(pa), Some(pb)) => pa == pb,
        (None, Some(_)) => false,
    };
    patterns_ok && lengths_within(a.length_range(), b.min_length, b.max_length)
}

fn binary_within(a: &BinarySchema, b: &BinarySchema) -> bool {
    if let Some(bv) = &b.value {
        return a.value.as_ref() == Some(bv);
    }
    if let Some(av) = &a.value {
        return b.accepts(av);
    }
    lengths_within(a.length_range(), b.min_length, b.max_length)
}

fn array_within(a: &ArraySchema, b: &ArraySchema) -> bool {
    if a.head.len() < b.head.len() {
        return false;
    }
    for (i, schema) in a.head.iter().enumerate() {
        match b.head.get(i).or(b.rest.as_deref()) {
            Some(target) if schema.is_subsumed_by(target) => {}
            _ => return false,
        }
    }
    match (&a.rest, &b.rest) {
        (None, _) => true,
        (Some(ar), Some(br)) => ar.is_subsumed_by(br),
        (Some(_), None) => false,
    }
}

fn record_within(a: &RecordSchema, b: &RecordSchema) -> bool {
    for bf in &b.fields {
        let ok = match a.field(&bf.name) {
            Some(af) => af.schema.is_subsumed_by(&bf.schema) && (bf.optional || !af.optional),
            None => {
                bf.optional
                    && a
                        .additional
                        .as_deref()
                        .map_or(true, |aa| aa.is_subsumed_by(&bf.schema))
            }
        };
        if !ok {
            return false;
        }
    }
    let declared_ok = a.fields.iter().all(|af| {
        b.field(&af.name).is_some()
            || b
                .additional
                .as_deref()
                .is_some_and(|ba| af.schema.is_subsumed_by(ba))
    });
    declared_ok
        && match (a.additional.as_deref(), b.additional.as_deref()) {
            (None, _) => true,
            (Some(aa), Some(ba)) => aa.is_subsumed_by(ba),
            (Some(_), None) => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_merge_with_union_member() {
        let a = Schema::array(vec![Schema::long(), Schema::string()], None);
        let b = Schema::array(vec![Schema::long(), Schema::long()], None);
        let merged = a.merge(&b).unwrap();
        let expected = Schema::array(
            vec![Schema::long(), Schema::or([Schema::string(), Schema::long()])],
            None,
        );
        assert_eq!(merged, expected);
        assert_eq!(b.merge(&a), Some(expected));
    }

    #[test]
    fn test_head_lengths_fold_into_rest() {
        let short = Schema::array(vec![Schema::long()], None);
        let long = Schema::array(vec![Schema::long(), Schema::string(), Schema::string()], None);
        let merged = short.merge(&long).unwrap();
        assert_eq!(merged, Schema::array(vec![Schema::long()], Some(Schema::string())));
        for v in [
            Value::array(vec![Value::Long(1)]),
            Value::array(vec![Value::Long(1), Value::from("a"), Value::from("b")]),
        ] {
            assert!(merged.matches(&v));
        }
    }

    #[test]
    fn test_head_is_shorter_head_when_both_have_rest() {
        let short = Schema::array(vec![Schema::long()], Some(Schema::long()));
        let long = Schema::array(
            vec![Schema::long(), Schema::long(), Schema::long()],
            Some(Schema::string()),
        );
        let merged = short.merge(&long).unwrap();
        assert!(matches!(merged.kind(), SchemaKind::Array(a) if a.head().len() == 1));
        assert!(merged.matches(&Value::array(vec![Value::Long(1)])));
        assert!(merged.matches(&Value::array(vec![
            Value::Long(1),
            Value::Long(2),
            Value::Long(3),
            Value::from("x"),
        ])));
        assert_eq!(long.merge(&short), Some(merged));
    }

    #[test]
    fn test_empty_versus_non_empty_refuses() {
        let empty = Schema::array(vec![], None);
        let one = Schema::array(vec![Schema::long()], None);
        assert_eq!(empty.merge(&one), None);
        let union = empty.merge_or_union(&one);
        assert!(matches!(union.kind(), SchemaKind::Or(m) if m.len() == 2));
        // empty merges with arrays that may be empty
        let any_len = Schema::array_of(Schema::long());
        assert_eq!(empty.merge(&any_len), Some(any_len));
    }

    #[test]
    fn test_numeric_bounds_widen() {
        let a = Schema::long_range(Some(0), Some(5)).unwrap();
        let b = Schema::constant(&Value::Long(9)).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged, Schema::long_range(Some(0), Some(9)).unwrap());
        let open = a.merge(&Schema::long()).unwrap();
        assert_eq!(open, Schema::long());
    }

    #[test]
    fn test_different_kinds_do_not_merge() {
        assert_eq!(Schema::long().merge(&Schema::string()), None);
        assert_eq!(Schema::long().merge(&Schema::any()), Some(Schema::any()));
    }

    #[test]
    fn test_record_merge_makes_one_sided_fields_optional() {
        let a = Schema::record(
            vec![
                RecordField::required("id", Schema::long()),
                RecordField::required("name", Schema::string()),
            ],
            None,
        )
        .unwrap();
        let b = Schema::record(
            vec![
                RecordField::required("id", Schema::long()),
                RecordField::required("age", Schema::long()),
            ],
            None,
        )
        .unwrap();
        let merged = a.merge(&b).unwrap();
        let expected = Schema::record(
            vec![
                RecordField::optional("age", Schema::long()),
                RecordField::required("id", Schema::long()),
                RecordField::optional("name", Schema::string()),
            ],
            None,
        )
        .unwrap();
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_or_canonicalization() {
        let nested = Schema::or([
            Schema::string(),
            Schema::or([Schema::long_range(Some(0), Some(3)).unwrap(), Schema::long()]),
            Schema::string(),
        ]);
        assert_eq!(nested, Schema::or([Schema::long(), Schema::string()]));
        match nested.kind() {
            SchemaKind::Or(members) => assert_eq!(members, &vec![Schema::long(), Schema::string()]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(Schema::or([Schema::long(), Schema::any()]), Schema::any());
        assert_eq!(Schema::or([Schema::null()]), Schema::null());
    }

    #[test]
    fn test_subsumption() {
        let narrow = Schema::long_range(Some(1), Some(2)).unwrap();
        assert!(narrow.is_subsumed_by(&Schema::long()));
        assert!(!Schema::long().is_subsumed_by(&narrow));
        let fixed = Schema::array(vec![Schema::long(), Schema::long()], None);
        assert!(fixed.is_subsumed_by(&Schema::array_of(Schema::long())));
        assert!(!Schema::array_of(Schema::long()).is_subsumed_by(&fixed));
        assert!(Schema::constant(&Value::from("ab"))
            .unwrap()
            .is_subsumed_by(&Schema::string_with(Some(1), None, Some("a.")).unwrap()));
    }
}
