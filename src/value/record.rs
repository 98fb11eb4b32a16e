//! Record values: field name to value mappings kept sorted by name.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{FunctionOrder, Value};
use crate::codec::lazy::LazyRecord;
use crate::error::{ValueError, ValueResult};

/// An immutable record.
///
/// Fields are unique and always stored sorted by name (byte order), so
/// iteration order is the comparison order.
#[derive(Debug, Clone)]
pub enum RecordValue {
    Memory(Arc<Vec<(Arc<str>, Value)>>),
    Lazy(Arc<LazyRecord>),
}

impl RecordValue {
    pub fn empty() -> Self {
        RecordValue::Memory(Arc::new(Vec::new()))
    }

    /// Sorts `fields` by name and rejects duplicates.
    pub fn from_pairs<N: Into<Arc<str>>>(
        fields: impl IntoIterator<Item = (N, Value)>,
    ) -> ValueResult<Self> {
        let mut fields: Vec<(Arc<str>, Value)> =
            fields.into_iter().map(|(n, v)| (n.into(), v)).collect();
        fields.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        if let Some(dup) = fields.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ValueError::DuplicateField(dup[0].0.to_string()));
        }
        Ok(RecordValue::Memory(Arc::new(fields)))
    }

    /// Caller guarantees `fields` is sorted by name without duplicates.
    pub(crate) fn from_sorted(fields: Vec<(Arc<str>, Value)>) -> Self {
        debug_assert!(fields.windows(2).all(|w| w[0].0 < w[1].0));
        RecordValue::Memory(Arc::new(fields))
    }

    pub fn len(&self) -> usize {
        match self {
            RecordValue::Memory(fields) => fields.len(),
            RecordValue::Lazy(lazy) => lazy.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RecordValue::Memory(fields) => fields
                .binary_search_by(|(n, _)| n.as_bytes().cmp(name.as_bytes()))
                .ok()
                .map(|i| &fields[i].1),
            RecordValue::Lazy(lazy) => lazy.index_of(name).map(|i| lazy.value(i)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            RecordValue::Memory(_) => self.get(name).is_some(),
            RecordValue::Lazy(lazy) => lazy.index_of(name).is_some(),
        }
    }

    /// Fields in name order.
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            record: self,
            next: 0,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        (0..self.len()).map(move |i| self.name_at(i))
    }

    fn name_at(&self, index: usize) -> &str {
        match self {
            RecordValue::Memory(fields) => &fields[index].0,
            RecordValue::Lazy(lazy) => lazy.name(index),
        }
    }

    fn value_at(&self, index: usize) -> &Value {
        match self {
            RecordValue::Memory(fields) => &fields[index].1,
            RecordValue::Lazy(lazy) => lazy.value(index),
        }
    }

    /// In-memory form sharing the field payloads.
    pub fn materialize(&self) -> RecordValue {
        match self {
            RecordValue::Memory(_) => self.clone(),
            RecordValue::Lazy(_) => RecordValue::from_sorted(
                self.iter()
                    .map(|(n, v)| (Arc::from(n), v.clone()))
                    .collect(),
            ),
        }
    }

    pub(crate) fn deep_copy(&self) -> RecordValue {
        RecordValue::from_sorted(
            self.iter()
                .map(|(n, v)| (Arc::from(n), v.deep_copy()))
                .collect(),
        )
    }

    pub(super) fn compare_with(&self, other: &RecordValue, order: FunctionOrder) -> ValueResult<Ordering> {
        for ((na, va), (nb, vb)) in self.iter().zip(other.iter()) {
            let ord = na.as_bytes().cmp(nb.as_bytes());
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            let ord = va.compare_with(vb, order)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(self.len().cmp(&other.len()))
    }
}

impl Default for RecordValue {
    fn default() -> Self {
        RecordValue::empty()
    }
}

/// Iterator over `(name, value)` pairs in name order.
pub struct RecordIter<'a> {
    record: &'a RecordValue,
    next: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.record.len() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        Some((self.record.name_at(i), self.record.value_at(i)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.record.len().saturating_sub(self.next);
        (n, Some(n))
    }
}

impl ExactSizeIterator for RecordIter<'_> {}

/// Mutable sibling of [`RecordValue`].
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    fields: BTreeMap<Arc<str>, Value>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the fields of an existing record.
    pub fn from_record(record: &RecordValue) -> Self {
        RecordBuilder {
            fields: record
                .iter()
                .map(|(n, v)| (Arc::from(n), v.clone()))
                .collect(),
        }
    }

    /// Adds a new field; fails if the name is taken.
    pub fn add(&mut self, name: impl Into<Arc<str>>, value: Value) -> ValueResult<&mut Self> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(ValueError::DuplicateField(name.to_string()));
        }
        self.fields.insert(name, value);
        Ok(self)
    }

    /// Adds or replaces a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(self) -> Value {
        Value::Record(self.build_record())
    }

    pub fn build_record(self) -> RecordValue {
        // BTreeMap<Arc<str>> orders by `str`, which is byte order
        RecordValue::from_sorted(self.fields.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_sorted_by_name() {
        let rec = RecordValue::from_pairs([
            ("b", Value::Long(2)),
            ("a", Value::Long(1)),
            ("C", Value::Long(3)),
        ])
        .unwrap();
        let names: Vec<&str> = rec.names().collect();
        assert_eq!(names, vec!["C", "a", "b"]);
        assert_eq!(rec.get("a"), Some(&Value::Long(1)));
        assert_eq!(rec.get("z"), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = RecordValue::from_pairs([("a", Value::Null), ("a", Value::Long(1))]).unwrap_err();
        assert_eq!(err, ValueError::DuplicateField("a".into()));

        let mut builder = RecordBuilder::new();
        builder.add("a", Value::Null).unwrap();
        assert!(builder.add("a", Value::Null).is_err());
        assert_eq!(builder.set("a", Value::Long(5)), Some(Value::Null));
    }

    #[test]
    fn test_record_order_is_field_wise() {
        let a = Value::record([("a", Value::Long(1)), ("b", Value::Long(2))]).unwrap();
        let b = Value::record([("a", Value::Long(1)), ("c", Value::Long(0))]).unwrap();
        assert!(a < b);

        let shorter = Value::record([("a", Value::Long(1))]).unwrap();
        assert!(shorter < a);
    }

    #[test]
    fn test_builder_round_trip() {
        let rec = RecordValue::from_pairs([("x", Value::Long(1)), ("y", Value::Null)]).unwrap();
        let mut builder = RecordBuilder::from_record(&rec);
        builder.remove("y");
        builder.set("z", Value::Boolean(true));
        let built = builder.build();
        let built = built.as_record().unwrap();
        assert_eq!(built.names().collect::<Vec<_>>(), vec!["x", "z"]);
    }
}
