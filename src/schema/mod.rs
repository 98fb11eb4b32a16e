//! # Schema Algebra
//!
//! Compile-time descriptions of the values an expression may produce.
//!
//! A [`Schema`] mirrors the logical types of [`Value`], plus `Any` (every
//! value) and `Or` (a union). Schemas match values, merge into the most
//! specific schema covering both operands, answer structural questions in
//! three-valued logic ([`Bool3`]) and are themselves totally ordered so
//! unions have one canonical form.
//!
//! ## Design Decisions
//!
//! - **Closed kinds**: [`SchemaKind`] is a plain enum; codecs are chosen by
//!   matching on it once, at construction time
//! - **Constants live on atoms**: atom schemas carry an optional constant;
//!   constant arrays and records are expressed through constant children
//! - **Canonical unions**: [`Schema::or`] flattens, drops subsumed members and
//!   sorts, so equal unions compare equal
//! - **Schemas are values**: [`Schema::to_value`] and [`Schema::from_value`]
//!   convert to and from a record description
//!
//! ## Usage
//!
//! ```rust
//! use spindle::schema::Schema;
//! use spindle::value::Value;
//!
//! let s = Schema::array(vec![Schema::long()], Some(Schema::string()));
//! assert!(s.matches(&Value::array(vec![Value::Long(1), Value::from("a")])));
//! assert!(!s.matches(&Value::array(vec![])));
//! ```

mod describe;
mod merge;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Not;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{SchemaError, SchemaResult};
use crate::value::{ArrayValue, FunctionOrder, LogicalType, RecordValue, Value};

/// Three-valued logic for structural questions that may be statically
/// undecidable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bool3 {
    False,
    Unknown,
    True,
}

impl Bool3 {
    pub fn and(self, other: Bool3) -> Bool3 {
        match (self, other) {
            (Bool3::False, _) | (_, Bool3::False) => Bool3::False,
            (Bool3::True, Bool3::True) => Bool3::True,
            _ => Bool3::Unknown,
        }
    }

    pub fn or(self, other: Bool3) -> Bool3 {
        match (self, other) {
            (Bool3::True, _) | (_, Bool3::True) => Bool3::True,
            (Bool3::False, Bool3::False) => Bool3::False,
            _ => Bool3::Unknown,
        }
    }

    /// Answer for a union: agreeing alternatives keep their answer.
    pub fn either(self, other: Bool3) -> Bool3 {
        if self == other {
            self
        } else {
            Bool3::Unknown
        }
    }

    pub fn is_true(self) -> bool {
        self == Bool3::True
    }

    pub fn is_false(self) -> bool {
        self == Bool3::False
    }

    /// True unless definitely false.
    pub fn maybe(self) -> bool {
        self != Bool3::False
    }
}

impl Not for Bool3 {
    type Output = Bool3;

    fn not(self) -> Bool3 {
        match self {
            Bool3::False => Bool3::True,
            Bool3::Unknown => Bool3::Unknown,
            Bool3::True => Bool3::False,
        }
    }
}

impl From<bool> for Bool3 {
    fn from(b: bool) -> Self {
        if b {
            Bool3::True
        } else {
            Bool3::False
        }
    }
}

/// Bounds of a long, double, decimal or date schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NumericSchema {
    pub(crate) min: Option<Value>,
    pub(crate) max: Option<Value>,
    pub(crate) value: Option<Value>,
}

impl NumericSchema {
    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Closed range of accepted values; a constant pins both ends.
    pub(crate) fn range(&self) -> (Option<&Value>, Option<&Value>) {
        match &self.value {
            Some(v) => (Some(v), Some(v)),
            None => (self.min.as_ref(), self.max.as_ref()),
        }
    }

    fn accepts(&self, v: &Value) -> bool {
        let (lo, hi) = self.range();
        lo.map_or(true, |lo| lo <= v) && hi.map_or(true, |hi| v <= hi)
    }
}

/// A regex that must match a whole string.
#[derive(Debug, Clone)]
pub struct SchemaPattern {
    source: Arc<str>,
    anchored: Regex,
}

impl SchemaPattern {
    pub fn new(source: &str) -> SchemaResult<Self> {
        let anchored = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| SchemaError::InvalidPattern(format!("{source}: {e}")))?;
        Ok(SchemaPattern {
            source: Arc::from(source),
            anchored,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

impl PartialEq for SchemaPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for SchemaPattern {}

impl PartialOrd for SchemaPattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaPattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source.cmp(&other.source)
    }
}

impl Hash for SchemaPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

/// Length bounds are in UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StringSchema {
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<SchemaPattern>,
    pub(crate) value: Option<Arc<str>>,
}

impl StringSchema {
    pub fn min_length(&self) -> Option<u64> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    pub fn pattern(&self) -> Option<&SchemaPattern> {
        self.pattern.as_ref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Byte length shared by every matching string, when it is not a constant.
    pub fn fixed_length(&self) -> Option<u64> {
        match (self.value.is_none(), self.min_length, self.max_length) {
            (true, Some(lo), Some(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    pub(crate) fn length_range(&self) -> (Option<u64>, Option<u64>) {
        match &self.value {
            Some(v) => (Some(v.len() as u64), Some(v.len() as u64)),
            None => (self.min_length, self.max_length),
        }
    }

    fn accepts(&self, s: &str) -> bool {
        if let Some(v) = &self.value {
            return **v == *s;
        }
        let len = s.len() as u64;
        self.min_length.map_or(true, |lo| len >= lo)
            && self.max_length.map_or(true, |hi| len <= hi)
            && self.pattern.as_ref().map_or(true, |p| p.is_match(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BinarySchema {
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) value: Option<Arc<[u8]>>,
}

impl BinarySchema {
    pub fn min_length(&self) -> Option<u64> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub(crate) fn length_range(&self) -> (Option<u64>, Option<u64>) {
        match &self.value {
            Some(v) => (Some(v.len() as u64), Some(v.len() as u64)),
            None => (self.min_length, self.max_length),
        }
    }

    fn accepts(&self, b: &[u8]) -> bool {
        if let Some(v) = &self.value {
            return **v == *b;
        }
        let len = b.len() as u64;
        self.min_length.map_or(true, |lo| len >= lo) && self.max_length.map_or(true, |hi| len <= hi)
    }
}

/// Per-position schemas for the first `head.len()` elements, then one
/// schema for every further element. Without `rest` the length is exactly
/// `head.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArraySchema {
    pub(crate) head: Vec<Schema>,
    pub(crate) rest: Option<Box<Schema>>,
}

impl ArraySchema {
    pub fn head(&self) -> &[Schema] {
        &self.head
    }

    pub fn rest(&self) -> Option<&Schema> {
        self.rest.as_deref()
    }

    /// Matches only the empty array.
    pub fn is_empty_only(&self) -> bool {
        self.head.is_empty() && self.rest.is_none()
    }

    fn accepts(&self, array: &ArrayValue) -> bool {
        let mut items = array.iter();
        for schema in &self.head {
            match items.next() {
                Some(v) if schema.matches(&v) => {}
                _ => return false,
            }
        }
        match &self.rest {
            None => items.next().is_none(),
            Some(rest) => items.all(|v| rest.matches(&v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordField {
    pub(crate) name: Arc<str>,
    pub(crate) schema: Schema,
    pub(crate) optional: bool,
}

impl RecordField {
    pub fn required(name: impl Into<Arc<str>>, schema: Schema) -> Self {
        RecordField {
            name: name.into(),
            schema,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<Arc<str>>, schema: Schema) -> Self {
        RecordField {
            name: name.into(),
            schema,
            optional: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Declared fields sorted by name, plus an optional schema for every
/// undeclared field. Without `additional`, undeclared fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordSchema {
    pub(crate) fields: Vec<RecordField>,
    pub(crate) additional: Option<Box<Schema>>,
}

impl RecordSchema {
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn additional(&self) -> Option<&Schema> {
        self.additional.as_deref()
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields
            .binary_search_by(|f| f.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.fields[i])
    }

    /// Number of optional declared fields, i.e. presence bits.
    pub fn optional_count(&self) -> usize {
        self.fields.iter().filter(|f| f.optional).count()
    }

    fn accepts(&self, record: &RecordValue) -> bool {
        for field in &self.fields {
            match record.get(&field.name) {
                Some(v) if !field.schema.matches(v) => return false,
                None if !field.optional => return false,
                _ => {}
            }
        }
        record.iter().all(|(name, v)| {
            self.field(name).is_some() || self.additional.as_ref().is_some_and(|a| a.matches(v))
        })
    }
}

/// Schema variants. Declaration order is the schema sort order: `Any`
/// first, then the logical type order, then unions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaKind {
    /// Every value
    Any,
    Null,
    Boolean { value: Option<bool> },
    Long(NumericSchema),
    Double(NumericSchema),
    Decimal(NumericSchema),
    String(StringSchema),
    Binary(BinarySchema),
    Array(ArraySchema),
    Record(RecordSchema),
    Date(NumericSchema),
    /// Schema values
    SchemaType,
    Function,
    /// Host objects, optionally of one class
    JavaObject { class: Option<Arc<str>> },
    Regex,
    Span,
    /// Union; canonical members are flattened, sorted and not subsumed by
    /// each other
    Or(Vec<Schema>),
}

/// A schema plus an optional free-form annotation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    kind: SchemaKind,
    annotation: Option<Value>,
}

impl PartialOrd for Schema {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Schema {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind).then_with(|| {
            match (&self.annotation, &other.annotation) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a
                    .compare_with(b, FunctionOrder::Structural)
                    .unwrap_or(Ordering::Equal),
            }
        })
    }
}

fn check_bounds<T: PartialOrd + fmt::Display>(
    what: &str,
    min: Option<&T>,
    max: Option<&T>,
) -> SchemaResult<()> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(SchemaError::InvalidBounds(format!(
            "{what}: min {lo} exceeds max {hi}"
        ))),
        _ => Ok(()),
    }
}

impl Schema {
    pub(crate) fn new(kind: SchemaKind) -> Schema {
        Schema {
            kind,
            annotation: None,
        }
    }

    pub fn any() -> Schema {
        Schema::new(SchemaKind::Any)
    }

    pub fn null() -> Schema {
        Schema::new(SchemaKind::Null)
    }

    pub fn boolean() -> Schema {
        Schema::new(SchemaKind::Boolean { value: None })
    }

    pub fn long() -> Schema {
        Schema::new(SchemaKind::Long(NumericSchema::default()))
    }

    pub fn double() -> Schema {
        Schema::new(SchemaKind::Double(NumericSchema::default()))
    }

    pub fn decimal() -> Schema {
        Schema::new(SchemaKind::Decimal(NumericSchema::default()))
    }

    pub fn date() -> Schema {
        Schema::new(SchemaKind::Date(NumericSchema::default()))
    }

    pub fn string() -> Schema {
        Schema::new(SchemaKind::String(StringSchema::default()))
    }

    pub fn binary() -> Schema {
        Schema::new(SchemaKind::Binary(BinarySchema::default()))
    }

    /// Schema of schema values.
    pub fn schematype() -> Schema {
        Schema::new(SchemaKind::SchemaType)
    }

    pub fn function() -> Schema {
        Schema::new(SchemaKind::Function)
    }

    pub fn regex() -> Schema {
        Schema::new(SchemaKind::Regex)
    }

    pub fn span() -> Schema {
        Schema::new(SchemaKind::Span)
    }

    pub fn java_object(class: Option<&str>) -> Schema {
        Schema::new(SchemaKind::JavaObject {
            class: class.map(Arc::from),
        })
    }

    fn numeric(
        kind: fn(NumericSchema) -> SchemaKind,
        what: &str,
        min: Option<Value>,
        max: Option<Value>,
    ) -> SchemaResult<Schema> {
        check_bounds(what, min.as_ref(), max.as_ref())?;
        Ok(Schema::new(kind(NumericSchema {
            min,
            max,
            value: None,
        })))
    }

    pub fn long_range(min: Option<i64>, max: Option<i64>) -> SchemaResult<Schema> {
        Self::numeric(SchemaKind::Long, "long", min.map(Value::Long), max.map(Value::Long))
    }

    pub fn double_range(min: Option<f64>, max: Option<f64>) -> SchemaResult<Schema> {
        Self::numeric(
            SchemaKind::Double,
            "double",
            min.map(Value::Double),
            max.map(Value::Double),
        )
    }

    pub fn decimal_range(min: Option<Decimal>, max: Option<Decimal>) -> SchemaResult<Schema> {
        Self::numeric(
            SchemaKind::Decimal,
            "decfloat",
            min.map(Value::Decimal),
            max.map(Value::Decimal),
        )
    }

    /// Bounds in milliseconds since the epoch.
    pub fn date_range(min: Option<i64>, max: Option<i64>) -> SchemaResult<Schema> {
        Self::numeric(SchemaKind::Date, "date", min.map(Value::Date), max.map(Value::Date))
    }

    pub fn string_with(
        min_length: Option<u64>,
        max_length: Option<u64>,
        pattern: Option<&str>,
    ) -> SchemaResult<Schema> {
        check_bounds("string length", min_length.as_ref(), max_length.as_ref())?;
        Ok(Schema::new(SchemaKind::String(StringSchema {
            min_length,
            max_length,
            pattern: pattern.map(SchemaPattern::new).transpose()?,
            value: None,
        })))
    }

    /// Strings of exactly `len` UTF-8 bytes.
    pub fn fixed_string(len: u64) -> Schema {
        Schema::new(SchemaKind::String(StringSchema {
            min_length: Some(len),
            max_length: Some(len),
            ..StringSchema::default()
        }))
    }

    pub fn binary_with(min_length: Option<u64>, max_length: Option<u64>) -> SchemaResult<Schema> {
        check_bounds("binary length", min_length.as_ref(), max_length.as_ref())?;
        Ok(Schema::new(SchemaKind::Binary(BinarySchema {
            min_length,
            max_length,
            value: None,
        })))
    }

    pub fn array(head: Vec<Schema>, rest: Option<Schema>) -> Schema {
        Schema::new(SchemaKind::Array(ArraySchema {
            head,
            rest: rest.map(Box::new),
        }))
    }

    /// Arrays of any length whose elements all match `element`.
    pub fn array_of(element: Schema) -> Schema {
        Schema::array(Vec::new(), Some(element))
    }

    /// Sorts fields by name and rejects duplicate names.
    pub fn record(mut fields: Vec<RecordField>, additional: Option<Schema>) -> SchemaResult<Schema> {
        fields.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        if let Some(dup) = fields.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(SchemaError::DuplicateField(dup[0].name.to_string()));
        }
        Ok(Schema::new(SchemaKind::Record(RecordSchema {
            fields,
            additional: additional.map(Box::new),
        })))
    }

    /// The schema matching exactly `value`.
    pub fn constant(value: &Value) -> SchemaResult<Schema> {
        let numeric = |v: &Value| NumericSchema {
            value: Some(v.clone()),
            ..NumericSchema::default()
        };
        let kind = match value {
            Value::Null => SchemaKind::Null,
            Value::Boolean(b) => SchemaKind::Boolean { value: Some(*b) },
            Value::Long(_) => SchemaKind::Long(numeric(value)),
            Value::Double(_) => SchemaKind::Double(numeric(value)),
            Value::Decimal(_) => SchemaKind::Decimal(numeric(value)),
            Value::Date(_) => SchemaKind::Date(numeric(value)),
            Value::String(s) => SchemaKind::String(StringSchema {
                value: Some(s.clone()),
                ..StringSchema::default()
            }),
            Value::Binary(b) => SchemaKind::Binary(BinarySchema {
                value: Some(b.clone()),
                ..BinarySchema::default()
            }),
            Value::Array(items) => SchemaKind::Array(ArraySchema {
                head: items
                    .iter()
                    .map(|v| Schema::constant(&v))
                    .collect::<SchemaResult<_>>()?,
                rest: None,
            }),
            Value::Record(record) => SchemaKind::Record(RecordSchema {
                fields: record
                    .iter()
                    .map(|(n, v)| Ok(RecordField::required(n, Schema::constant(v)?)))
                    .collect::<SchemaResult<_>>()?,
                additional: None,
            }),
            other => {
                return Err(SchemaError::ConstantConflict(format!(
                    "{} values have no constant schema",
                    other.logical_type()
                )))
            }
        };
        Ok(Schema::new(kind))
    }

    /// Attaches a free-form annotation.
    pub fn with_annotation(mut self, annotation: RecordValue) -> Schema {
        self.annotation = Some(Value::Record(annotation));
        self
    }

    pub fn without_annotation(mut self) -> Schema {
        self.annotation = None;
        self
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    pub fn annotation(&self) -> Option<&RecordValue> {
        self.annotation.as_ref().and_then(Value::as_record)
    }

    /// The logical type of every matching value, if there is exactly one.
    pub fn schema_type(&self) -> Option<LogicalType> {
        Some(match &self.kind {
            SchemaKind::Any => return None,
            SchemaKind::Null => LogicalType::Null,
            SchemaKind::Boolean { .. } => LogicalType::Boolean,
            SchemaKind::Long(_) => LogicalType::Long,
            SchemaKind::Double(_) => LogicalType::Double,
            SchemaKind::Decimal(_) => LogicalType::Decfloat,
            SchemaKind::String(_) => LogicalType::String,
            SchemaKind::Binary(_) => LogicalType::Binary,
            SchemaKind::Array(_) => LogicalType::Array,
            SchemaKind::Record(_) => LogicalType::Record,
            SchemaKind::Date(_) => LogicalType::Date,
            SchemaKind::SchemaType => LogicalType::Schema,
            SchemaKind::Function => LogicalType::Function,
            SchemaKind::JavaObject { .. } => LogicalType::JavaObject,
            SchemaKind::Regex => LogicalType::Regex,
            SchemaKind::Span => LogicalType::Span,
            SchemaKind::Or(members) => {
                let mut types = members.iter().map(Schema::schema_type);
                let first = types.next()??;
                return types.all(|t| t == Some(first)).then_some(first);
            }
        })
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (&self.kind, value) {
            (SchemaKind::Any, _) | (SchemaKind::Null, Value::Null) => true,
            (SchemaKind::Boolean { value: expected }, Value::Boolean(b)) => {
                expected.map_or(true, |e| e == *b)
            }
            (SchemaKind::Long(n), Value::Long(_))
            | (SchemaKind::Double(n), Value::Double(_))
            | (SchemaKind::Decimal(n), Value::Decimal(_))
            | (SchemaKind::Date(n), Value::Date(_)) => n.accepts(value),
            (SchemaKind::String(s), Value::String(v)) => s.accepts(v),
            (SchemaKind::Binary(b), Value::Binary(v)) => b.accepts(v),
            (SchemaKind::Array(a), Value::Array(v)) => a.accepts(v),
            (SchemaKind::Record(r), Value::Record(v)) => r.accepts(v),
            (SchemaKind::SchemaType, Value::Schema(_))
            | (SchemaKind::Function, Value::Function(_))
            | (SchemaKind::Regex, Value::Regex(_))
            | (SchemaKind::Span, Value::Span(..)) => true,
            (SchemaKind::JavaObject { class }, Value::JavaObject(o)) => {
                class.as_deref().map_or(true, |c| c == o.class_name())
            }
            (SchemaKind::Or(members), _) => members.iter().any(|m| m.matches(value)),
            _ => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }

    /// The single value this schema matches, if it matches exactly one.
    pub fn constant_value(&self) -> Option<Value> {
        match &self.kind {
            SchemaKind::Null => Some(Value::Null),
            SchemaKind::Boolean { value } => value.map(Value::Boolean),
            SchemaKind::Long(n)
            | SchemaKind::Double(n)
            | SchemaKind::Decimal(n)
            | SchemaKind::Date(n) => n.value.clone(),
            SchemaKind::String(s) => s.value.clone().map(Value::String),
            SchemaKind::Binary(b) => b.value.clone().map(Value::Binary),
            SchemaKind::Array(a) if a.rest.is_none() => a
                .head
                .iter()
                .map(Schema::constant_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::array),
            SchemaKind::Record(r) if r.additional.is_none() => {
                let mut fields = Vec::with_capacity(r.fields.len());
                for f in &r.fields {
                    if f.optional {
                        return None;
                    }
                    fields.push((f.name.clone(), f.schema.constant_value()?));
                }
                Some(Value::Record(RecordValue::from_sorted(fields)))
            }
            _ => None,
        }
    }

    /// Schema of the element at `index`; `None` when no such element can
    /// exist.
    pub fn element(&self, index: usize) -> Option<Schema> {
        match &self.kind {
            SchemaKind::Any => Some(Schema::any()),
            SchemaKind::Array(a) => a
                .head
                .get(index)
                .cloned()
                .or_else(|| a.rest.as_deref().cloned()),
            SchemaKind::Or(members) => union_of(members.iter().filter_map(|m| m.element(index))),
            _ => None,
        }
    }

    /// Schema of field `name`; `None` when no such field can exist.
    pub fn field(&self, name: &str) -> Option<Schema> {
        match &self.kind {
            SchemaKind::Any => Some(Schema::any()),
            SchemaKind::Record(r) => r
                .field(name)
                .map(|f| f.schema.clone())
                .or_else(|| r.additional.as_deref().cloned()),
            SchemaKind::Or(members) => union_of(members.iter().filter_map(|m| m.field(name))),
            _ => None,
        }
    }

    /// Fewest elements (array positions or record fields) a matching value
    /// has, if known.
    pub fn min_elements(&self) -> Option<u64> {
        match &self.kind {
            SchemaKind::Array(a) => Some(a.head.len() as u64),
            SchemaKind::Record(r) => Some(r.fields.iter().filter(|f| !f.optional).count() as u64),
            SchemaKind::Or(members) => members.iter().map(Schema::min_elements).min().flatten(),
            _ => None,
        }
    }

    /// Most elements a matching value has; `None` when unbounded or unknown.
    pub fn max_elements(&self) -> Option<u64> {
        match &self.kind {
            SchemaKind::Array(a) if a.rest.is_none() => Some(a.head.len() as u64),
            SchemaKind::Record(r) if r.additional.is_none() => Some(r.fields.len() as u64),
            SchemaKind::Or(members) => members
                .iter()
                .map(Schema::max_elements)
                .collect::<Option<Vec<_>>>()
                .and_then(|maxes| maxes.into_iter().max()),
            _ => None,
        }
    }

    /// Whether matching arrays have an element at `index`.
    pub fn has_element(&self, index: usize) -> Bool3 {
        match &self.kind {
            SchemaKind::Any => Bool3::Unknown,
            SchemaKind::Array(a) if index < a.head.len() => Bool3::True,
            SchemaKind::Array(a) if a.rest.is_some() => Bool3::Unknown,
            SchemaKind::Or(members) => fold_either(members.iter().map(|m| m.has_element(index))),
            _ => Bool3::False,
        }
    }

    /// Whether matching records have field `name`.
    pub fn has_field(&self, name: &str) -> Bool3 {
        match &self.kind {
            SchemaKind::Any => Bool3::Unknown,
            SchemaKind::Record(r) => match r.field(name) {
                Some(f) if !f.optional => Bool3::True,
                Some(_) => Bool3::Unknown,
                None if r.additional.is_some() => Bool3::Unknown,
                None => Bool3::False,
            },
            SchemaKind::Or(members) => fold_either(members.iter().map(|m| m.has_field(name))),
            _ => Bool3::False,
        }
    }

    /// Merged schema of every element (array positions or record field
    /// values); `None` when matching values have no elements.
    pub fn elements(&self) -> Option<Schema> {
        match &self.kind {
            SchemaKind::Any => Some(Schema::any()),
            SchemaKind::Array(a) => union_of(a.head.iter().chain(a.rest.as_deref()).cloned()),
            SchemaKind::Record(r) => union_of(
                r.fields
                    .iter()
                    .map(|f| f.schema.clone())
                    .chain(r.additional.as_deref().cloned()),
            ),
            SchemaKind::Or(members) => union_of(members.iter().filter_map(Schema::elements)),
            _ => None,
        }
    }

    pub fn is_nullable(&self) -> Bool3 {
        match &self.kind {
            SchemaKind::Null => Bool3::True,
            SchemaKind::Any => Bool3::Unknown,
            SchemaKind::Or(members) => fold_either(members.iter().map(Schema::is_nullable)),
            _ => Bool3::False,
        }
    }

    pub fn is_array(&self) -> Bool3 {
        match &self.kind {
            SchemaKind::Array(_) => Bool3::True,
            SchemaKind::Any => Bool3::Unknown,
            SchemaKind::Or(members) => fold_either(members.iter().map(Schema::is_array)),
            _ => Bool3::False,
        }
    }

    /// This schema widened to also match null.
    pub fn add_nullability(&self) -> Schema {
        if self.is_nullable().maybe() {
            self.clone()
        } else {
            Schema::or([self.clone(), Schema::null()])
        }
    }

    /// This schema narrowed to non-null values; `None` if it matches only
    /// null.
    pub fn remove_nullability(&self) -> Option<Schema> {
        match &self.kind {
            SchemaKind::Null => None,
            SchemaKind::Or(members) => {
                let rest: Vec<Schema> = members
                    .iter()
                    .filter(|m| !matches!(m.kind, SchemaKind::Null))
                    .cloned()
                    .collect();
                (!rest.is_empty()).then(|| Schema::or(rest))
            }
            _ => Some(self.clone()),
        }
    }

    /// The array part of this schema; `None` if it matches no arrays.
    pub fn restrict_to_array(&self) -> Option<Schema> {
        match &self.kind {
            SchemaKind::Array(_) => Some(self.clone()),
            SchemaKind::Any => Some(Schema::array_of(Schema::any())),
            SchemaKind::Or(members) => {
                let arrays: Vec<Schema> = members
                    .iter()
                    .filter_map(Schema::restrict_to_array)
                    .collect();
                (!arrays.is_empty()).then(|| Schema::or(arrays))
            }
            _ => None,
        }
    }
}

/// Union of the given schemas; `None` for none.
fn union_of(schemas: impl IntoIterator<Item = Schema>) -> Option<Schema> {
    let members: Vec<Schema> = schemas.into_iter().collect();
    (!members.is_empty()).then(|| Schema::or(members))
}

fn fold_either(answers: impl Iterator<Item = Bool3>) -> Bool3 {
    answers.reduce(Bool3::either).unwrap_or(Bool3::False)
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[(&str, String)]) -> fmt::Result {
    f.write_str(name)?;
    if args.is_empty() {
        return Ok(());
    }
    f.write_str("(")?;
    for (i, (key, value)) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}={value}")?;
    }
    f.write_str(")")
}

fn numeric_args(n: &NumericSchema) -> Vec<(&'static str, String)> {
    let mut args = Vec::new();
    if let Some(v) = &n.value {
        args.push(("value", v.to_string()));
    }
    if let Some(v) = &n.min {
        args.push(("min", v.to_string()));
    }
    if let Some(v) = &n.max {
        args.push(("max", v.to_string()));
    }
    args
}

fn length_args(min: Option<u64>, max: Option<u64>) -> Vec<(&'static str, String)> {
    let mut args = Vec::new();
    if let Some(v) = min {
        args.push(("minLength", v.to_string()));
    }
    if let Some(v) = max {
        args.push(("maxLength", v.to_string()));
    }
    args
}

/// Compact text form: `[long, string*]`, `{a: long, b?: string, *: any}`,
/// `long(min=0) | null`.
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SchemaKind::Any => f.write_str("any")?,
            SchemaKind::Null => f.write_str("null")?,
            SchemaKind::Boolean { value } => {
                let args: Vec<_> = value.iter().map(|v| ("value", v.to_string())).collect();
                write_args(f, "boolean", &args)?;
            }
            SchemaKind::Long(n) => write_args(f, "long", &numeric_args(n))?,
            SchemaKind::Double(n) => write_args(f, "double", &numeric_args(n))?,
            SchemaKind::Decimal(n) => write_args(f, "decfloat", &numeric_args(n))?,
            SchemaKind::Date(n) => write_args(f, "date", &numeric_args(n))?,
            SchemaKind::String(s) => {
                let mut args = Vec::new();
                if let Some(v) = &s.value {
                    args.push(("value", Value::String(v.clone()).to_string()));
                }
                args.extend(length_args(s.min_length, s.max_length));
                if let Some(p) = &s.pattern {
                    args.push(("pattern", Value::string(p.source()).to_string()));
                }
                write_args(f, "string", &args)?;
            }
            SchemaKind::Binary(b) => {
                let mut args = Vec::new();
                if let Some(v) = &b.value {
                    args.push(("value", Value::Binary(v.clone()).to_string()));
                }
                args.extend(length_args(b.min_length, b.max_length));
                write_args(f, "binary", &args)?;
            }
            SchemaKind::Array(a) => {
                f.write_str("[")?;
                for (i, s) in a.head.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{s}")?;
                }
                if let Some(rest) = &a.rest {
                    if !a.head.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "{rest}*")?;
                }
                f.write_str("]")?;
            }
            SchemaKind::Record(r) => {
                f.write_str("{")?;
                for (i, field) in r.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let mark = if field.optional { "?" } else { "" };
                    write!(f, "{}{mark}: {}", field.name, field.schema)?;
                }
                if let Some(additional) = &r.additional {
                    if !r.fields.is_empty() {
                        f.write_str(", ")?;
                    }
                    write!(f, "*: {additional}")?;
                }
                f.write_str("}")?;
            }
            SchemaKind::SchemaType => f.write_str("schematype")?,
            SchemaKind::Function => f.write_str("function")?,
            SchemaKind::JavaObject { class } => {
                let args: Vec<_> = class
                    .iter()
                    .map(|c| ("class", Value::String(c.clone()).to_string()))
                    .collect();
                write_args(f, "javaobject", &args)?;
            }
            SchemaKind::Regex => f.write_str("regex")?,
            SchemaKind::Span => f.write_str("span")?,
            SchemaKind::Or(members) => {
                if members.is_empty() {
                    f.write_str("nothing")?;
                }
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    if matches!(m.kind, SchemaKind::Or(_)) {
                        write!(f, "({m})")?;
                    } else {
                        write!(f, "{m}")?;
                    }
                }
            }
        }
        if let Some(annotation) = &self.annotation {
            write!(f, " @{annotation}")?;
        }
        Ok(())
    }
}
