//! # Value Model
//!
//! The closed set of value kinds moved through the codecs, together with their
//! identity, ordering and hashing contracts.
//!
//! ## Design Decisions
//!
//! - **One variant per logical type**: physical variety (compact, spilled or
//!   lazily decoded arrays and records) lives inside [`ArrayValue`] and
//!   [`RecordValue`], so every `Value` variant maps to exactly one
//!   [`LogicalType`]
//! - **Total order**: values of different logical types order by
//!   [`LogicalType`]; values of the same type order type-specifically
//! - **Immutable by construction**: values share their payloads through
//!   `Arc`. Mutation goes through the builder siblings ([`ArrayBuilder`],
//!   [`RecordBuilder`], [`MutableString`])
//! - **Functions are not comparable**: [`Value::try_cmp`] and
//!   [`Value::try_long_hash`] report an error; the `Ord` impl panics
//!
//! ## Usage
//!
//! ```rust
//! use spindle::value::{RecordBuilder, Value};
//!
//! let mut builder = RecordBuilder::new();
//! builder.add("name", Value::from("ada")).unwrap();
//! builder.add("age", Value::Long(36)).unwrap();
//! let person = builder.build();
//!
//! assert!(Value::Long(5) < Value::Double(1.0));
//! assert_eq!(person.as_record().map(|r| r.len()), Some(2));
//! ```

mod array;
mod atoms;
mod hash;
mod json;
mod record;

pub use array::{ArrayBuilder, ArrayIter, ArrayValue, SpilledArray};
pub use atoms::{FunctionValue, JavaObjectValue, MutableString, RegexValue, SpanValue};
pub use hash::GOLDEN_RATIO_64;
pub use record::{RecordBuilder, RecordIter, RecordValue};

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{ValueError, ValueResult};
use crate::schema::Schema;

/// Coarse value type. Declaration order is the cross-type sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalType {
    Null,
    Boolean,
    Long,
    Double,
    Decfloat,
    String,
    Binary,
    Array,
    Record,
    Date,
    Schema,
    Function,
    JavaObject,
    Regex,
    Span,
}

impl LogicalType {
    pub fn name(self) -> &'static str {
        match self {
            LogicalType::Null => "null",
            LogicalType::Boolean => "boolean",
            LogicalType::Long => "long",
            LogicalType::Double => "double",
            LogicalType::Decfloat => "decfloat",
            LogicalType::String => "string",
            LogicalType::Binary => "binary",
            LogicalType::Array => "array",
            LogicalType::Record => "record",
            LogicalType::Date => "date",
            LogicalType::Schema => "schema",
            LogicalType::Function => "function",
            LogicalType::JavaObject => "javaobject",
            LogicalType::Regex => "regex",
            LogicalType::Span => "span",
        }
    }

    pub fn from_name(name: &str) -> Option<LogicalType> {
        LogicalType::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Whether two values of this type can be ordered against each other.
    pub fn is_comparable(self) -> bool {
        self != LogicalType::Function
    }

    pub const ALL: [LogicalType; 15] = [
        LogicalType::Null,
        LogicalType::Boolean,
        LogicalType::Long,
        LogicalType::Double,
        LogicalType::Decfloat,
        LogicalType::String,
        LogicalType::Binary,
        LogicalType::Array,
        LogicalType::Record,
        LogicalType::Date,
        LogicalType::Schema,
        LogicalType::Function,
        LogicalType::JavaObject,
        LogicalType::Regex,
        LogicalType::Span,
    ];
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical encoding id written as the tag of the generic wire format.
///
/// Ids are stable; `Null` is tag 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Encoding {
    Null = 0,
    Boolean = 1,
    Long = 2,
    Double = 3,
    Decimal = 4,
    String = 5,
    Binary = 6,
    Date = 7,
    FixedArray = 8,
    SpilledArray = 9,
    Record = 10,
    Function = 11,
    Schema = 12,
    JavaObject = 13,
    Regex = 14,
    Span = 15,
}

impl Encoding {
    /// One past the largest encoding id.
    pub const LIMIT: usize = 16;

    pub const ALL: [Encoding; Encoding::LIMIT] = [
        Encoding::Null,
        Encoding::Boolean,
        Encoding::Long,
        Encoding::Double,
        Encoding::Decimal,
        Encoding::String,
        Encoding::Binary,
        Encoding::Date,
        Encoding::FixedArray,
        Encoding::SpilledArray,
        Encoding::Record,
        Encoding::Function,
        Encoding::Schema,
        Encoding::JavaObject,
        Encoding::Regex,
        Encoding::Span,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u64) -> Option<Encoding> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Encoding::ALL.get(i).copied())
    }

    pub fn logical_type(self) -> LogicalType {
        match self {
            Encoding::Null => LogicalType::Null,
            Encoding::Boolean => LogicalType::Boolean,
            Encoding::Long => LogicalType::Long,
            Encoding::Double => LogicalType::Double,
            Encoding::Decimal => LogicalType::Decfloat,
            Encoding::String => LogicalType::String,
            Encoding::Binary => LogicalType::Binary,
            Encoding::Date => LogicalType::Date,
            Encoding::FixedArray | Encoding::SpilledArray => LogicalType::Array,
            Encoding::Record => LogicalType::Record,
            Encoding::Function => LogicalType::Function,
            Encoding::Schema => LogicalType::Schema,
            Encoding::JavaObject => LogicalType::JavaObject,
            Encoding::Regex => LogicalType::Regex,
            Encoding::Span => LogicalType::Span,
        }
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    /// 128-bit decimal float
    Decimal(Decimal),
    String(Arc<str>),
    Binary(Arc<[u8]>),
    /// Milliseconds since the Unix epoch, UTC
    Date(i64),
    Array(ArrayValue),
    Record(RecordValue),
    Function(FunctionValue),
    Schema(Arc<Schema>),
    Regex(RegexValue),
    Span(SpanValue),
    JavaObject(JavaObjectValue),
}

/// How function values behave during comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionOrder {
    /// Ordering functions is an error.
    Reject,
    /// Functions compare by source and captures; used for `Eq` and `Hash` only.
    Structural,
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn binary(bytes: impl AsRef<[u8]>) -> Value {
        Value::Binary(Arc::from(bytes.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(ArrayValue::new(items))
    }

    /// Builds a record from unsorted pairs, rejecting duplicate names.
    pub fn record<N: Into<Arc<str>>>(
        fields: impl IntoIterator<Item = (N, Value)>,
    ) -> ValueResult<Value> {
        RecordValue::from_pairs(fields).map(Value::Record)
    }

    pub fn span(begin: i64, end: i64) -> ValueResult<Value> {
        SpanValue::new(begin, end).map(Value::Span)
    }

    pub fn regex(pattern: &str, flags: &str) -> ValueResult<Value> {
        RegexValue::new(pattern, flags).map(Value::Regex)
    }

    pub fn schema(schema: Schema) -> Value {
        Value::Schema(Arc::new(schema))
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::Null => Encoding::Null,
            Value::Boolean(_) => Encoding::Boolean,
            Value::Long(_) => Encoding::Long,
            Value::Double(_) => Encoding::Double,
            Value::Decimal(_) => Encoding::Decimal,
            Value::String(_) => Encoding::String,
            Value::Binary(_) => Encoding::Binary,
            Value::Date(_) => Encoding::Date,
            Value::Array(a) => a.encoding(),
            Value::Record(_) => Encoding::Record,
            Value::Function(_) => Encoding::Function,
            Value::Schema(_) => Encoding::Schema,
            Value::Regex(_) => Encoding::Regex,
            Value::Span(..) => Encoding::Span,
            Value::JavaObject(_) => Encoding::JavaObject,
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        self.encoding().logical_type()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            Value::Schema(s) => Some(s),
            _ => None,
        }
    }

    /// Total-order comparison. Fails only when two function values meet.
    pub fn try_cmp(&self, other: &Value) -> ValueResult<Ordering> {
        self.compare_with(other, FunctionOrder::Reject)
    }

    pub(crate) fn compare_with(&self, other: &Value, order: FunctionOrder) -> ValueResult<Ordering> {
        Ok(match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.compare_with(b, order)?,
            (Value::Record(a), Value::Record(b)) => a.compare_with(b, order)?,
            (Value::Function(a), Value::Function(b)) => match order {
                FunctionOrder::Reject => {
                    return Err(ValueError::NotComparable(LogicalType::Function))
                }
                FunctionOrder::Structural => a.structural_cmp(b)?,
            },
            (Value::Schema(a), Value::Schema(b)) => a.cmp(b),
            (Value::Regex(a), Value::Regex(b)) => a.cmp(b),
            (Value::Span(a), Value::Span(b)) => a.cmp(b),
            (Value::JavaObject(a), Value::JavaObject(b)) => a.cmp(b),
            // One variant per logical type, so anything left differs in type
            _ => self.logical_type().cmp(&other.logical_type()),
        })
    }

    /// 64-bit hash consistent with [`Value::try_cmp`]: equal values hash equally,
    /// whatever their encoding.
    pub fn try_long_hash(&self) -> ValueResult<i64> {
        self.hash_with(FunctionOrder::Reject)
    }

    /// Panicking form of [`Value::try_long_hash`].
    pub fn long_hash(&self) -> i64 {
        match self.try_long_hash() {
            Ok(h) => h,
            Err(e) => panic!("long_hash: {e}"),
        }
    }

    pub(crate) fn hash_with(&self, order: FunctionOrder) -> ValueResult<i64> {
        Ok(match self {
            Value::Null => hash::NULL_HASH,
            Value::Boolean(b) => hash::hash_long(i64::from(*b)),
            Value::Long(v) | Value::Date(v) => hash::hash_long(*v),
            Value::Double(v) => hash::hash_double(*v),
            Value::Decimal(v) => hash::hash_decimal(*v),
            Value::String(s) => hash::hash_bytes(s.as_bytes()),
            Value::Binary(b) => hash::hash_bytes(b),
            Value::Array(a) => {
                let mut h = hash::SEED;
                for item in a.iter() {
                    h = hash::combine(h, item.hash_with(order)?);
                }
                h
            }
            Value::Record(r) => {
                let mut h = hash::SEED;
                for (name, value) in r.iter() {
                    h = hash::combine(h, hash::hash_bytes(name.as_bytes()));
                    h = hash::combine(h, value.hash_with(order)?);
                }
                h
            }
            Value::Function(f) => match order {
                FunctionOrder::Reject => {
                    return Err(ValueError::NotComparable(LogicalType::Function))
                }
                FunctionOrder::Structural => f.structural_hash()?,
            },
            Value::Schema(s) => s.to_value().hash_with(order)?,
            Value::Regex(r) => hash::combine(
                hash::hash_bytes(r.pattern().as_bytes()),
                hash::hash_bytes(r.flags().as_bytes()),
            ),
            Value::Span(s) => hash::combine(hash::hash_long(s.begin()), hash::hash_long(s.end())),
            Value::JavaObject(o) => hash::combine(
                hash::hash_bytes(o.class_name().as_bytes()),
                hash::hash_bytes(o.payload()),
            ),
        })
    }

    /// Deep copy: no storage is shared with `self` afterwards.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::String(s) => Value::String(Arc::from(&**s)),
            Value::Binary(b) => Value::Binary(Arc::from(&**b)),
            Value::Array(a) => Value::Array(a.deep_copy()),
            Value::Record(r) => Value::Record(r.deep_copy()),
            Value::Function(f) => Value::Function(f.deep_copy()),
            Value::Schema(s) => Value::Schema(Arc::new(Schema::clone(s))),
            Value::JavaObject(o) => Value::JavaObject(o.deep_copy()),
            other => other.clone(),
        }
    }

    /// Deep copy into `target`, reusing its container storage when `target`
    /// holds an unshared array or record.
    pub fn copy_into(&self, target: &mut Value) {
        match (self, &mut *target) {
            (Value::Array(src), Value::Array(ArrayValue::Fixed(dst))) => {
                if let Some(buf) = Arc::get_mut(dst) {
                    buf.clear();
                    buf.extend(src.iter().map(|v| v.deep_copy()));
                    return;
                }
            }
            (Value::Record(src), Value::Record(RecordValue::Memory(dst))) => {
                if let Some(buf) = Arc::get_mut(dst) {
                    buf.clear();
                    buf.extend(
                        src.iter()
                            .map(|(name, v)| (Arc::from(name), v.deep_copy())),
                    );
                    return;
                }
            }
            _ => {}
        }
        *target = self.deep_copy();
    }

    /// A copy safe to hold indefinitely: lazily decoded containers are
    /// materialised, everything else is shared.
    pub fn immutable_copy(&self) -> Value {
        match self {
            Value::Array(a @ ArrayValue::Lazy(_)) => Value::Array(a.materialize()),
            Value::Record(r @ RecordValue::Lazy(_)) => Value::Record(r.materialize()),
            other => other.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            self.compare_with(other, FunctionOrder::Structural),
            Ok(Ordering::Equal)
        )
    }
}

impl Eq for Value {}

// Consistent with `Eq`: equal values under any encoding hash the same
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.hash_with(FunctionOrder::Structural) {
            Ok(h) => h.hash(state),
            Err(e) => panic!("hash: {e}"),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    /// # Panics
    ///
    /// When two function values are compared.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.try_cmp(other) {
            Ok(ord) => ord,
            Err(e) => panic!("cmp: {e}"),
        }
    }
}

// Convenience conversions
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Long(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<ArrayValue> for Value {
    fn from(a: ArrayValue) -> Self {
        Value::Array(a)
    }
}

impl From<RecordValue> for Value {
    fn from(r: RecordValue) -> Self {
        Value::Record(r)
    }
}

impl From<Schema> for Value {
    fn from(s: Schema) -> Self {
        Value::schema(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
