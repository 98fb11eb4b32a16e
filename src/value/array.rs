//! Array values: in-memory, spilled and lazily decoded storage.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{Encoding, FunctionOrder, Value};
use crate::codec::lazy::{expect_validated, LazyArray};
use crate::codec::{FullSerializer, GenericCodec};
use crate::error::{CodecError, CodecResult, ValueResult};

/// An immutable, ordered sequence of values.
///
/// All three storage forms have the same logical type and compare and hash
/// identically when they hold the same elements.
#[derive(Debug, Clone)]
pub enum ArrayValue {
    /// Elements held in memory
    Fixed(Arc<Vec<Value>>),
    /// Elements held as generic-encoded bytes, decoded one at a time
    Spilled(Arc<SpilledArray>),
    /// Elements decoded on first access
    Lazy(Arc<LazyArray>),
}

impl ArrayValue {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayValue::Fixed(Arc::new(items))
    }

    pub fn empty() -> Self {
        ArrayValue::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Fixed(items) => items.len(),
            ArrayValue::Spilled(spilled) => spilled.len(),
            ArrayValue::Lazy(lazy) => lazy.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            ArrayValue::Spilled(_) => Encoding::SpilledArray,
            ArrayValue::Fixed(_) | ArrayValue::Lazy(_) => Encoding::FixedArray,
        }
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, ArrayValue::Spilled(_))
    }

    /// Positional access. Spilled arrays decode the elements up to `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            ArrayValue::Fixed(items) => items.get(index).cloned(),
            ArrayValue::Spilled(_) => self.iter().nth(index),
            ArrayValue::Lazy(lazy) => (index < lazy.len()).then(|| lazy.get(index).clone()),
        }
    }

    /// A fresh pass over the elements; each call starts from the first one.
    pub fn iter(&self) -> ArrayIter<'_> {
        let inner = match self {
            ArrayValue::Fixed(items) => IterInner::Fixed(items.iter()),
            ArrayValue::Spilled(spilled) => IterInner::Spilled {
                codec: &spilled.codec,
                rest: &spilled.bytes,
                remaining: spilled.count,
            },
            ArrayValue::Lazy(lazy) => IterInner::Lazy {
                array: lazy,
                next: 0,
            },
        };
        ArrayIter { inner }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            ArrayValue::Fixed(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().collect()
    }

    /// In-memory form sharing the element payloads.
    pub fn materialize(&self) -> ArrayValue {
        match self {
            ArrayValue::Fixed(_) => self.clone(),
            _ => ArrayValue::new(self.to_vec()),
        }
    }

    pub(crate) fn deep_copy(&self) -> ArrayValue {
        match self {
            ArrayValue::Spilled(spilled) => ArrayValue::Spilled(Arc::new(SpilledArray {
                count: spilled.count,
                bytes: Arc::from(&*spilled.bytes),
                codec: spilled.codec.clone(),
            })),
            _ => ArrayValue::new(self.iter().map(|v| v.deep_copy()).collect()),
        }
    }

    pub(super) fn compare_with(&self, other: &ArrayValue, order: FunctionOrder) -> ValueResult<Ordering> {
        // Element-wise, then by length; iteration stops at the first difference
        for (a, b) in self.iter().zip(other.iter()) {
            let ord = a.compare_with(&b, order)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(self.len().cmp(&other.len()))
    }
}

impl Default for ArrayValue {
    fn default() -> Self {
        ArrayValue::empty()
    }
}

impl FromIterator<Value> for ArrayValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ArrayValue::new(iter.into_iter().collect())
    }
}

/// Iterator over array elements.
pub struct ArrayIter<'a> {
    inner: IterInner<'a>,
}

enum IterInner<'a> {
    Fixed(std::slice::Iter<'a, Value>),
    Spilled {
        codec: &'a GenericCodec,
        rest: &'a [u8],
        remaining: usize,
    },
    Lazy {
        array: &'a LazyArray,
        next: usize,
    },
}

impl Iterator for ArrayIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match &mut self.inner {
            IterInner::Fixed(items) => items.next().cloned(),
            IterInner::Spilled {
                codec,
                rest,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                Some(expect_validated(codec.read(rest), "spilled array element"))
            }
            IterInner::Lazy { array, next } => {
                if *next >= array.len() {
                    return None;
                }
                let value = array.get(*next).clone();
                *next += 1;
                Some(value)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match &self.inner {
            IterInner::Fixed(items) => items.len(),
            IterInner::Spilled { remaining, .. } => *remaining,
            IterInner::Lazy { array, next } => array.len().saturating_sub(*next),
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for ArrayIter<'_> {}

/// Array elements kept as a run of generic-encoded values.
///
/// The bytes are fully decoded once on construction, so decoding an
/// element afterwards cannot fail.
#[derive(Clone)]
pub struct SpilledArray {
    count: usize,
    bytes: Arc<[u8]>,
    codec: GenericCodec,
}

impl SpilledArray {
    /// Wraps `count` tagged values laid out back to back in `bytes`.
    pub fn from_encoded(codec: GenericCodec, count: usize, bytes: Arc<[u8]>) -> CodecResult<Self> {
        let mut rest: &[u8] = &bytes;
        for _ in 0..count {
            codec.validate(&mut rest)?;
        }
        if !rest.is_empty() {
            return Err(CodecError::Malformed(format!(
                "{} trailing bytes after {count} spilled elements",
                rest.len()
            )));
        }
        Ok(SpilledArray {
            count,
            bytes,
            codec,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The encoded elements.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn codec(&self) -> &GenericCodec {
        &self.codec
    }
}

impl fmt::Debug for SpilledArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpilledArray")
            .field("count", &self.count)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Mutable sibling of [`ArrayValue`].
///
/// With a spill threshold, the builder moves its elements into encoded
/// storage once it holds more than `threshold` of them.
#[derive(Debug, Default)]
pub struct ArrayBuilder {
    items: Vec<Value>,
    spill: Option<Spill>,
}

#[derive(Debug)]
struct Spill {
    codec: GenericCodec,
    threshold: usize,
    buf: Vec<u8>,
    count: usize,
    active: bool,
}

impl ArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ArrayBuilder {
            items: Vec::with_capacity(capacity),
            spill: None,
        }
    }

    /// A builder that spills past `threshold` elements; 0 never spills.
    pub fn spilling(codec: GenericCodec, threshold: usize) -> Self {
        let spill = (threshold > 0).then(|| Spill {
            codec,
            threshold,
            buf: Vec::new(),
            count: 0,
            active: false,
        });
        ArrayBuilder {
            items: Vec::new(),
            spill,
        }
    }

    pub fn len(&self) -> usize {
        match &self.spill {
            Some(spill) if spill.active => spill.count,
            _ => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        self.spill.as_ref().is_some_and(|s| s.active)
    }

    pub fn push(&mut self, value: Value) -> CodecResult<()> {
        if let Some(spill) = &mut self.spill {
            if !spill.active && self.items.len() >= spill.threshold {
                debug!(
                    elements = self.items.len(),
                    threshold = spill.threshold,
                    "spilling array builder to encoded storage"
                );
                for item in self.items.drain(..) {
                    spill.codec.write(&mut spill.buf, &item)?;
                    spill.count += 1;
                }
                spill.active = true;
            }
            if spill.active {
                spill.codec.write(&mut spill.buf, &value)?;
                spill.count += 1;
                return Ok(());
            }
        }
        self.items.push(value);
        Ok(())
    }

    pub fn build(self) -> Value {
        match self.spill {
            Some(spill) if spill.active => Value::Array(ArrayValue::Spilled(Arc::new(SpilledArray {
                count: spill.count,
                bytes: spill.buf.into(),
                codec: spill.codec,
            }))),
            _ => Value::Array(ArrayValue::new(self.items)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn longs(n: i64) -> Vec<Value> {
        (0..n).map(Value::Long).collect()
    }

    #[test]
    fn test_fixed_array_access() {
        let arr = ArrayValue::new(longs(3));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(1), Some(Value::Long(1)));
        assert_eq!(arr.get(3), None);
        assert_eq!(arr.iter().count(), 3);
        // iteration restarts from scratch
        assert_eq!(arr.iter().next(), Some(Value::Long(0)));
    }

    #[test]
    fn test_builder_spills_past_threshold() {
        let codec = GenericCodec::new();
        let mut builder = ArrayBuilder::spilling(codec, 4);
        for v in longs(10) {
            builder.push(v).unwrap();
        }
        assert!(builder.is_spilled());
        assert_eq!(builder.len(), 10);
        let spilled = builder.build();
        assert_eq!(spilled.encoding(), Encoding::SpilledArray);

        let fixed = Value::array(longs(10));
        assert_eq!(spilled, fixed);
        assert_eq!(spilled.long_hash(), fixed.long_hash());
        assert_eq!(spilled.as_array().unwrap().get(7), Some(Value::Long(7)));
    }

    #[test]
    fn test_builder_without_threshold_stays_in_memory() {
        let mut builder = ArrayBuilder::spilling(GenericCodec::new(), 0);
        for v in longs(100) {
            builder.push(v).unwrap();
        }
        assert!(!builder.is_spilled());
        assert_eq!(builder.build().encoding(), Encoding::FixedArray);
    }

    #[test]
    fn test_spilled_array_rejects_trailing_bytes() {
        let codec = GenericCodec::new();
        let mut bytes = Vec::new();
        codec.write(&mut bytes, &Value::Long(1)).unwrap();
        codec.write(&mut bytes, &Value::Long(2)).unwrap();
        let err = SpilledArray::from_encoded(codec.clone(), 1, bytes.clone().into()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));

        let err = SpilledArray::from_encoded(codec, 3, bytes.into()).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }

    #[test]
    fn test_spilled_array_rejects_invalid_content() {
        // One string element holding a lone 0xff byte
        let bytes: Vec<u8> = vec![5, 1, 0xff];
        let err = SpilledArray::from_encoded(GenericCodec::new(), 1, bytes.into()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_spilled_comparison_stops_early() {
        let mut builder = ArrayBuilder::spilling(GenericCodec::new(), 1);
        for v in [Value::Long(1), Value::Long(9), Value::from("tail")] {
            builder.push(v).unwrap();
        }
        let spilled = builder.build();
        let other = Value::array(vec![Value::Long(1), Value::Long(2)]);
        assert!(other < spilled);
    }
}
