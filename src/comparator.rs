//! # Byte-Level Comparator
//!
//! The entry point sort and shuffle code uses to order and partition
//! encoded values without decoding them.
//!
//! ## Design Decisions
//!
//! - **One comparator per worker**: all methods take `&mut self`, so the
//!   scratch buffer can never be shared by two running comparisons.
//!   Clone the comparator to give another thread its own.
//! - **Scratch is reused**: the buffer is cleared between calls, never
//!   reallocated once it has grown.
//! - **Spilled arrays stay encoded**: comparing a spilled array against
//!   another array walks its encoded elements and stops at the first
//!   difference instead of materialising the whole array.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut comparator = Comparator::generic();
//! let ord = comparator.compare(&page, 0, 12, &page, 12, 7)?;
//! let partition = comparator.long_hash(&page, 0, 12)? as u64 % partitions;
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use crate::codec::{FullSerializer, GenericCodec};
use crate::error::{CodecError, CodecResult};
use crate::value::{ArrayValue, SpilledArray, Value};

#[derive(Debug, Clone)]
pub struct Comparator {
    codec: Arc<dyn FullSerializer>,
    scratch: Vec<u8>,
}

impl Comparator {
    pub fn new(codec: Arc<dyn FullSerializer>) -> Self {
        Comparator {
            codec,
            scratch: Vec::new(),
        }
    }

    /// A comparator over generic-encoded values.
    pub fn generic() -> Self {
        Comparator::new(Arc::new(GenericCodec::new()))
    }

    pub fn codec(&self) -> &Arc<dyn FullSerializer> {
        &self.codec
    }

    /// Compares the values encoded in `a[off_a..off_a + len_a]` and
    /// `b[off_b..off_b + len_b]`.
    pub fn compare(
        &mut self,
        a: &[u8],
        off_a: usize,
        len_a: usize,
        b: &[u8],
        off_b: usize,
        len_b: usize,
    ) -> CodecResult<Ordering> {
        let a = range(a, off_a, len_a)?;
        let b = range(b, off_b, len_b)?;
        self.compare_slices(a, b)
    }

    pub fn compare_slices(&mut self, a: &[u8], b: &[u8]) -> CodecResult<Ordering> {
        let (mut a, mut b) = (a, b);
        self.codec.compare(&mut a, &mut b)
    }

    /// Hash of the encoded value, equal to [`Value::try_long_hash`] of its
    /// decoded form.
    pub fn long_hash(&mut self, bytes: &[u8], off: usize, len: usize) -> CodecResult<i64> {
        let value = self.codec.from_bytes(range(bytes, off, len)?)?;
        Ok(value.try_long_hash()?)
    }

    /// Compares two materialised values. Spilled arrays are compared
    /// through their encoded elements.
    pub fn compare_values(&mut self, a: &Value, b: &Value) -> CodecResult<Ordering> {
        match (a, b) {
            (Value::Array(ArrayValue::Spilled(x)), Value::Array(ArrayValue::Spilled(y))) => {
                compare_spilled(x, y)
            }
            (Value::Array(ArrayValue::Spilled(x)), Value::Array(y)) => self.spilled_against(x, y),
            (Value::Array(x), Value::Array(ArrayValue::Spilled(y))) => {
                self.spilled_against(y, x).map(Ordering::reverse)
            }
            _ => Ok(a.try_cmp(b)?),
        }
    }

    /// Encodes each element of `other` into the scratch buffer and compares
    /// it with the next encoded element of `spilled`.
    fn spilled_against(&mut self, spilled: &SpilledArray, other: &ArrayValue) -> CodecResult<Ordering> {
        let codec = spilled.codec();
        let mut rest = spilled.bytes();
        for item in other.iter().take(spilled.len()) {
            self.scratch.clear();
            codec.write(&mut self.scratch, &item)?;
            let ord = codec.compare(&mut rest, &mut self.scratch.as_slice())?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(spilled.len().cmp(&other.len()))
    }
}

fn compare_spilled(x: &SpilledArray, y: &SpilledArray) -> CodecResult<Ordering> {
    let codec = x.codec();
    let (mut a, mut b) = (x.bytes(), y.bytes());
    for _ in 0..x.len().min(y.len()) {
        let ord = codec.compare(&mut a, &mut b)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(x.len().cmp(&y.len()))
}

fn range(bytes: &[u8], off: usize, len: usize) -> CodecResult<&[u8]> {
    off.checked_add(len)
        .and_then(|end| bytes.get(off..end))
        .ok_or(CodecError::Truncated)
}
