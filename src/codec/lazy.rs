//! # Lazy Containers
//!
//! Wide records and arrays decoded by a [`SchemaCodec`](super::SchemaCodec)
//! keep their encoded bytes and decode each position on first access.
//!
//! ## Design Decisions
//!
//! - **Validate up front**: the reader walks every position with
//!   `validate` while capturing the exact bytes, so truncated, structurally
//!   broken or content-invalid input fails at read time, never at access
//!   time.
//! - **Memoised per position**: each position decodes at most once; a
//!   counter per position records how many decodes happened.
//! - **Transparent**: lazy containers compare, hash and copy exactly like
//!   their in-memory forms.

use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::trace;

use super::stream::RecordingReader;
use super::BasicSerializer;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Unwraps a decode of bytes that already passed `validate`.
///
/// # Panics
///
/// If the decode fails anyway, which means a serializer's `read` rejected
/// bytes its own `validate` accepted.
pub(crate) fn expect_validated<T>(result: CodecResult<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{what}: validated bytes failed to decode: {e}"),
    }
}

struct Slot {
    start: usize,
    end: usize,
    serializer: Arc<dyn BasicSerializer>,
    value: OnceLock<Value>,
    decodes: AtomicU32,
}

impl Slot {
    fn get<'a>(&'a self, bytes: &[u8], what: &str) -> &'a Value {
        self.value.get_or_init(|| {
            self.decodes.fetch_add(1, Ordering::Relaxed);
            trace!(start = self.start, end = self.end, what, "materializing lazy position");
            let mut input = &bytes[self.start..self.end];
            expect_validated(self.serializer.read(&mut input), what)
        })
    }

    fn decodes(&self) -> u32 {
        self.decodes.load(Ordering::Relaxed)
    }
}

/// Captures a container's bytes position by position.
pub(crate) struct LazyCapture<'a> {
    reader: RecordingReader<'a>,
    slots: Vec<Slot>,
}

impl<'a> LazyCapture<'a> {
    pub(crate) fn new(input: &'a mut dyn Read) -> Self {
        LazyCapture {
            reader: RecordingReader::new(input),
            slots: Vec::new(),
        }
    }

    /// The underlying stream, for prefixes and names between positions.
    pub(crate) fn reader(&mut self) -> &mut dyn Read {
        &mut self.reader
    }

    /// Validates the next position with `serializer` and remembers its bytes.
    pub(crate) fn capture(&mut self, serializer: &Arc<dyn BasicSerializer>) -> CodecResult<()> {
        let start = self.reader.position();
        serializer.validate(&mut self.reader)?;
        self.slots.push(Slot {
            start,
            end: self.reader.position(),
            serializer: Arc::clone(serializer),
            value: OnceLock::new(),
            decodes: AtomicU32::new(0),
        });
        Ok(())
    }

    pub(crate) fn into_array(self) -> LazyArray {
        LazyArray {
            bytes: self.reader.into_bytes(),
            slots: self.slots,
        }
    }

    /// `names` pairs with the captured positions in capture order.
    pub(crate) fn into_record(self, names: Vec<Arc<str>>) -> CodecResult<LazyRecord> {
        debug_assert_eq!(names.len(), self.slots.len());
        let mut fields: Vec<(Arc<str>, Slot)> = names.into_iter().zip(self.slots).collect();
        fields.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        if let Some(dup) = fields.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CodecError::Malformed(format!(
                "duplicate record field {:?}",
                dup[0].0
            )));
        }
        let (names, slots) = fields.into_iter().unzip();
        Ok(LazyRecord {
            bytes: self.reader.into_bytes(),
            names,
            slots,
        })
    }
}

/// A record whose field values decode on first access.
pub struct LazyRecord {
    bytes: Arc<[u8]>,
    names: Vec<Arc<str>>,
    slots: Vec<Slot>,
}

impl LazyRecord {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .binary_search_by(|n| n.as_bytes().cmp(name.as_bytes()))
            .ok()
    }

    /// # Panics
    ///
    /// If `index >= len()`.
    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// # Panics
    ///
    /// If `index >= len()`.
    pub fn value(&self, index: usize) -> &Value {
        self.slots[index].get(&self.bytes, "lazy record field")
    }

    /// How many times the field at `index` has been decoded (0 or 1).
    pub fn materializations(&self, index: usize) -> u32 {
        self.slots[index].decodes()
    }
}

impl fmt::Debug for LazyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRecord")
            .field("fields", &self.names)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// An array whose elements decode on first access.
pub struct LazyArray {
    bytes: Arc<[u8]>,
    slots: Vec<Slot>,
}

impl LazyArray {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// # Panics
    ///
    /// If `index >= len()`.
    pub fn get(&self, index: usize) -> &Value {
        self.slots[index].get(&self.bytes, "lazy array element")
    }

    pub fn materializations(&self, index: usize) -> u32 {
        self.slots[index].decodes()
    }
}

impl fmt::Debug for LazyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded = self.slots.iter().filter(|s| s.value.get().is_some()).count();
        f.debug_struct("LazyArray")
            .field("len", &self.slots.len())
            .field("decoded", &decoded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::atoms::{StringSerializer, VarLongSerializer};

    fn capture_longs(values: &[i64]) -> LazyArray {
        let ser: Arc<dyn BasicSerializer> = Arc::new(VarLongSerializer::long());
        let mut bytes = Vec::new();
        for v in values {
            ser.write(&mut bytes, &Value::Long(*v)).unwrap();
        }
        let mut input = bytes.as_slice();
        let mut capture = LazyCapture::new(&mut input);
        for _ in values {
            capture.capture(&ser).unwrap();
        }
        capture.into_array()
    }

    #[test]
    fn test_positions_decode_once() {
        let array = capture_longs(&[1, -500, 70_000]);
        assert_eq!(array.len(), 3);
        assert_eq!(array.materializations(1), 0);
        assert_eq!(array.get(1), &Value::Long(-500));
        assert_eq!(array.get(1), &Value::Long(-500));
        assert_eq!(array.materializations(1), 1);
        assert_eq!(array.materializations(0), 0);
    }

    #[test]
    fn test_truncated_capture_fails_up_front() {
        let ser: Arc<dyn BasicSerializer> = Arc::new(StringSerializer);
        let mut bytes = Vec::new();
        ser.write(&mut bytes, &Value::from("hello")).unwrap();
        bytes.truncate(3);
        let mut input = bytes.as_slice();
        let mut capture = LazyCapture::new(&mut input);
        assert!(matches!(capture.capture(&ser), Err(CodecError::Truncated)));
    }

    #[test]
    fn test_invalid_content_fails_up_front() {
        let ser: Arc<dyn BasicSerializer> = Arc::new(StringSerializer);
        let bytes = [1u8, 0xff];
        let mut input = &bytes[..];
        let mut capture = LazyCapture::new(&mut input);
        assert!(matches!(capture.capture(&ser), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_record_fields_sorted_by_name() {
        let ser: Arc<dyn BasicSerializer> = Arc::new(VarLongSerializer::long());
        let mut bytes = Vec::new();
        ser.write(&mut bytes, &Value::Long(2)).unwrap();
        ser.write(&mut bytes, &Value::Long(1)).unwrap();
        let mut input = bytes.as_slice();
        let mut capture = LazyCapture::new(&mut input);
        capture.capture(&ser).unwrap();
        capture.capture(&ser).unwrap();
        let record = capture
            .into_record(vec![Arc::from("b"), Arc::from("a")])
            .unwrap();
        assert_eq!(record.name(0), "a");
        assert_eq!(record.value(0), &Value::Long(1));
        assert_eq!(record.index_of("b"), Some(1));
        assert_eq!(record.index_of("c"), None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let ser: Arc<dyn BasicSerializer> = Arc::new(VarLongSerializer::long());
        let bytes = [0x80u8, 0x80];
        let mut input = &bytes[..];
        let mut capture = LazyCapture::new(&mut input);
        capture.capture(&ser).unwrap();
        capture.capture(&ser).unwrap();
        let err = capture
            .into_record(vec![Arc::from("a"), Arc::from("a")])
            .unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }
}
