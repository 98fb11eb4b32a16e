//! The schema-oblivious codec.
//!
//! Wire format: `<VULong encoding id><payload>`. The table maps every
//! encoding id to its payload serializer; it is built once, checked for
//! complete coverage, and read-only afterwards, so a [`GenericCodec`] can be
//! cloned freely and shared across threads.
//!
//! Container serializers need the codec itself for their children. They hold
//! a weak handle to the table, which keeps the table free of reference
//! cycles.

use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use super::atoms::{
    BinarySerializer, BooleanSerializer, DecimalSerializer, DoubleSerializer, JavaObjectSerializer,
    NullSerializer, RegexSerializer, SpanSerializer, StringSerializer, VarLongSerializer,
};
use super::containers::{
    FixedArraySerializer, FunctionSerializer, RecordSerializer, SchemaValueSerializer,
    SpilledArraySerializer,
};
use super::varint::{read_vulong, write_vulong};
use super::{BasicSerializer, Encoding, FullSerializer};
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

pub(crate) struct GenericTable {
    serializers: Vec<Arc<dyn BasicSerializer>>,
    problems: Vec<String>,
}

impl GenericTable {
    fn build(handle: &CodecHandle) -> Self {
        let mut slots: Vec<Option<Arc<dyn BasicSerializer>>> = vec![None; Encoding::LIMIT];
        let mut problems = Vec::new();
        for (encoding, serializer) in registrations(handle) {
            let slot = &mut slots[encoding.id() as usize];
            if slot.is_some() {
                problems.push(format!("encoding {encoding:?} registered twice"));
            }
            *slot = Some(serializer);
        }
        let serializers = slots
            .into_iter()
            .enumerate()
            .map(|(id, slot)| {
                slot.unwrap_or_else(|| {
                    problems.push(format!("no serializer for encoding id {id}"));
                    Arc::new(MissingSerializer(id))
                })
            })
            .collect();
        GenericTable {
            serializers,
            problems,
        }
    }
}

fn registrations(handle: &CodecHandle) -> Vec<(Encoding, Arc<dyn BasicSerializer>)> {
    vec![
        (Encoding::Null, Arc::new(NullSerializer)),
        (Encoding::Boolean, Arc::new(BooleanSerializer)),
        (Encoding::Long, Arc::new(VarLongSerializer::long())),
        (Encoding::Double, Arc::new(DoubleSerializer)),
        (Encoding::Decimal, Arc::new(DecimalSerializer)),
        (Encoding::String, Arc::new(StringSerializer)),
        (Encoding::Binary, Arc::new(BinarySerializer)),
        (Encoding::Date, Arc::new(VarLongSerializer::date())),
        (Encoding::FixedArray, Arc::new(FixedArraySerializer::new(handle.clone()))),
        (Encoding::SpilledArray, Arc::new(SpilledArraySerializer::new(handle.clone()))),
        (Encoding::Record, Arc::new(RecordSerializer::new(handle.clone()))),
        (Encoding::Function, Arc::new(FunctionSerializer::new(handle.clone()))),
        (Encoding::Schema, Arc::new(SchemaValueSerializer::new(handle.clone()))),
        (Encoding::JavaObject, Arc::new(JavaObjectSerializer)),
        (Encoding::Regex, Arc::new(RegexSerializer)),
        (Encoding::Span, Arc::new(SpanSerializer)),
    ]
}

/// Placeholder for an id without a registration; never reachable from a
/// codec returned by [`GenericCodec::try_new`].
#[derive(Debug)]
struct MissingSerializer(usize);

impl MissingSerializer {
    fn error(&self) -> CodecError {
        CodecError::Config(format!("no serializer for encoding id {}", self.0))
    }
}

impl BasicSerializer for MissingSerializer {
    fn read(&self, _input: &mut dyn Read) -> CodecResult<Value> {
        Err(self.error())
    }

    fn write(&self, _out: &mut dyn Write, _value: &Value) -> CodecResult<()> {
        Err(self.error())
    }
}

/// Weak reference from a container serializer back to its codec.
#[derive(Clone)]
pub(crate) struct CodecHandle {
    table: Weak<GenericTable>,
}

impl CodecHandle {
    pub(crate) fn codec(&self) -> CodecResult<GenericCodec> {
        self.table
            .upgrade()
            .map(|table| GenericCodec { table })
            .ok_or_else(|| CodecError::Config("generic codec dropped while in use".into()))
    }
}

impl fmt::Debug for CodecHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodecHandle")
    }
}

/// The generic full serializer.
#[derive(Clone)]
pub struct GenericCodec {
    table: Arc<GenericTable>,
}

impl GenericCodec {
    /// Builds the table and checks that every encoding id is covered.
    pub fn try_new() -> CodecResult<Self> {
        let table = Arc::new_cyclic(|weak| {
            GenericTable::build(&CodecHandle {
                table: weak.clone(),
            })
        });
        if !table.problems.is_empty() {
            return Err(CodecError::Config(table.problems.join("; ")));
        }
        debug!(encodings = Encoding::LIMIT, "generic codec table built");
        Ok(GenericCodec { table })
    }

    /// # Panics
    ///
    /// If the encoding table is incomplete, which is a build defect rather
    /// than a runtime condition.
    pub fn new() -> Self {
        match Self::try_new() {
            Ok(codec) => codec,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn serializer(&self, encoding: Encoding) -> &Arc<dyn BasicSerializer> {
        &self.table.serializers[encoding.id() as usize]
    }

    /// Whether both handles share one table.
    pub fn same_table(&self, other: &GenericCodec) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }

    fn read_tag(input: &mut dyn Read) -> CodecResult<Encoding> {
        let id = read_vulong(input)?;
        Encoding::from_id(id).ok_or(CodecError::UnknownEncoding(id))
    }

    fn write_tag(out: &mut dyn Write, encoding: Encoding) -> CodecResult<()> {
        write_vulong(out, u64::from(encoding.id()))
    }

    /// Encoding of the next value, consuming only its tag.
    pub fn peek_encoding(input: &mut dyn Read) -> CodecResult<Encoding> {
        Self::read_tag(input)
    }
}

impl Default for GenericCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenericCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericCodec")
            .field("encodings", &self.table.serializers.len())
            .finish()
    }
}

impl FullSerializer for GenericCodec {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let encoding = Self::read_tag(input)?;
        self.serializer(encoding).read(input)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let encoding = value.encoding();
        Self::write_tag(out, encoding)?;
        self.serializer(encoding).write(out, value)
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        let encoding = Self::read_tag(input)?;
        self.serializer(encoding).skip(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let left = Self::read_tag(a)?;
        let right = Self::read_tag(b)?;
        if left == right {
            return self.serializer(left).compare(a, b);
        }
        let by_type = left.logical_type().cmp(&right.logical_type());
        if by_type != Ordering::Equal {
            return Ok(by_type);
        }
        // Same logical type, different encodings: decode both sides
        trace!(?left, ?right, "cross-encoding comparison");
        let va = self.serializer(left).read(a)?;
        let vb = self.serializer(right).read(b)?;
        Ok(va.try_cmp(&vb)?)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let encoding = Self::read_tag(input)?;
        Self::write_tag(out, encoding)?;
        self.serializer(encoding).copy(input, out)
    }
}
