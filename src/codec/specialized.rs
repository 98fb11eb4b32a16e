//! # Schema-Specialized Codec
//!
//! Serializers generated from a [`Schema`]. Where the schema pins a
//! position to one logical type the encoding tag is implied and omitted;
//! unconstrained positions fall back to the tagged generic format.
//!
//! ## Design Decisions
//!
//! - **Chosen once**: every schema node resolves to a concrete serializer
//!   when the codec is built; reading and writing never inspect types to
//!   pick a serializer.
//! - **Shared nodes**: a [`SchemaCodecFactory`] caches serializers by
//!   schema, so codecs built in one session share identical subtrees.
//! - **Immutable**: a built [`SchemaCodec`] holds no mutable state and can
//!   be shared across threads. Lazy values it returns are owned by the
//!   caller.
//!
//! ## Layouts
//!
//! ```text
//! constant   (nothing)
//! string     length + bytes, or bytes only when the length is fixed
//! array      head payloads, then count + rest payloads when rest exists
//! record     presence bytes, present field payloads in name order,
//!            then count + (name, payload)* when additional exists
//! or         member index + member payload
//! any        tagged generic value
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let factory = SchemaCodecFactory::default();
//! let codec = factory.codec(&Schema::array(vec![Schema::long()], Some(Schema::string())));
//! let bytes = codec.to_bytes(&value)?;
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::atoms::{mismatch, read_name, write_name, ConstSerializer, FixedStringSerializer};
use super::lazy::LazyCapture;
use super::stream::{copy_bytes, read_exact_vec, skip_bytes};
use super::varint::{read_len, write_vulong};
use super::{BasicSerializer, FullSerializer, GenericCodec, TaggedSerializer};
use crate::config::CodecConfig;
use crate::error::{CodecError, CodecResult};
use crate::schema::{Schema, SchemaKind};
use crate::value::{ArrayValue, Encoding, LogicalType, RecordValue, Value};

/// Builds [`SchemaCodec`]s and caches their serializers by schema.
pub struct SchemaCodecFactory {
    generic: GenericCodec,
    config: CodecConfig,
    cache: Mutex<HashMap<Schema, Arc<dyn BasicSerializer>>>,
}

impl SchemaCodecFactory {
    pub fn new(generic: GenericCodec, config: CodecConfig) -> Self {
        SchemaCodecFactory {
            generic,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn generic(&self) -> &GenericCodec {
        &self.generic
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn codec(&self, schema: &Schema) -> SchemaCodec {
        let root = self.serializer(schema);
        debug!(
            schema = %schema,
            verify_writes = self.config.verify_writes,
            cached = self.cached(),
            "built schema codec"
        );
        SchemaCodec {
            schema: schema.clone(),
            root,
            verify: self.config.verify_writes,
        }
    }

    /// The payload serializer for `schema`, built on first request.
    pub fn serializer(&self, schema: &Schema) -> Arc<dyn BasicSerializer> {
        if let Some(found) = self.cache.lock().get(schema) {
            return Arc::clone(found);
        }
        // Built without the lock held: children go through this method too.
        let built = self.build(schema);
        let mut cache = self.cache.lock();
        Arc::clone(cache.entry(schema.clone()).or_insert(built))
    }

    /// Number of cached serializers.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    fn lazy(&self, positions: usize) -> bool {
        let threshold = self.config.lazy_field_threshold;
        threshold > 0 && positions >= threshold
    }

    fn atom(&self, encoding: Encoding) -> Arc<dyn BasicSerializer> {
        Arc::clone(self.generic.serializer(encoding))
    }

    fn build(&self, schema: &Schema) -> Arc<dyn BasicSerializer> {
        if let Some(value) = schema.constant_value() {
            return Arc::new(ConstSerializer::new(value));
        }
        match schema.kind() {
            SchemaKind::Any => Arc::new(TaggedSerializer::new(self.generic.clone())),
            SchemaKind::Null => self.atom(Encoding::Null),
            SchemaKind::Boolean { .. } => self.atom(Encoding::Boolean),
            SchemaKind::Long(_) => self.atom(Encoding::Long),
            SchemaKind::Double(_) => self.atom(Encoding::Double),
            SchemaKind::Decimal(_) => self.atom(Encoding::Decimal),
            SchemaKind::Date(_) => self.atom(Encoding::Date),
            SchemaKind::String(s) => match s.fixed_length().and_then(|n| usize::try_from(n).ok()) {
                Some(len) => Arc::new(FixedStringSerializer::new(len)),
                None => self.atom(Encoding::String),
            },
            SchemaKind::Binary(_) => self.atom(Encoding::Binary),
            SchemaKind::SchemaType => self.atom(Encoding::Schema),
            SchemaKind::Function => self.atom(Encoding::Function),
            SchemaKind::JavaObject { .. } => self.atom(Encoding::JavaObject),
            SchemaKind::Regex => self.atom(Encoding::Regex),
            SchemaKind::Span => self.atom(Encoding::Span),
            SchemaKind::Array(array) => Arc::new(ArrayLayout {
                head: array.head().iter().map(|s| self.serializer(s)).collect(),
                rest: array.rest().map(|s| self.serializer(s)),
                lazy: self.lazy(array.head().len()),
            }),
            SchemaKind::Record(record) => {
                let fields: Vec<FieldSlot> = record
                    .fields()
                    .iter()
                    .map(|f| FieldSlot {
                        name: Arc::from(f.name()),
                        optional: f.is_optional(),
                        serializer: self.serializer(f.schema()),
                    })
                    .collect();
                Arc::new(RecordLayout {
                    optional: fields.iter().filter(|f| f.optional).count(),
                    lazy: self.lazy(fields.len()),
                    fields,
                    additional: record.additional().map(|s| self.serializer(s)),
                })
            }
            SchemaKind::Or(members) => Arc::new(UnionLayout {
                schema: schema.clone(),
                members: members
                    .iter()
                    .map(|m| (m.clone(), self.serializer(m)))
                    .collect(),
            }),
        }
    }
}

impl Default for SchemaCodecFactory {
    fn default() -> Self {
        SchemaCodecFactory::new(GenericCodec::new(), CodecConfig::default())
    }
}

impl std::fmt::Debug for SchemaCodecFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCodecFactory")
            .field("config", &self.config)
            .field("cached", &self.cached())
            .finish()
    }
}

/// A complete codec for values of one schema.
#[derive(Debug, Clone)]
pub struct SchemaCodec {
    schema: Schema,
    root: Arc<dyn BasicSerializer>,
    verify: bool,
}

impl SchemaCodec {
    /// Builds a standalone codec with default settings.
    pub fn new(schema: &Schema) -> Self {
        SchemaCodecFactory::default().codec(schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl FullSerializer for SchemaCodec {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        self.root.read(input)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        if self.verify && !self.schema.matches(value) {
            return Err(CodecError::mismatch(self.schema.to_string(), value.to_string()));
        }
        self.root.write(out, value)
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.root.skip(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        self.root.compare(a, b)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        self.root.copy(input, out)
    }
}

#[derive(Debug)]
struct ArrayLayout {
    head: Vec<Arc<dyn BasicSerializer>>,
    rest: Option<Arc<dyn BasicSerializer>>,
    lazy: bool,
}

impl ArrayLayout {
    fn read_lazy(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let mut capture = LazyCapture::new(input);
        for serializer in &self.head {
            capture.capture(serializer)?;
        }
        if let Some(rest) = &self.rest {
            let count = read_len(capture.reader())?;
            for _ in 0..count {
                capture.capture(rest)?;
            }
        }
        let array = capture.into_array();
        trace!(elements = array.len(), "captured lazy array");
        Ok(Value::Array(ArrayValue::Lazy(Arc::new(array))))
    }
}

impl BasicSerializer for ArrayLayout {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        if self.lazy {
            return self.read_lazy(input);
        }
        let mut items = Vec::with_capacity(self.head.len());
        for serializer in &self.head {
            items.push(serializer.read(input)?);
        }
        if let Some(rest) = &self.rest {
            let count = read_len(input)?;
            items.reserve(count.min(1024));
            for _ in 0..count {
                items.push(rest.read(input)?);
            }
        }
        Ok(Value::Array(ArrayValue::new(items)))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Array(array) = value else {
            return Err(mismatch(LogicalType::Array, value));
        };
        let head = self.head.len();
        if array.len() < head || (self.rest.is_none() && array.len() > head) {
            let expected = match self.rest {
                Some(_) => format!("array of at least {head} elements"),
                None => format!("array of {head} elements"),
            };
            return Err(CodecError::mismatch(
                expected,
                format!("array of {} elements", array.len()),
            ));
        }
        let mut items = array.iter();
        for (serializer, item) in self.head.iter().zip(items.by_ref()) {
            serializer.write(out, &item)?;
        }
        if let Some(rest) = &self.rest {
            write_vulong(out, (array.len() - head) as u64)?;
            for item in items {
                rest.write(out, &item)?;
            }
        }
        Ok(())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        for serializer in &self.head {
            serializer.skip(input)?;
        }
        if let Some(rest) = &self.rest {
            let count = read_len(input)?;
            for _ in 0..count {
                rest.skip(input)?;
            }
        }
        Ok(())
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        for serializer in &self.head {
            let ord = serializer.compare(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        let Some(rest) = &self.rest else {
            return Ok(Ordering::Equal);
        };
        let count_a = read_len(a)?;
        let count_b = read_len(b)?;
        for _ in 0..count_a.min(count_b) {
            let ord = rest.compare(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(count_a.cmp(&count_b))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        for serializer in &self.head {
            serializer.copy(input, out)?;
        }
        if let Some(rest) = &self.rest {
            let count = read_len(input)?;
            write_vulong(out, count as u64)?;
            for _ in 0..count {
                rest.copy(input, out)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FieldSlot {
    name: Arc<str>,
    optional: bool,
    serializer: Arc<dyn BasicSerializer>,
}

/// Optional field `i` is present when bit `i % 8` of presence byte `i / 8`
/// is set.
#[derive(Debug)]
struct RecordLayout {
    fields: Vec<FieldSlot>,
    optional: usize,
    additional: Option<Arc<dyn BasicSerializer>>,
    lazy: bool,
}

impl RecordLayout {
    fn presence_len(&self) -> usize {
        self.optional.div_ceil(8)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.fields
            .binary_search_by(|f| f.name.as_bytes().cmp(name.as_bytes()))
            .is_ok()
    }

    fn read_presence(&self, input: &mut dyn Read) -> CodecResult<Vec<u8>> {
        let presence = read_exact_vec(input, self.presence_len())?;
        let used = self.optional % 8;
        if used != 0 && presence.last().is_some_and(|last| last >> used != 0) {
            return Err(CodecError::Malformed(format!(
                "presence bits set beyond {} optional fields",
                self.optional
            )));
        }
        Ok(presence)
    }

    /// Declared fields present under `presence`, in name order.
    fn present<'a>(&'a self, presence: &'a [u8]) -> impl Iterator<Item = &'a FieldSlot> + 'a {
        let mut bit = 0;
        self.fields.iter().filter(move |f| {
            if !f.optional {
                return true;
            }
            let set = presence[bit / 8] & (1 << (bit % 8)) != 0;
            bit += 1;
            set
        })
    }

    /// Additional names must be undeclared and strictly increasing.
    fn check_additional(&self, prev: Option<&str>, name: &str) -> CodecResult<()> {
        if self.is_declared(name) {
            return Err(CodecError::Malformed(format!(
                "additional field {name:?} is declared by the schema"
            )));
        }
        match prev {
            Some(prev) if prev.as_bytes() >= name.as_bytes() => Err(CodecError::Malformed(format!(
                "field {name:?} out of order after {prev:?}"
            ))),
            _ => Ok(()),
        }
    }

    fn read_body(&self, input: &mut dyn Read, presence: &[u8]) -> CodecResult<Value> {
        let mut fields: Vec<(Arc<str>, Value)> = Vec::with_capacity(self.fields.len());
        for slot in self.present(presence) {
            fields.push((Arc::clone(&slot.name), slot.serializer.read(input)?));
        }
        if let Some(additional) = &self.additional {
            let count = read_len(input)?;
            let mut prev: Option<Arc<str>> = None;
            for _ in 0..count {
                let name = read_name(input)?;
                self.check_additional(prev.as_deref(), &name)?;
                fields.push((Arc::clone(&name), additional.read(input)?));
                prev = Some(name);
            }
        }
        Ok(Value::Record(RecordValue::from_pairs(fields)?))
    }

    fn read_lazy(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let mut capture = LazyCapture::new(input);
        let presence = self.read_presence(capture.reader())?;
        let mut names = Vec::with_capacity(self.fields.len());
        for slot in self.present(&presence) {
            capture.capture(&slot.serializer)?;
            names.push(Arc::clone(&slot.name));
        }
        if let Some(additional) = &self.additional {
            let count = read_len(capture.reader())?;
            let mut prev: Option<Arc<str>> = None;
            for _ in 0..count {
                let name = read_name(capture.reader())?;
                self.check_additional(prev.as_deref(), &name)?;
                capture.capture(additional)?;
                names.push(Arc::clone(&name));
                prev = Some(name);
            }
        }
        let record = capture.into_record(names)?;
        trace!(fields = record.len(), "captured lazy record");
        Ok(Value::Record(RecordValue::Lazy(Arc::new(record))))
    }
}

impl BasicSerializer for RecordLayout {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        if self.lazy {
            return self.read_lazy(input);
        }
        let presence = self.read_presence(input)?;
        self.read_body(input, &presence)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Record(record) = value else {
            return Err(mismatch(LogicalType::Record, value));
        };
        let mut presence = vec![0u8; self.presence_len()];
        let mut bit = 0;
        for slot in &self.fields {
            let found = record.contains(&slot.name);
            if slot.optional {
                if found {
                    presence[bit / 8] |= 1 << (bit % 8);
                }
                bit += 1;
            } else if !found {
                return Err(CodecError::mismatch(
                    format!("record with field {:?}", slot.name),
                    value.to_string(),
                ));
            }
        }
        out.write_all(&presence)?;
        for slot in &self.fields {
            if let Some(v) = record.get(&slot.name) {
                slot.serializer.write(out, v)?;
            }
        }

        let extra: Vec<(&str, &Value)> =
            record.iter().filter(|(n, _)| !self.is_declared(n)).collect();
        match &self.additional {
            Some(additional) => {
                write_vulong(out, extra.len() as u64)?;
                for (name, v) in extra {
                    write_name(out, name)?;
                    additional.write(out, v)?;
                }
            }
            None => {
                if let Some((name, _)) = extra.first() {
                    return Err(CodecError::mismatch(
                        "record without undeclared fields",
                        format!("field {name:?}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        let presence = self.read_presence(input)?;
        for slot in self.present(&presence) {
            slot.serializer.skip(input)?;
        }
        if let Some(additional) = &self.additional {
            let count = read_len(input)?;
            for _ in 0..count {
                skip_bytes(input)?;
                additional.skip(input)?;
            }
        }
        Ok(())
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let presence_a = self.read_presence(a)?;
        let presence_b = self.read_presence(b)?;
        if self.additional.is_none() && presence_a == presence_b {
            // Same field names on both sides: compare the payloads in order
            for slot in self.present(&presence_a) {
                let ord = slot.serializer.compare(a, b)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            return Ok(Ordering::Equal);
        }
        let va = self.read_body(a, &presence_a)?;
        let vb = self.read_body(b, &presence_b)?;
        Ok(va.try_cmp(&vb)?)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let presence = self.read_presence(input)?;
        out.write_all(&presence)?;
        for slot in self.present(&presence) {
            slot.serializer.copy(input, out)?;
        }
        if let Some(additional) = &self.additional {
            let count = read_len(input)?;
            write_vulong(out, count as u64)?;
            for _ in 0..count {
                copy_bytes(input, out)?;
                additional.copy(input, out)?;
            }
        }
        Ok(())
    }
}

/// Values are written with the first member schema they match.
#[derive(Debug)]
struct UnionLayout {
    schema: Schema,
    members: Vec<(Schema, Arc<dyn BasicSerializer>)>,
}

impl UnionLayout {
    fn member(&self, input: &mut dyn Read) -> CodecResult<(usize, &Arc<dyn BasicSerializer>)> {
        let index = read_len(input)?;
        match self.members.get(index) {
            Some((_, serializer)) => Ok((index, serializer)),
            None => Err(CodecError::Malformed(format!(
                "union member {index} out of range for {} members",
                self.members.len()
            ))),
        }
    }
}

impl BasicSerializer for UnionLayout {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let (_, serializer) = self.member(input)?;
        serializer.read(input)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Some((index, (_, serializer))) = self
            .members
            .iter()
            .enumerate()
            .find(|(_, (schema, _))| schema.matches(value))
        else {
            return Err(CodecError::mismatch(self.schema.to_string(), value.to_string()));
        };
        write_vulong(out, index as u64)?;
        serializer.write(out, value)
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        let (_, serializer) = self.member(input)?;
        serializer.skip(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let (index_a, serializer_a) = self.member(a)?;
        let (index_b, serializer_b) = self.member(b)?;
        if index_a == index_b {
            return serializer_a.compare(a, b);
        }
        trace!(index_a, index_b, "cross-member comparison");
        let va = serializer_a.read(a)?;
        let vb = serializer_b.read(b)?;
        Ok(va.try_cmp(&vb)?)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let (index, serializer) = self.member(input)?;
        write_vulong(out, index as u64)?;
        serializer.copy(input, out)
    }
}
