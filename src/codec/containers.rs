//! Payload serializers for the generic container encodings.
//!
//! Children are written tagged through the generic codec, reached through a
//! [`CodecHandle`].
//!
//! | encoding      | payload                                                   |
//! |---------------|-----------------------------------------------------------|
//! | fixed array   | `count, value*`                                           |
//! | spilled array | `count, byte length, value*`                              |
//! | record        | `count, (name, value)*` sorted by name                    |
//! | function      | `source, count, (name, value)*` sorted by name            |
//! | schema        | the schema's description record, generic-encoded         |

use std::cmp::Ordering;
use std::io::{Read, Write};
use std::sync::Arc;

use super::atoms::{mismatch, read_name, read_raw, write_name};
use super::generic::CodecHandle;
use super::stream::{compare_bytes, copy_bytes, copy_exact, skip_bytes, skip_exact};
use super::varint::{read_len, write_vulong};
use super::{BasicSerializer, FullSerializer};
use crate::error::{CodecError, CodecResult};
use crate::schema::Schema;
use crate::value::{ArrayValue, FunctionValue, LogicalType, RecordValue, SpilledArray, Value};

fn write_len(out: &mut dyn Write, len: usize) -> CodecResult<()> {
    write_vulong(out, len as u64)
}

/// Reads `count` `(name, value)` pairs, rejecting names that are not
/// strictly increasing.
fn read_sorted_fields(
    input: &mut dyn Read,
    codec: &dyn FullSerializer,
    count: usize,
) -> CodecResult<Vec<(Arc<str>, Value)>> {
    let mut fields: Vec<(Arc<str>, Value)> = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let name = read_name(input)?;
        if let Some((prev, _)) = fields.last() {
            if prev.as_bytes() >= name.as_bytes() {
                return Err(CodecError::Malformed(format!(
                    "field {name:?} out of order after {prev:?}"
                )));
            }
        }
        let value = codec.read(input)?;
        fields.push((name, value));
    }
    Ok(fields)
}

fn write_fields<'a>(
    out: &mut dyn Write,
    codec: &dyn FullSerializer,
    fields: impl ExactSizeIterator<Item = (&'a str, &'a Value)>,
) -> CodecResult<()> {
    write_len(out, fields.len())?;
    for (name, value) in fields {
        write_name(out, name)?;
        codec.write(out, value)?;
    }
    Ok(())
}

fn skip_fields(input: &mut dyn Read, codec: &dyn FullSerializer) -> CodecResult<()> {
    let count = read_len(input)?;
    for _ in 0..count {
        skip_bytes(input)?;
        codec.skip(input)?;
    }
    Ok(())
}

fn copy_fields(input: &mut dyn Read, out: &mut dyn Write, codec: &dyn FullSerializer) -> CodecResult<()> {
    let count = read_len(input)?;
    write_len(out, count)?;
    for _ in 0..count {
        copy_bytes(input, out)?;
        codec.copy(input, out)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct FixedArraySerializer {
    codec: CodecHandle,
}

impl FixedArraySerializer {
    pub(crate) fn new(codec: CodecHandle) -> Self {
        FixedArraySerializer { codec }
    }
}

impl BasicSerializer for FixedArraySerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let codec = self.codec.codec()?;
        let count = read_len(input)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(codec.read(input)?);
        }
        Ok(Value::Array(ArrayValue::new(items)))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Array(array) = value else {
            return Err(mismatch(LogicalType::Array, value));
        };
        let codec = self.codec.codec()?;
        write_len(out, array.len())?;
        for item in array.iter() {
            codec.write(out, &item)?;
        }
        Ok(())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        let codec = self.codec.codec()?;
        let count = read_len(input)?;
        for _ in 0..count {
            codec.skip(input)?;
        }
        Ok(())
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let codec = self.codec.codec()?;
        let count_a = read_len(a)?;
        let count_b = read_len(b)?;
        for _ in 0..count_a.min(count_b) {
            let ord = codec.compare(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(count_a.cmp(&count_b))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let codec = self.codec.codec()?;
        let count = read_len(input)?;
        write_len(out, count)?;
        for _ in 0..count {
            codec.copy(input, out)?;
        }
        Ok(())
    }
}

/// Spilled arrays carry their byte length so they can be skipped and copied
/// without walking the elements.
#[derive(Debug)]
pub struct SpilledArraySerializer {
    codec: CodecHandle,
}

impl SpilledArraySerializer {
    pub(crate) fn new(codec: CodecHandle) -> Self {
        SpilledArraySerializer { codec }
    }
}

impl BasicSerializer for SpilledArraySerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let count = read_len(input)?;
        let len = read_len(input)?;
        let bytes = read_raw(input, len)?;
        let spilled = SpilledArray::from_encoded(self.codec.codec()?, count, bytes.into())?;
        Ok(Value::Array(ArrayValue::Spilled(Arc::new(spilled))))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Array(array) = value else {
            return Err(mismatch(LogicalType::Array, value));
        };
        if let ArrayValue::Spilled(spilled) = array {
            write_len(out, spilled.len())?;
            write_len(out, spilled.bytes().len())?;
            out.write_all(spilled.bytes())?;
            return Ok(());
        }
        let codec = self.codec.codec()?;
        let mut buf = Vec::new();
        for item in array.iter() {
            codec.write(&mut buf, &item)?;
        }
        write_len(out, array.len())?;
        write_len(out, buf.len())?;
        out.write_all(&buf)?;
        Ok(())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        read_len(input)?;
        let len = read_len(input)?;
        skip_exact(input, len)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let codec = self.codec.codec()?;
        let count_a = read_len(a)?;
        read_len(a)?;
        let count_b = read_len(b)?;
        read_len(b)?;
        for _ in 0..count_a.min(count_b) {
            let ord = codec.compare(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(count_a.cmp(&count_b))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let count = read_len(input)?;
        let len = read_len(input)?;
        write_len(out, count)?;
        write_len(out, len)?;
        copy_exact(input, out, len)
    }
}

#[derive(Debug)]
pub struct RecordSerializer {
    codec: CodecHandle,
}

impl RecordSerializer {
    pub(crate) fn new(codec: CodecHandle) -> Self {
        RecordSerializer { codec }
    }
}

impl BasicSerializer for RecordSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let codec = self.codec.codec()?;
        let count = read_len(input)?;
        let fields = read_sorted_fields(input, &codec, count)?;
        Ok(Value::Record(RecordValue::from_sorted(fields)))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Record(record) = value else {
            return Err(mismatch(LogicalType::Record, value));
        };
        write_fields(out, &self.codec.codec()?, record.iter())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_fields(input, &self.codec.codec()?)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let codec = self.codec.codec()?;
        let count_a = read_len(a)?;
        let count_b = read_len(b)?;
        for _ in 0..count_a.min(count_b) {
            let ord = compare_bytes(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            let ord = codec.compare(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(count_a.cmp(&count_b))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_fields(input, out, &self.codec.codec()?)
    }
}

#[derive(Debug)]
pub struct FunctionSerializer {
    codec: CodecHandle,
}

impl FunctionSerializer {
    pub(crate) fn new(codec: CodecHandle) -> Self {
        FunctionSerializer { codec }
    }
}

impl BasicSerializer for FunctionSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let codec = self.codec.codec()?;
        let source = read_name(input)?;
        let count = read_len(input)?;
        let captured = read_sorted_fields(input, &codec, count)?;
        Ok(Value::Function(FunctionValue::new(source, captured)?))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Function(function) = value else {
            return Err(mismatch(LogicalType::Function, value));
        };
        write_name(out, function.source())?;
        write_fields(
            out,
            &self.codec.codec()?,
            function.captured().iter().map(|(n, v)| (&**n, v)),
        )
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_bytes(input)?;
        skip_fields(input, &self.codec.codec()?)
    }

    fn compare(&self, _a: &mut dyn Read, _b: &mut dyn Read) -> CodecResult<Ordering> {
        Err(CodecError::NotComparable(LogicalType::Function))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_bytes(input, out)?;
        copy_fields(input, out, &self.codec.codec()?)
    }
}

/// Schemas travel as their description value.
#[derive(Debug)]
pub struct SchemaValueSerializer {
    codec: CodecHandle,
}

impl SchemaValueSerializer {
    pub(crate) fn new(codec: CodecHandle) -> Self {
        SchemaValueSerializer { codec }
    }
}

impl BasicSerializer for SchemaValueSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let description = self.codec.codec()?.read(input)?;
        Ok(Value::schema(Schema::from_value(&description)?))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        let Value::Schema(schema) = value else {
            return Err(mismatch(LogicalType::Schema, value));
        };
        self.codec.codec()?.write(out, &schema.to_value())
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.codec.codec()?.skip(input)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        self.codec.codec()?.copy(input, out)
    }
}
