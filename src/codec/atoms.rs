//! Payload serializers for the non-recursive value kinds.
//!
//! These are shared by the generic codec and by schema-specialized codecs:
//! a position whose schema pins an atom type uses the same payload as the
//! generic format, minus the tag.

use std::cmp::Ordering;
use std::io::{Read, Write};
use std::sync::Arc;

use rust_decimal::Decimal;

use super::stream::{
    compare_bytes, compare_exact, copy_bytes, copy_exact, read_bytes, read_exact_vec, read_str,
    read_utf8, skip_bytes, skip_exact, write_bytes,
};
use super::varint::{read_vslong, write_vslong};
use super::BasicSerializer;
use crate::error::{CodecError, CodecResult};
use crate::value::{JavaObjectValue, LogicalType, RegexValue, SpanValue, Value};

pub(crate) fn mismatch(expected: LogicalType, found: &Value) -> CodecError {
    CodecError::mismatch(expected.name(), found.logical_type().name())
}

fn read_array<const N: usize>(input: &mut dyn Read) -> CodecResult<[u8; N]> {
    let mut buf = [0u8; N];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

#[derive(Debug, Default)]
pub struct NullSerializer;

impl BasicSerializer for NullSerializer {
    fn read(&self, _input: &mut dyn Read) -> CodecResult<Value> {
        Ok(Value::Null)
    }

    fn write(&self, _out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch(LogicalType::Null, other)),
        }
    }

    fn skip(&self, _input: &mut dyn Read) -> CodecResult<()> {
        Ok(())
    }

    fn compare(&self, _a: &mut dyn Read, _b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(Ordering::Equal)
    }

    fn copy(&self, _input: &mut dyn Read, _out: &mut dyn Write) -> CodecResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BooleanSerializer;

impl BooleanSerializer {
    fn read_bool(input: &mut dyn Read) -> CodecResult<bool> {
        match read_array::<1>(input)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::Malformed(format!("invalid boolean byte {other:#04x}"))),
        }
    }
}

impl BasicSerializer for BooleanSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        Self::read_bool(input).map(Value::Boolean)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Boolean(b) => Ok(out.write_all(&[u8::from(*b)])?),
            other => Err(mismatch(LogicalType::Boolean, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_exact(input, 1)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(Self::read_bool(a)?.cmp(&Self::read_bool(b)?))
    }
}

/// Longs and dates share the signed varint payload.
#[derive(Debug)]
pub struct VarLongSerializer {
    kind: LogicalType,
}

impl VarLongSerializer {
    pub fn long() -> Self {
        VarLongSerializer {
            kind: LogicalType::Long,
        }
    }

    pub fn date() -> Self {
        VarLongSerializer {
            kind: LogicalType::Date,
        }
    }
}

impl BasicSerializer for VarLongSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let v = read_vslong(input)?;
        Ok(if self.kind == LogicalType::Date {
            Value::Date(v)
        } else {
            Value::Long(v)
        })
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match (self.kind, value) {
            (LogicalType::Long, Value::Long(v)) | (LogicalType::Date, Value::Date(v)) => {
                write_vslong(out, *v)
            }
            (kind, other) => Err(mismatch(kind, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        read_vslong(input).map(drop)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(read_vslong(a)?.cmp(&read_vslong(b)?))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        write_vslong(out, read_vslong(input)?)
    }
}

/// IEEE 754 bits, big-endian.
#[derive(Debug, Default)]
pub struct DoubleSerializer;

impl DoubleSerializer {
    fn read_f64(input: &mut dyn Read) -> CodecResult<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(read_array::<8>(input)?)))
    }
}

impl BasicSerializer for DoubleSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        Self::read_f64(input).map(Value::Double)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Double(v) => Ok(out.write_all(&v.to_bits().to_be_bytes())?),
            other => Err(mismatch(LogicalType::Double, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_exact(input, 8)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(Self::read_f64(a)?.total_cmp(&Self::read_f64(b)?))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_exact(input, out, 8)
    }
}

/// The 16-byte serialized form of the decimal: sign, scale and 96-bit
/// mantissa, bit-exact.
#[derive(Debug, Default)]
pub struct DecimalSerializer;

impl DecimalSerializer {
    fn read_decimal(input: &mut dyn Read) -> CodecResult<Decimal> {
        let bytes = read_array::<16>(input)?;
        // Scale lives in bits 16..24 of the flags word and must not exceed 28
        if bytes[2] > 28 {
            return Err(CodecError::Malformed(format!("decimal scale {} out of range", bytes[2])));
        }
        Ok(Decimal::deserialize(bytes))
    }
}

impl BasicSerializer for DecimalSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        Self::read_decimal(input).map(Value::Decimal)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Decimal(d) => Ok(out.write_all(&d.serialize())?),
            other => Err(mismatch(LogicalType::Decfloat, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_exact(input, 16)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(Self::read_decimal(a)?.cmp(&Self::read_decimal(b)?))
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_exact(input, out, 16)
    }
}

/// Length-prefixed UTF-8.
#[derive(Debug, Default)]
pub struct StringSerializer;

impl BasicSerializer for StringSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        read_str(input).map(Value::String)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) => write_bytes(out, s.as_bytes()),
            other => Err(mismatch(LogicalType::String, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_bytes(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        compare_bytes(a, b)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_bytes(input, out)
    }
}

/// Strings whose schema fixes the byte length: no length prefix.
#[derive(Debug)]
pub struct FixedStringSerializer {
    len: usize,
}

impl FixedStringSerializer {
    pub fn new(len: usize) -> Self {
        FixedStringSerializer { len }
    }
}

impl BasicSerializer for FixedStringSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        read_utf8(input, self.len).map(Value::String)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) if s.len() == self.len => Ok(out.write_all(s.as_bytes())?),
            Value::String(s) => Err(CodecError::mismatch(
                format!("string of {} bytes", self.len),
                format!("string of {} bytes", s.len()),
            )),
            other => Err(mismatch(LogicalType::String, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_exact(input, self.len)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        compare_exact(a, self.len, b, self.len)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_exact(input, out, self.len)
    }
}

/// Length-prefixed bytes.
#[derive(Debug, Default)]
pub struct BinarySerializer;

impl BasicSerializer for BinarySerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        read_bytes(input).map(Value::Binary)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Binary(b) => write_bytes(out, b),
            other => Err(mismatch(LogicalType::Binary, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_bytes(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        compare_bytes(a, b)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_bytes(input, out)
    }
}

/// Pattern text then flag text.
#[derive(Debug, Default)]
pub struct RegexSerializer;

impl BasicSerializer for RegexSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let pattern = read_str(input)?;
        let flags = read_str(input)?;
        Ok(Value::Regex(RegexValue::new(&pattern, &flags)?))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Regex(r) => {
                write_bytes(out, r.pattern().as_bytes())?;
                write_bytes(out, r.flags().as_bytes())
            }
            other => Err(mismatch(LogicalType::Regex, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_bytes(input)?;
        skip_bytes(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        match compare_bytes(a, b)? {
            Ordering::Equal => compare_bytes(a, b),
            other => Ok(other),
        }
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_bytes(input, out)?;
        copy_bytes(input, out)
    }
}

/// Two signed varints.
#[derive(Debug, Default)]
pub struct SpanSerializer;

impl BasicSerializer for SpanSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let begin = read_vslong(input)?;
        let end = read_vslong(input)?;
        Ok(Value::Span(SpanValue::new(begin, end)?))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::Span(span) => {
                write_vslong(out, span.begin())?;
                write_vslong(out, span.end())
            }
            other => Err(mismatch(LogicalType::Span, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        read_vslong(input)?;
        read_vslong(input).map(drop)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let first = read_vslong(a)?.cmp(&read_vslong(b)?);
        if first != Ordering::Equal {
            return Ok(first);
        }
        Ok(read_vslong(a)?.cmp(&read_vslong(b)?))
    }
}

/// Class name then the host payload.
#[derive(Debug, Default)]
pub struct JavaObjectSerializer;

impl BasicSerializer for JavaObjectSerializer {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        let class_name = read_str(input)?;
        let payload = read_bytes(input)?;
        Ok(Value::JavaObject(JavaObjectValue::new(class_name, payload)))
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        match value {
            Value::JavaObject(o) => {
                write_bytes(out, o.class_name().as_bytes())?;
                write_bytes(out, o.payload())
            }
            other => Err(mismatch(LogicalType::JavaObject, other)),
        }
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        skip_bytes(input)?;
        skip_bytes(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        match compare_bytes(a, b)? {
            Ordering::Equal => compare_bytes(a, b),
            other => Ok(other),
        }
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        copy_bytes(input, out)?;
        copy_bytes(input, out)
    }
}

/// A position whose schema admits exactly one value: nothing is written.
#[derive(Debug)]
pub struct ConstSerializer {
    value: Value,
}

impl ConstSerializer {
    pub fn new(value: Value) -> Self {
        ConstSerializer { value }
    }
}

impl BasicSerializer for ConstSerializer {
    fn read(&self, _input: &mut dyn Read) -> CodecResult<Value> {
        Ok(self.value.clone())
    }

    fn write(&self, _out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        if *value == self.value {
            Ok(())
        } else {
            Err(CodecError::mismatch(
                format!("constant {}", self.value),
                value.to_string(),
            ))
        }
    }

    fn skip(&self, _input: &mut dyn Read) -> CodecResult<()> {
        Ok(())
    }

    fn compare(&self, _a: &mut dyn Read, _b: &mut dyn Read) -> CodecResult<Ordering> {
        Ok(Ordering::Equal)
    }

    fn copy(&self, _input: &mut dyn Read, _out: &mut dyn Write) -> CodecResult<()> {
        Ok(())
    }
}

pub(crate) fn read_name(input: &mut dyn Read) -> CodecResult<Arc<str>> {
    read_str(input)
}

pub(crate) fn write_name(out: &mut dyn Write, name: &str) -> CodecResult<()> {
    write_bytes(out, name.as_bytes())
}

/// Reads `len` raw bytes; used by containers that carry byte counts.
pub(crate) fn read_raw(input: &mut dyn Read, len: usize) -> CodecResult<Vec<u8>> {
    read_exact_vec(input, len)
}
