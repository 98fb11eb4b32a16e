//! # Codec Framework
//!
//! Binary encoders and decoders for [`Value`]s.
//!
//! ## Architecture
//!
//! ```text
//! FullSerializer                       (tag dispatch, entry point)
//! ├── GenericCodec                     one BasicSerializer per encoding id
//! │   ├── atoms: null, boolean, long, double, decimal, string, ...
//! │   └── containers: array, spilled array, record, function, schema
//! │       └── children go back through the GenericCodec
//! └── SchemaCodec                      built from a Schema
//!     └── per-position serializers, no tags where the schema pins the type
//!         └── LazyRecord / LazyArray for wide containers
//! ```
//!
//! A [`BasicSerializer`] handles the payload of exactly one encoding; a
//! [`FullSerializer`] handles complete values. Comparison runs on the
//! encoded bytes: same-encoding comparisons never decode, different
//! encodings of one logical type are decoded and compared as values.
//!
//! ## Stream positions
//!
//! Every operation leaves its stream positioned just after the value it
//! consumed, except `compare` when it returns a non-`Equal` result: the
//! positions are then unspecified and the caller must discard the streams.

pub mod atoms;
pub mod containers;
pub mod generic;
pub mod lazy;
pub mod specialized;
pub mod stream;
pub mod varint;

pub use generic::GenericCodec;
pub use lazy::{LazyArray, LazyRecord};
pub use specialized::{SchemaCodec, SchemaCodecFactory};

pub use crate::value::Encoding;

use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encoder/decoder for the payload of one encoding.
pub trait BasicSerializer: Send + Sync + fmt::Debug {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value>;

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()>;

    /// Advances past one value without materialising it.
    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.read(input).map(drop)
    }

    /// Advances past one value, rejecting everything `read` rejects.
    ///
    /// Unlike `skip`, this checks content too: UTF-8, regex syntax,
    /// decimal scale.
    fn validate(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.read(input).map(drop)
    }

    /// Compares two payloads of this encoding with the same result as
    /// comparing the decoded values.
    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        let va = self.read(a)?;
        let vb = self.read(b)?;
        Ok(va.try_cmp(&vb)?)
    }

    /// Re-emits one payload unchanged.
    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        let value = self.read(input)?;
        self.write(out, &value)
    }
}

/// Encoder/decoder for complete values.
pub trait FullSerializer: Send + Sync + fmt::Debug {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value>;

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()>;

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()>;

    /// Advances past one value, rejecting everything `read` rejects.
    fn validate(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.read(input).map(drop)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering>;

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()>;

    fn to_bytes(&self, value: &Value) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, value)?;
        Ok(out)
    }

    /// Decodes one value that must span all of `bytes`.
    fn from_bytes(&self, bytes: &[u8]) -> CodecResult<Value> {
        let mut rest = bytes;
        let value = self.read(&mut rest)?;
        if !rest.is_empty() {
            return Err(CodecError::Malformed(format!(
                "{} trailing bytes after value",
                rest.len()
            )));
        }
        Ok(value)
    }
}

/// Presents a full serializer as the payload serializer of an untyped
/// position: values keep their tags.
#[derive(Debug)]
pub struct TaggedSerializer<F> {
    inner: F,
}

impl<F: FullSerializer> TaggedSerializer<F> {
    pub fn new(inner: F) -> Self {
        TaggedSerializer { inner }
    }
}

impl<F: FullSerializer> BasicSerializer for TaggedSerializer<F> {
    fn read(&self, input: &mut dyn Read) -> CodecResult<Value> {
        self.inner.read(input)
    }

    fn write(&self, out: &mut dyn Write, value: &Value) -> CodecResult<()> {
        self.inner.write(out, value)
    }

    fn skip(&self, input: &mut dyn Read) -> CodecResult<()> {
        self.inner.skip(input)
    }

    fn compare(&self, a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
        self.inner.compare(a, b)
    }

    fn copy(&self, input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
        self.inner.copy(input, out)
    }
}
