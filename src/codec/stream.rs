//! Byte-level helpers shared by the serializers.

use std::cmp::Ordering;
use std::io::{self, Read, Write};
use std::sync::Arc;

use super::varint::{read_len, write_vulong};
use crate::error::{CodecError, CodecResult};

/// Chunk size for streaming comparisons and copies.
const CHUNK: usize = 256;

/// Reads exactly `len` bytes without trusting `len` for the allocation size.
pub fn read_exact_vec(input: &mut dyn Read, len: usize) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(64 * 1024));
    let got = (&mut *input).take(len as u64).read_to_end(&mut buf)?;
    if got != len {
        return Err(CodecError::Truncated);
    }
    Ok(buf)
}

pub fn write_bytes(out: &mut dyn Write, bytes: &[u8]) -> CodecResult<()> {
    write_vulong(out, bytes.len() as u64)?;
    out.write_all(bytes)?;
    Ok(())
}

pub fn read_bytes(input: &mut dyn Read) -> CodecResult<Arc<[u8]>> {
    let len = read_len(input)?;
    Ok(read_exact_vec(input, len)?.into())
}

pub fn read_str(input: &mut dyn Read) -> CodecResult<Arc<str>> {
    let len = read_len(input)?;
    read_utf8(input, len)
}

pub fn read_utf8(input: &mut dyn Read, len: usize) -> CodecResult<Arc<str>> {
    let bytes = read_exact_vec(input, len)?;
    String::from_utf8(bytes)
        .map(Arc::from)
        .map_err(|e| CodecError::Malformed(format!("invalid UTF-8 in string: {e}")))
}

pub fn skip_exact(input: &mut dyn Read, len: usize) -> CodecResult<()> {
    let skipped = io::copy(&mut (&mut *input).take(len as u64), &mut io::sink())?;
    if skipped != len as u64 {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

/// Skips a length-prefixed byte run.
pub fn skip_bytes(input: &mut dyn Read) -> CodecResult<()> {
    let len = read_len(input)?;
    skip_exact(input, len)
}

pub fn copy_exact(input: &mut dyn Read, out: &mut dyn Write, len: usize) -> CodecResult<()> {
    let copied = io::copy(&mut (&mut *input).take(len as u64), out)?;
    if copied != len as u64 {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

/// Re-emits a length-prefixed byte run unchanged.
pub fn copy_bytes(input: &mut dyn Read, out: &mut dyn Write) -> CodecResult<()> {
    let len = read_len(input)?;
    write_vulong(out, len as u64)?;
    copy_exact(input, out, len)
}

/// Compares the next `len_a` bytes of `a` with the next `len_b` bytes of `b`
/// lexicographically, then by length. Uses stack buffers only.
///
/// When the result is `Equal` both streams are positioned after their runs.
pub fn compare_exact(
    a: &mut dyn Read,
    len_a: usize,
    b: &mut dyn Read,
    len_b: usize,
) -> CodecResult<Ordering> {
    let mut buf_a = [0u8; CHUNK];
    let mut buf_b = [0u8; CHUNK];
    let common = len_a.min(len_b);
    let mut done = 0;
    while done < common {
        let n = (common - done).min(CHUNK);
        a.read_exact(&mut buf_a[..n])?;
        b.read_exact(&mut buf_b[..n])?;
        match buf_a[..n].cmp(&buf_b[..n]) {
            Ordering::Equal => done += n,
            other => return Ok(other),
        }
    }
    Ok(len_a.cmp(&len_b))
}

/// Compares two length-prefixed byte runs.
pub fn compare_bytes(a: &mut dyn Read, b: &mut dyn Read) -> CodecResult<Ordering> {
    let len_a = read_len(a)?;
    let len_b = read_len(b)?;
    compare_exact(a, len_a, b, len_b)
}

/// A reader that keeps a copy of every byte it hands out.
///
/// Used by lazy decoding: the value is validated with `skip` while its exact
/// bytes are captured for later materialisation.
pub struct RecordingReader<'a> {
    inner: &'a mut dyn Read,
    captured: Vec<u8>,
}

impl<'a> RecordingReader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        RecordingReader {
            inner,
            captured: Vec::new(),
        }
    }

    /// Bytes captured so far.
    pub fn position(&self) -> usize {
        self.captured.len()
    }

    pub fn into_bytes(self) -> Arc<[u8]> {
        self.captured.into()
    }
}

impl Read for RecordingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.captured.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}
