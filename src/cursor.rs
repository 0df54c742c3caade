//! Big-endian helpers shared by the SFF codecs
//!
//! Every fixed-size field in an SFF file is read through [`read_exact_or_eof`] so a
//! truncated file surfaces as [`ReadError::UnexpectedEof`] rather than a bare I/O error,
//! and every padded region is checked or emitted through the padding helpers here.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{ReadError, Result};

/// All SFF sections are aligned to this many bytes
pub const ALIGNMENT: usize = 8;

/// Upper bound on the capacity reserved before reading a length-prefixed field
const MAX_PREALLOCATION: usize = 1 << 16;

/// Number of zero bytes needed to bring `len` up to a multiple of 8
#[must_use]
pub fn padding_to_8(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// Rounds `len` up to the next multiple of 8
#[must_use]
pub fn round_up_8(len: usize) -> usize {
    len + padding_to_8(len)
}

/// Fills `buf` from the reader, reporting a short read as a premature end of file
///
/// # Arguments
///
/// * `reader` - Source of the bytes
/// * `buf` - Destination, filled completely on success
/// * `context` - Name of the field being read, used in the error message
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8], context: &'static str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ReadError::UnexpectedEof {
            context,
            expected: buf.len(),
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// Reads exactly `len` bytes into a new buffer
///
/// `len` usually comes from the file itself, so the buffer grows with the bytes
/// actually read instead of being allocated up front.
pub fn read_vec<R: Read>(reader: &mut R, len: usize, context: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOCATION));
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ReadError::UnexpectedEof {
            context,
            expected: len,
        }
        .into());
    }
    Ok(buf)
}

/// Consumes `len` padding bytes, failing if any of them is non-zero
pub fn read_zero_padding<R: Read>(reader: &mut R, len: usize, context: &'static str) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let mut buf = [0u8; ALIGNMENT];
    let buf = &mut buf[..len.min(ALIGNMENT)];
    read_exact_or_eof(reader, buf, context)?;
    if buf.iter().any(|&b| b != 0) || len > ALIGNMENT {
        return Err(ReadError::NonZeroPadding { context, len }.into());
    }
    Ok(())
}

/// Writes `len` zero bytes
pub fn write_zero_padding<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    const ZEROS: [u8; ALIGNMENT] = [0; ALIGNMENT];
    debug_assert!(len < ALIGNMENT);
    writer.write_all(&ZEROS[..len])?;
    Ok(())
}

/// Reads `count` big-endian u16 values
pub fn read_u16_array<R: Read>(reader: &mut R, count: usize, context: &'static str) -> Result<Vec<u16>> {
    let bytes = read_vec(reader, count * 2, context)?;
    let mut values = vec![0u16; count];
    BigEndian::read_u16_into(&bytes, &mut values);
    Ok(values)
}

/// Writes every value as a big-endian u16
pub fn write_u16_array<W: Write>(writer: &mut W, values: &[u16]) -> Result<()> {
    values
        .iter()
        .try_for_each(|&v| writer.write_u16::<BigEndian>(v))?;
    Ok(())
}
