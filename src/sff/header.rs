//! Global header of an SFF file
//!
//! The header opens every SFF file and describes the flow chemistry shared by all reads
//! (flow order and key sequence), the number of reads, and the location of the optional
//! index block. It is variable length (the flow chars and key sequence are stored inline)
//! and zero padded to a multiple of 8 bytes.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::cursor::{padding_to_8, read_exact_or_eof, read_vec, read_zero_padding, round_up_8, write_zero_padding};
use crate::error::{HeaderError, Result};

/// SFF magic number: ".sff" in ASCII (big-endian)
#[allow(clippy::unreadable_literal)]
pub const MAGIC: u32 = 779314790;

/// The only SFF version in use
pub const VERSION: [u8; 4] = [0, 0, 0, 1];

/// Flowgram format code for u16 flow values (the only one defined)
pub const FLOWGRAM_FORMAT: u8 = 1;

/// Size of the fixed part of the header in bytes
///
/// magic (4) + version (4) + index offset (8) + index length (4) + number of reads (4)
/// + header length (2) + key length (2) + flows per read (2) + flowgram format (1)
pub const SIZE_FIXED_HEADER: usize = 31;

/// Global header structure for SFF files
///
/// The header is read once when a file is opened and is held immutably afterwards.
/// Writers emit it twice: a placeholder before the reads, then a patched copy once the
/// read count and index location are known. The header length only depends on the flow
/// chars and key sequence, so both passes occupy exactly the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SffHeader {
    /// Absolute file offset of the index block, 0 if absent
    ///
    /// 8 bytes
    pub index_offset: u64,

    /// Length of the index block (excluding trailing padding), 0 if absent
    ///
    /// 4 bytes
    pub index_length: u32,

    /// Number of read records following the header
    ///
    /// 4 bytes
    pub number_of_reads: u32,

    /// Total header length including padding (multiple of 8)
    ///
    /// 2 bytes
    pub header_length: u16,

    /// Nucleotide flowed at each cycle, one per flow
    ///
    /// `flows_per_read` bytes
    pub flow_chars: Vec<u8>,

    /// Key sequence prefixed to every read
    ///
    /// `key_length` bytes
    pub key_sequence: Vec<u8>,
}
impl SffHeader {
    /// Creates a header for the given flow chemistry with no reads and no index
    ///
    /// # Errors
    ///
    /// Returns an error if the flow chars or key sequence do not fit in the u16
    /// length fields.
    pub fn new(flow_chars: Vec<u8>, key_sequence: Vec<u8>) -> Result<Self> {
        let header_length = Self::expected_length(flow_chars.len(), key_sequence.len());
        let Ok(header_length) = u16::try_from(header_length) else {
            return Err(HeaderError::FieldTooLong {
                flows: flow_chars.len(),
                key: key_sequence.len(),
            }
            .into());
        };
        Ok(Self {
            index_offset: 0,
            index_length: 0,
            number_of_reads: 0,
            header_length,
            flow_chars,
            key_sequence,
        })
    }

    /// Padded header length for the given flow and key lengths
    #[must_use]
    pub fn expected_length(flows_per_read: usize, key_length: usize) -> usize {
        round_up_8(SIZE_FIXED_HEADER + flows_per_read + key_length)
    }

    /// Number of flows recorded for every read
    #[must_use]
    pub fn flows_per_read(&self) -> usize {
        self.flow_chars.len()
    }

    /// Whether the header points at an index block
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.index_offset != 0 && self.index_length != 0
    }

    /// Reads and validates a header, leaving the reader at the first read record
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The magic number or version is wrong
    /// * The flowgram format code is not 1
    /// * Only one of index offset / index length is set
    /// * The header length is not a multiple of 8 or disagrees with the flow/key lengths
    /// * The padding contains data
    /// * The stream ends early
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_FIXED_HEADER];
        read_exact_or_eof(reader, &mut buffer, "SFF header")?;

        let magic = BigEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&buffer[4..8]);
        if version != VERSION {
            return Err(HeaderError::InvalidFormatVersion(version).into());
        }
        let index_offset = BigEndian::read_u64(&buffer[8..16]);
        let index_length = BigEndian::read_u32(&buffer[16..20]);
        let number_of_reads = BigEndian::read_u32(&buffer[20..24]);
        let header_length = BigEndian::read_u16(&buffer[24..26]);
        let key_length = BigEndian::read_u16(&buffer[26..28]) as usize;
        let flows_per_read = BigEndian::read_u16(&buffer[28..30]) as usize;
        let flowgram_format = buffer[30];

        if flowgram_format != FLOWGRAM_FORMAT {
            return Err(HeaderError::InvalidFlowgramFormat(flowgram_format).into());
        }
        if (index_offset != 0) ^ (index_length != 0) {
            return Err(HeaderError::InconsistentIndexFields {
                offset: index_offset,
                length: index_length,
            }
            .into());
        }
        let expected = Self::expected_length(flows_per_read, key_length);
        if header_length % 8 != 0 || header_length as usize != expected {
            return Err(HeaderError::InvalidHeaderLength {
                declared: header_length,
                expected,
            }
            .into());
        }

        let flow_chars = read_vec(reader, flows_per_read, "SFF flow chars")?;
        let key_sequence = read_vec(reader, key_length, "SFF key sequence")?;
        read_zero_padding(
            reader,
            expected - SIZE_FIXED_HEADER - flows_per_read - key_length,
            "Post header",
        )?;

        Ok(Self {
            index_offset,
            index_length,
            number_of_reads,
            header_length,
            flow_chars,
            key_sequence,
        })
    }

    /// Writes the header and its padding
    ///
    /// Returns the number of bytes written, always equal to `header_length`.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let unpadded = SIZE_FIXED_HEADER + self.flow_chars.len() + self.key_sequence.len();
        let padding = padding_to_8(unpadded);
        debug_assert_eq!(unpadded + padding, self.header_length as usize);

        writer.write_u32::<BigEndian>(MAGIC)?;
        writer.write_all(&VERSION)?;
        writer.write_u64::<BigEndian>(self.index_offset)?;
        writer.write_u32::<BigEndian>(self.index_length)?;
        writer.write_u32::<BigEndian>(self.number_of_reads)?;
        writer.write_u16::<BigEndian>(self.header_length)?;
        writer.write_u16::<BigEndian>(self.key_sequence.len() as u16)?;
        writer.write_u16::<BigEndian>(self.flow_chars.len() as u16)?;
        writer.write_u8(FLOWGRAM_FORMAT)?;
        writer.write_all(&self.flow_chars)?;
        writer.write_all(&self.key_sequence)?;
        write_zero_padding(writer, padding)?;
        Ok(unpadded + padding)
    }
}
