//! Read index embedded in SFF files
//!
//! Roche instruments append an index block after the read records:
//!
//! ```text
//! ┌────────────────────────────┐
//! │ magic (u32) = 778921588    │
//! │ version = "1.00"           │
//! │ xml length (u32)           │
//! │ data length (u32)          │ 20 bytes per read
//! ├────────────────────────────┤
//! │ XML manifest               │
//! ├────────────────────────────┤
//! │ name [14] | 0 | d3 d2 d1 d0 | 0xFF │  one entry per read, sorted by name
//! ├────────────────────────────┤
//! │ zero padding               │
//! └────────────────────────────┘
//! ```
//!
//! The record offset in each entry is written with four base-255 digits (not base-256),
//! most significant first. Files without a usable index are indexed by walking every
//! read header with [`SlowScan`]; [`sff_entries`] picks between the two.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::header::SffHeader;
use super::read::ReadHeader;
use crate::cursor::{padding_to_8, read_zero_padding, write_zero_padding};
use crate::error::{ReadError, Result, RocheIndexError, WriteError};
use crate::events::{IndexEvent, IndexObserver};

/// Magic number of the index block: ".mft" in ASCII (big-endian)
#[allow(clippy::unreadable_literal)]
pub const INDEX_MAGIC: u32 = 778921588;

/// Version of the index block
pub const INDEX_VERSION: [u8; 4] = *b"1.00";

/// Size of the index block header in bytes
pub const SIZE_INDEX_HEADER: usize = 16;

/// Size of a single index entry in bytes
pub const SIZE_INDEX_ENTRY: usize = 20;

/// Read names stored in the index have this exact length
pub const INDEX_NAME_LENGTH: usize = 14;

/// Last byte of every index entry
const ENTRY_SENTINEL: u8 = 255;

/// Largest offset representable with four base-255 digits (255^4 - 1)
pub const MAX_INDEX_OFFSET: u64 = 255 * 255 * 255 * 255 - 1;

/// Splits an offset into the four base-255 digits stored on disk
///
/// Digits are returned most significant first, in file order. Returns `None` if the
/// offset exceeds [`MAX_INDEX_OFFSET`].
#[must_use]
pub fn encode_offset(offset: u64) -> Option<[u8; 4]> {
    if offset > MAX_INDEX_OFFSET {
        return None;
    }
    let d0 = offset % 255;
    let d1 = (offset / 255) % 255;
    let d2 = (offset / 65_025) % 255;
    let d3 = offset / 16_581_375;
    Some([d3 as u8, d2 as u8, d1 as u8, d0 as u8])
}

/// Combines the four on-disk base-255 digits (most significant first) into an offset
#[must_use]
pub fn decode_offset(digits: [u8; 4]) -> u64 {
    let [d3, d2, d1, d0] = digits.map(u64::from);
    d0 + 255 * d1 + 65_025 * d2 + 16_581_375 * d3
}

/// Header of the Roche index block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RocheIndexHeader {
    /// Length of the XML manifest in bytes
    pub xml_length: u32,
    /// Length of the read index in bytes (20 per read)
    pub data_length: u32,
}
impl RocheIndexHeader {
    /// Total unpadded block length described by this header
    #[must_use]
    pub fn block_length(&self) -> u64 {
        SIZE_INDEX_HEADER as u64 + u64::from(self.xml_length) + u64::from(self.data_length)
    }

    fn from_reader<R: Read>(reader: &mut R) -> std::result::Result<Self, RocheIndexError> {
        let mut buffer = [0u8; SIZE_INDEX_HEADER];
        read_block(reader, &mut buffer)?;
        let magic = BigEndian::read_u32(&buffer[0..4]);
        if magic != INDEX_MAGIC {
            return Err(RocheIndexError::InvalidMagicNumber(magic));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&buffer[4..8]);
        if version != INDEX_VERSION {
            return Err(RocheIndexError::InvalidVersion(version));
        }
        Ok(Self {
            xml_length: BigEndian::read_u32(&buffer[8..12]),
            data_length: BigEndian::read_u32(&buffer[12..16]),
        })
    }

    fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(INDEX_MAGIC)?;
        writer.write_all(&INDEX_VERSION)?;
        writer.write_u32::<BigEndian>(self.xml_length)?;
        writer.write_u32::<BigEndian>(self.data_length)?;
        Ok(())
    }
}

fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::result::Result<(), RocheIndexError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            RocheIndexError::Truncated
        } else {
            RocheIndexError::Io(e)
        }
    })
}

/// Seeks to the index block, validates its header against the global header and
/// leaves the reader at the start of the XML manifest.
pub fn locate_roche_index<R: Read + Seek>(
    reader: &mut R,
    header: &SffHeader,
) -> std::result::Result<RocheIndexHeader, RocheIndexError> {
    if !header.has_index() {
        return Err(RocheIndexError::Missing);
    }
    reader.seek(SeekFrom::Start(header.index_offset))?;
    let index_header = RocheIndexHeader::from_reader(reader)?;

    let computed = index_header.block_length();
    if computed != u64::from(header.index_length) {
        return Err(RocheIndexError::LengthMismatch {
            declared: header.index_length,
            computed,
        });
    }
    let expected = SIZE_INDEX_ENTRY as u64 * u64::from(header.number_of_reads);
    if u64::from(index_header.data_length) != expected {
        return Err(RocheIndexError::DataLengthMismatch {
            expected,
            got: index_header.data_length,
        });
    }
    Ok(index_header)
}

/// Reads the XML manifest stored in the index block
pub fn read_index_xml<R: Read + Seek>(
    reader: &mut R,
    header: &SffHeader,
) -> std::result::Result<Vec<u8>, RocheIndexError> {
    let index_header = locate_roche_index(reader, header)?;
    let mut xml = vec![0u8; index_header.xml_length as usize];
    read_block(reader, &mut xml)?;
    Ok(xml)
}

/// Reads every (name, offset) entry of the embedded index
///
/// All entries are validated before anything is returned, so a corrupt block never
/// leaks a partial index to the caller.
pub fn try_read_index<R: Read + Seek>(
    reader: &mut R,
    header: &SffHeader,
) -> std::result::Result<Vec<(String, u64)>, RocheIndexError> {
    let index_header = locate_roche_index(reader, header)?;
    reader.seek(SeekFrom::Current(i64::from(index_header.xml_length)))?;

    let region = u64::from(header.header_length)..header.index_offset;
    let mut entries = Vec::with_capacity(header.number_of_reads as usize);
    let mut buffer = [0u8; SIZE_INDEX_ENTRY];
    for entry in 0..header.number_of_reads {
        read_block(reader, &mut buffer)?;
        if buffer[INDEX_NAME_LENGTH] != 0 || buffer[SIZE_INDEX_ENTRY - 1] != ENTRY_SENTINEL {
            return Err(RocheIndexError::MalformedEntry(entry));
        }
        let mut digits = [0u8; 4];
        digits.copy_from_slice(&buffer[INDEX_NAME_LENGTH + 1..SIZE_INDEX_ENTRY - 1]);
        let offset = decode_offset(digits);
        if !region.contains(&offset) {
            return Err(RocheIndexError::OffsetOutOfRange { entry, offset });
        }
        let name = buffer[..INDEX_NAME_LENGTH]
            .split(|&b| b == 0)
            .next()
            .unwrap_or_default();
        let Ok(name) = std::str::from_utf8(name) else {
            return Err(RocheIndexError::InvalidName(entry));
        };
        entries.push((name.to_string(), offset));
    }
    Ok(entries)
}

/// Writes an index block at the current position of the writer
///
/// Entries are sorted by name before being written. Returns the block length
/// excluding the trailing padding, which is the value the global header records.
///
/// # Errors
///
/// Returns an error if a name is not 14 bytes long or an offset cannot be written
/// with four base-255 digits. Nothing is written in that case.
pub fn write_index<W: Write>(writer: &mut W, entries: &mut [(String, u64)], xml: &[u8]) -> Result<u32> {
    entries.sort();
    let mut encoded = Vec::with_capacity(entries.len());
    for (name, offset) in entries.iter() {
        if name.len() != INDEX_NAME_LENGTH {
            return Err(WriteError::InvalidIndexName(name.clone()).into());
        }
        let digits = encode_offset(*offset).ok_or(WriteError::OffsetOutOfRange(*offset))?;
        encoded.push((name.as_bytes(), digits));
    }

    let oversized = || WriteError::RecordTooLarge("index block".to_string());
    let index_header = RocheIndexHeader {
        xml_length: u32::try_from(xml.len()).map_err(|_| oversized())?,
        data_length: u32::try_from(entries.len() * SIZE_INDEX_ENTRY).map_err(|_| oversized())?,
    };
    let index_length = u32::try_from(index_header.block_length()).map_err(|_| oversized())?;

    index_header.write_bytes(writer)?;
    writer.write_all(xml)?;
    for (name, digits) in encoded {
        writer.write_all(name)?;
        writer.write_u8(0)?;
        writer.write_all(&digits)?;
        writer.write_u8(ENTRY_SENTINEL)?;
    }
    write_zero_padding(writer, padding_to_8(index_length as usize))?;
    Ok(index_length)
}

/// Indexes an SFF file by walking every read record
///
/// Only the read header is parsed; the flowgram, bases and qualities are skipped with
/// a relative seek, so the cost per record does not depend on its length.
pub struct SlowScan<'a, R> {
    reader: &'a mut R,
    flows_per_read: usize,
    /// Offset of the next record
    position: u64,
    stream_len: u64,
    found: u32,
    expected: u32,
}
impl<'a, R: Read + Seek> SlowScan<'a, R> {
    /// Positions the reader at the first record
    pub fn new(reader: &'a mut R, header: &SffHeader) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        let position = reader.seek(SeekFrom::Start(u64::from(header.header_length)))?;
        Ok(Self {
            reader,
            flows_per_read: header.flows_per_read(),
            position,
            stream_len,
            found: 0,
            expected: header.number_of_reads,
        })
    }

    fn next_entry(&mut self) -> Result<(String, u64)> {
        let record_offset = self.position;
        if record_offset >= self.stream_len {
            return Err(ReadError::RecordCountMismatch {
                found: self.found,
                expected: self.expected,
            }
            .into());
        }
        let read_header = ReadHeader::from_reader(self.reader)?;
        let payload = read_header.payload_length(self.flows_per_read);
        let data_start = record_offset + u64::from(read_header.read_header_length);
        if data_start + payload as u64 > self.stream_len {
            return Err(ReadError::UnexpectedEof {
                context: "read data",
                expected: payload,
            }
            .into());
        }
        self.reader.seek(SeekFrom::Current(payload as i64))?;
        let padding = padding_to_8(payload);
        read_zero_padding(self.reader, padding, "Post quality")?;

        self.position = data_start + (payload + padding) as u64;
        self.found += 1;
        Ok((read_header.name, record_offset))
    }
}
impl<R: Read + Seek> Iterator for SlowScan<'_, R> {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.found >= self.expected {
            return None;
        }
        let entry = self.next_entry();
        if entry.is_err() {
            // stop after the first failure
            self.expected = self.found;
        }
        Some(entry)
    }
}

/// (name, offset) pairs for every read of an SFF file
pub enum SffEntries<'a, R> {
    /// Entries taken from the embedded index
    Index(std::vec::IntoIter<(String, u64)>),
    /// Entries found by walking the records
    Scan(SlowScan<'a, R>),
}
impl<R: Read + Seek> Iterator for SffEntries<'_, R> {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Index(entries) => entries.next().map(Ok),
            Self::Scan(scan) => scan.next(),
        }
    }
}

/// Returns the index entries of an SFF file, preferring the embedded index
///
/// When the file has no index, or the index fails validation, the observer is told
/// why and every record is scanned instead. Only one fallback is attempted: errors
/// during the scan are returned to the caller.
pub fn sff_entries<'a, R: Read + Seek>(
    reader: &'a mut R,
    header: &SffHeader,
    observer: &mut dyn IndexObserver,
) -> Result<SffEntries<'a, R>> {
    if header.has_index() {
        match try_read_index(reader, header) {
            Ok(entries) => return Ok(SffEntries::Index(entries.into_iter())),
            Err(e) => observer.on_event(&IndexEvent::SffIndexRejected {
                reason: e.to_string(),
            }),
        }
    } else {
        observer.on_event(&IndexEvent::MissingSffIndex);
    }
    Ok(SffEntries::Scan(SlowScan::new(reader, header)?))
}
