//! SFF read records
//!
//! Each read record is laid out as:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ read header (16 bytes)       │ header length, name length, seq length, 4 clip fields
//! │ name + zero padding          │ padded so the header is a multiple of 8
//! ├──────────────────────────────┤
//! │ flow values  [u16; flows]    │
//! │ flow index   [u8; seq_len]   │
//! │ bases        [u8; seq_len]   │
//! │ quality      [u8; seq_len]   │
//! │ zero padding                 │ padded so the data is a multiple of 8
//! └──────────────────────────────┘
//! ```

use std::io::{Read, Write};
use std::ops::Range;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::cursor::{
    padding_to_8, read_exact_or_eof, read_u16_array, read_vec, read_zero_padding,
    write_u16_array, write_zero_padding,
};
use crate::error::{ReadError, Result, WriteError};

/// Size of the fixed part of a read header in bytes
pub const SIZE_READ_HEADER: usize = 16;

/// Fixed fields of a read record plus its name
///
/// This is everything needed to locate the next record without decoding the
/// flowgram, bases or qualities, so it is shared by the full decoder, the slow-scan
/// indexer and raw record extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadHeader {
    /// Length of the read header including name and padding
    pub read_header_length: u16,
    /// Number of bases (and qualities, and flow index entries)
    pub seq_len: u32,
    /// Left quality clip as stored on disk (1-based, 0 for none)
    pub clip_qual_left: u16,
    /// Right quality clip as stored on disk (0 for none)
    pub clip_qual_right: u16,
    /// Left adapter clip as stored on disk (1-based, 0 for none)
    pub clip_adapter_left: u16,
    /// Right adapter clip as stored on disk (0 for none)
    pub clip_adapter_right: u16,
    /// Read name
    pub name: String,
}
impl ReadHeader {
    /// Reads the read header, leaving the reader at the start of the flow values
    ///
    /// # Errors
    ///
    /// Returns an error if the declared header length is below 10, not a multiple of 8,
    /// or inconsistent with the name length, or if the name padding contains data.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_READ_HEADER];
        read_exact_or_eof(reader, &mut buffer, "read header")?;
        let read_header_length = BigEndian::read_u16(&buffer[0..2]);
        let name_length = BigEndian::read_u16(&buffer[2..4]) as usize;
        let seq_len = BigEndian::read_u32(&buffer[4..8]);

        if read_header_length < 10 || read_header_length % 8 != 0 {
            return Err(ReadError::InvalidReadHeaderLength(read_header_length).into());
        }
        let Some(padding) = (read_header_length as usize).checked_sub(SIZE_READ_HEADER + name_length)
        else {
            return Err(ReadError::InvalidReadHeaderLength(read_header_length).into());
        };
        if padding >= 8 {
            return Err(ReadError::InvalidReadHeaderLength(read_header_length).into());
        }

        let name = read_vec(reader, name_length, "read name")?;
        read_zero_padding(reader, padding, "Post name")?;

        Ok(Self {
            read_header_length,
            seq_len,
            clip_qual_left: BigEndian::read_u16(&buffer[8..10]),
            clip_qual_right: BigEndian::read_u16(&buffer[10..12]),
            clip_adapter_left: BigEndian::read_u16(&buffer[12..14]),
            clip_adapter_right: BigEndian::read_u16(&buffer[14..16]),
            name: String::from_utf8(name)?,
        })
    }

    /// Unpadded length of the data section (flows, flow index, bases, qualities)
    #[must_use]
    pub fn payload_length(&self, flows_per_read: usize) -> usize {
        2 * flows_per_read + 3 * self.seq_len as usize
    }

    /// Total length of the record on disk including both padding regions
    #[must_use]
    pub fn record_length(&self, flows_per_read: usize) -> usize {
        let payload = self.payload_length(flows_per_read);
        self.read_header_length as usize + payload + padding_to_8(payload)
    }
}

/// Flowgram and clipping metadata carried by an untrimmed read
///
/// Clip values are held 0-based: a left clip of 0 means "not clipped", a right clip
/// of 0 means "not clipped" (the window runs to the end of the read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowData {
    /// One flowgram value per flow (hundredths of a base)
    pub flow_values: Vec<u16>,
    /// Per-base flow index deltas
    pub flow_index: Vec<u8>,
    /// Flow order shared by the whole file
    pub flow_chars: Vec<u8>,
    /// Key sequence shared by the whole file
    pub key_sequence: Vec<u8>,
    pub clip_qual_left: u16,
    pub clip_qual_right: u16,
    pub clip_adapter_left: u16,
    pub clip_adapter_right: u16,
}
impl FlowData {
    /// Quality clip window clamped to the read length
    #[must_use]
    pub fn clip_window(&self, seq_len: usize) -> Range<usize> {
        clip_window(self.clip_qual_left, self.clip_qual_right, seq_len)
    }
}

/// Converts a left clip from the on-disk 1-based-or-zero form to 0-based
fn left_clip_from_disk(value: u16) -> u16 {
    value.saturating_sub(1)
}

/// Converts a 0-based left clip back to the on-disk form (0 stays 0)
fn left_clip_to_disk(value: u16) -> Option<u16> {
    if value == 0 {
        Some(0)
    } else {
        value.checked_add(1)
    }
}

fn clip_window(left: u16, right: u16, seq_len: usize) -> Range<usize> {
    let start = (left as usize).min(seq_len);
    let end = if right == 0 {
        seq_len
    } else {
        (right as usize).min(seq_len)
    };
    start..end.max(start)
}

/// A decoded SFF read
///
/// Untrimmed reads keep the full sequence in mixed case (lower case outside the
/// quality clip window) together with all flow metadata. Trimmed reads hold only the
/// clipped region, upper-cased, with no flow metadata and cannot be written back to
/// an SFF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SffRead {
    /// Read name (record identifier)
    pub name: String,
    /// Called bases
    pub bases: Vec<u8>,
    /// PHRED quality per base
    pub quality: Vec<u8>,
    /// Flowgram and clip metadata, `None` for trimmed reads
    pub flow: Option<FlowData>,
}
impl SffRead {
    /// Decodes one read record from the current position of the reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Positioned at the start of a read record
    /// * `flow_chars` - Flow order from the global header (sets the flows per read)
    /// * `key_sequence` - Key sequence from the global header
    /// * `trim` - Return only the quality clipped region
    ///
    /// # Errors
    ///
    /// Returns an error if the read header is malformed, any padding contains data, or
    /// the stream ends before the record is complete.
    pub fn decode<R: Read>(
        reader: &mut R,
        flow_chars: &[u8],
        key_sequence: &[u8],
        trim: bool,
    ) -> Result<Self> {
        let header = ReadHeader::from_reader(reader)?;
        let seq_len = header.seq_len as usize;
        let flow_values = read_u16_array(reader, flow_chars.len(), "flow values")?;
        let flow_index = read_vec(reader, seq_len, "flow index")?;
        let mut bases = read_vec(reader, seq_len, "bases")?;
        let mut quality = read_vec(reader, seq_len, "quality")?;
        read_zero_padding(
            reader,
            padding_to_8(header.payload_length(flow_chars.len())),
            "Post quality",
        )?;

        let clip_qual_left = left_clip_from_disk(header.clip_qual_left);
        let window = clip_window(clip_qual_left, header.clip_qual_right, seq_len);

        if trim {
            bases.truncate(window.end);
            bases.drain(..window.start);
            bases.make_ascii_uppercase();
            quality.truncate(window.end);
            quality.drain(..window.start);
            return Ok(Self {
                name: header.name,
                bases,
                quality,
                flow: None,
            });
        }

        mask_outside(&mut bases, &window);
        Ok(Self {
            name: header.name,
            bases,
            quality,
            flow: Some(FlowData {
                flow_values,
                flow_index,
                flow_chars: flow_chars.to_vec(),
                key_sequence: key_sequence.to_vec(),
                clip_qual_left,
                clip_qual_right: header.clip_qual_right,
                clip_adapter_left: left_clip_from_disk(header.clip_adapter_left),
                clip_adapter_right: header.clip_adapter_right,
            }),
        })
    }

    /// Number of bases
    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Whether this read still carries its flow metadata
    #[must_use]
    pub fn is_trimmed(&self) -> bool {
        self.flow.is_none()
    }

    /// Returns the quality clipped, upper-cased form of an untrimmed read
    ///
    /// Trimmed reads are returned unchanged.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        let Some(flow) = &self.flow else {
            return self.clone();
        };
        let window = flow.clip_window(self.bases.len());
        Self {
            name: self.name.clone(),
            bases: self.bases[window.clone()].to_ascii_uppercase(),
            quality: self.quality[window].to_vec(),
            flow: None,
        }
    }

    /// Encodes the read at the current position of the writer
    ///
    /// The read's flow metadata must match the file's flow chars and key sequence: a
    /// single SFF file cannot mix flow chemistries. Bases are written upper-cased.
    ///
    /// Returns the number of bytes written, always a multiple of 8.
    ///
    /// # Errors
    ///
    /// Returns an error if the read has no flow metadata, inconsistent flow chemistry,
    /// per-base arrays of the wrong length, or fields too large for the record layout.
    pub fn encode<W: Write>(&self, writer: &mut W, flow_chars: &[u8], key_sequence: &[u8]) -> Result<usize> {
        let flow = self.validate(flow_chars, key_sequence)?;
        let too_large = || WriteError::RecordTooLarge(self.name.clone());

        let name_length = u16::try_from(self.name.len()).map_err(|_| too_large())?;
        let seq_len = u32::try_from(self.bases.len()).map_err(|_| too_large())?;
        let unpadded_header = SIZE_READ_HEADER + self.name.len();
        let header_padding = padding_to_8(unpadded_header);
        let read_header_length =
            u16::try_from(unpadded_header + header_padding).map_err(|_| too_large())?;
        let clip_qual_left = left_clip_to_disk(flow.clip_qual_left).ok_or_else(too_large)?;
        let clip_adapter_left = left_clip_to_disk(flow.clip_adapter_left).ok_or_else(too_large)?;

        let mut buffer = [0u8; SIZE_READ_HEADER];
        BigEndian::write_u16(&mut buffer[0..2], read_header_length);
        BigEndian::write_u16(&mut buffer[2..4], name_length);
        BigEndian::write_u32(&mut buffer[4..8], seq_len);
        BigEndian::write_u16(&mut buffer[8..10], clip_qual_left);
        BigEndian::write_u16(&mut buffer[10..12], flow.clip_qual_right);
        BigEndian::write_u16(&mut buffer[12..14], clip_adapter_left);
        BigEndian::write_u16(&mut buffer[14..16], flow.clip_adapter_right);
        writer.write_all(&buffer)?;
        writer.write_all(self.name.as_bytes())?;
        write_zero_padding(writer, header_padding)?;

        write_u16_array(writer, &flow.flow_values)?;
        writer.write_all(&flow.flow_index)?;
        writer.write_all(&self.bases.to_ascii_uppercase())?;
        self.quality
            .iter()
            .try_for_each(|&q| writer.write_u8(q))?;

        let payload = 2 * flow.flow_values.len() + 3 * self.bases.len();
        let payload_padding = padding_to_8(payload);
        write_zero_padding(writer, payload_padding)?;

        Ok(read_header_length as usize + payload + payload_padding)
    }

    fn validate(&self, flow_chars: &[u8], key_sequence: &[u8]) -> Result<&FlowData> {
        let Some(flow) = &self.flow else {
            return Err(WriteError::MissingFlowData(self.name.clone()).into());
        };
        if flow.flow_chars != flow_chars || flow.key_sequence != key_sequence {
            return Err(WriteError::InconsistentFlowData(self.name.clone()).into());
        }
        if flow.flow_values.len() != flow_chars.len() {
            return Err(WriteError::FlowValueCount {
                name: self.name.clone(),
                expected: flow_chars.len(),
                got: flow.flow_values.len(),
            }
            .into());
        }
        for (field, got) in [
            ("quality", self.quality.len()),
            ("flow index", flow.flow_index.len()),
        ] {
            if got != self.bases.len() {
                return Err(WriteError::PerBaseLength {
                    name: self.name.clone(),
                    field,
                    expected: self.bases.len(),
                    got,
                }
                .into());
            }
        }
        Ok(flow)
    }
}

/// Lower-cases the bases outside `window` and upper-cases those inside
fn mask_outside(bases: &mut [u8], window: &Range<usize>) {
    for (i, base) in bases.iter_mut().enumerate() {
        if window.contains(&i) {
            base.make_ascii_uppercase();
        } else {
            base.make_ascii_lowercase();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{make_read, FLOW_CHARS, KEY};
    use super::*;
    use crate::Error;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_exact_bytes() -> anyhow::Result<()> {
        let read = make_read("E3MFGYR02JWQ7T", b"tcaggGTCTACATGTTGGTTaaccc", 5, 20);
        let mut buf = Vec::new();
        let written = read.encode(&mut buf, FLOW_CHARS, KEY)?;
        assert_eq!(written, buf.len());
        assert_eq!(buf.len() % 8, 0);

        let decoded = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false)?;
        assert_eq!(decoded, read);

        let mut again = Vec::new();
        decoded.encode(&mut again, FLOW_CHARS, KEY)?;
        assert_eq!(again, buf);
        Ok(())
    }

    #[test]
    fn test_clip_convention_on_disk() -> anyhow::Result<()> {
        let read = make_read("r1", b"ACGTACGTAC", 4, 8);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        // left stored 1-based, right stored as-is
        assert_eq!(BigEndian::read_u16(&buf[8..10]), 5);
        assert_eq!(BigEndian::read_u16(&buf[10..12]), 8);
        // zero stays zero
        assert_eq!(BigEndian::read_u16(&buf[12..14]), 0);
        Ok(())
    }

    #[test]
    fn test_untrimmed_case_mask() -> anyhow::Result<()> {
        let read = make_read("r1", b"ACGTACGTAC", 4, 8);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        let decoded = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false)?;
        assert_eq!(decoded.bases, b"acgtACGTac");
        Ok(())
    }

    #[test]
    fn test_trim_matches_sliced_untrimmed() -> anyhow::Result<()> {
        for (left, right) in [(4, 8), (0, 0), (0, 6), (3, 0), (9, 3)] {
            let read = make_read("r1", b"acgtACGTac", left, right);
            let mut buf = Vec::new();
            read.encode(&mut buf, FLOW_CHARS, KEY)?;
            let untrimmed = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false)?;
            let trimmed = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, true)?;
            assert_eq!(trimmed, untrimmed.trimmed());
            assert!(trimmed.is_trimmed());
        }
        Ok(())
    }

    #[test]
    fn test_zero_clips_keep_full_sequence() -> anyhow::Result<()> {
        let read = make_read("r1", b"acgtACGTac", 0, 0);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        let trimmed = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, true)?;
        assert_eq!(trimmed.bases, b"ACGTACGTAC");
        assert_eq!(trimmed.quality.len(), 10);
        Ok(())
    }

    #[test]
    fn test_encode_rejects_trimmed() {
        let read = make_read("r1", b"ACGT", 0, 0).trimmed();
        let err = read.encode(&mut Vec::new(), FLOW_CHARS, KEY).unwrap_err();
        assert!(matches!(err, Error::WriteError(WriteError::MissingFlowData(_))));
    }

    #[test]
    fn test_encode_rejects_mixed_chemistry() {
        let read = make_read("r1", b"ACGT", 0, 0);
        let err = read.encode(&mut Vec::new(), FLOW_CHARS, b"GACT").unwrap_err();
        assert!(matches!(err, Error::WriteError(WriteError::InconsistentFlowData(_))));
    }

    #[test]
    fn test_encode_rejects_missing_quality() {
        let mut read = make_read("r1", b"ACGT", 0, 0);
        read.quality.clear();
        let err = read.encode(&mut Vec::new(), FLOW_CHARS, KEY).unwrap_err();
        assert!(matches!(
            err,
            Error::WriteError(WriteError::PerBaseLength { field: "quality", .. })
        ));
    }

    #[test]
    fn test_decode_nonzero_trailing_padding() -> anyhow::Result<()> {
        // 2 * 16 + 3 * 3 = 41 bytes of payload, 7 bytes of padding
        let read = make_read("r1", b"ACG", 0, 0);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        let last = buf.len() - 1;
        buf[last] = 9;
        let err = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::NonZeroPadding { len: 7, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_decode_bad_header_length() -> anyhow::Result<()> {
        let read = make_read("r1", b"ACG", 0, 0);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        BigEndian::write_u16(&mut buf[0..2], 12);
        let err = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::InvalidReadHeaderLength(12))
        ));
        Ok(())
    }

    #[test]
    fn test_decode_truncated() -> anyhow::Result<()> {
        let read = make_read("r1", b"ACGTACGT", 0, 0);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        buf.truncate(buf.len() - 12);
        let err = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false).unwrap_err();
        assert!(err.is_premature_eof());
        Ok(())
    }

    #[test]
    fn test_decode_corrupt_sequence_length() -> anyhow::Result<()> {
        let read = make_read("r1", b"ACGTACGT", 0, 0);
        let mut buf = Vec::new();
        read.encode(&mut buf, FLOW_CHARS, KEY)?;
        BigEndian::write_u32(&mut buf[4..8], u32::MAX);
        let err = SffRead::decode(&mut Cursor::new(&buf), FLOW_CHARS, KEY, false).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::UnexpectedEof { context: "flow index", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_record_length_from_header() -> anyhow::Result<()> {
        let read = make_read("E3MFGYR02JWQ7T", b"ACGTACGTACGTA", 1, 10);
        let mut buf = Vec::new();
        let written = read.encode(&mut buf, FLOW_CHARS, KEY)?;
        let header = ReadHeader::from_reader(&mut Cursor::new(&buf))?;
        assert_eq!(header.record_length(FLOW_CHARS.len()), written);
        assert_eq!(header.name, "E3MFGYR02JWQ7T");
        Ok(())
    }
}
