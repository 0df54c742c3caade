//! Writer implementation for SFF files
//!
//! The number of reads and the index location are only known once every record has
//! been written, so the writer makes two passes over the global header: a placeholder
//! is written first and patched in place at the end. This requires a seekable output.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use seqdex::sff::{SffReader, SffWriterBuilder};
//!
//! let input = File::open("in.sff").map(BufReader::new).unwrap();
//! let reads = SffReader::new(input)
//!     .unwrap()
//!     .collect::<seqdex::Result<Vec<_>>>()
//!     .unwrap();
//!
//! let mut writer = SffWriterBuilder::default().build(File::create("out.sff").unwrap());
//! writer.write_file(&reads).unwrap();
//! ```

use std::io::{Seek, SeekFrom, Write};

use super::header::SffHeader;
use super::index::{write_index, INDEX_NAME_LENGTH, MAX_INDEX_OFFSET};
use super::read::SffRead;
use crate::error::{Result, WriteError};

/// Builds the XML manifest stored in the index block of files written by this crate
fn default_manifest() -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <manifest>\n  \
         <!-- This index was written by seqdex {} -->\n\
         </manifest>\n",
        env!("CARGO_PKG_VERSION")
    )
    .into_bytes()
}

/// A builder for creating configured [`SffWriter`] instances
///
/// # Examples
///
/// ```rust,no_run
/// use seqdex::sff::SffWriterBuilder;
/// use std::fs::File;
///
/// // no index block, e.g. for names that are not 14 characters
/// let writer = SffWriterBuilder::default()
///     .index(false)
///     .build(File::create("example.sff").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct SffWriterBuilder {
    /// Whether to append a Roche index block (default: true)
    index: Option<bool>,
    /// XML manifest stored in the index block
    xml: Option<Vec<u8>>,
}
impl SffWriterBuilder {
    /// Sets whether an index block is written after the reads
    ///
    /// Even when enabled the index is only written if every read name is exactly 14
    /// bytes long and every record offset fits the index encoding.
    #[must_use]
    pub fn index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the XML manifest stored at the start of the index block
    ///
    /// Use [`read_index_xml`](super::read_index_xml) to carry the manifest of an
    /// existing file over to a rewritten copy.
    #[must_use]
    pub fn xml(mut self, xml: Vec<u8>) -> Self {
        self.xml = Some(xml);
        self
    }

    /// Builds an [`SffWriter`] over the given output
    pub fn build<W: Write + Seek>(self, inner: W) -> SffWriter<W> {
        SffWriter {
            inner,
            index: self.index.unwrap_or(true),
            xml: self.xml.unwrap_or_else(default_manifest),
        }
    }
}

/// Writes complete SFF files
///
/// Offsets stored in the header and the index are relative to the position of the
/// output when [`write_file`](Self::write_file) is called.
#[derive(Debug)]
pub struct SffWriter<W: Write + Seek> {
    inner: W,
    index: bool,
    xml: Vec<u8>,
}
impl<W: Write + Seek> SffWriter<W> {
    /// Writes a complete SFF file containing the given reads
    ///
    /// The flow chars and key sequence of the file are taken from the first read;
    /// every other read must share them. After writing, the output is positioned at
    /// the end of the file.
    ///
    /// # Returns
    ///
    /// The number of reads written
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::EmptyInput`] if there are no reads, or any error from
    /// encoding an individual read. The output is left incomplete in that case.
    pub fn write_file<'r, I>(&mut self, records: I) -> Result<u32>
    where
        I: IntoIterator<Item = &'r SffRead>,
    {
        let start = self.inner.stream_position()?;
        let mut records = records.into_iter();
        let first = records.next().ok_or(WriteError::EmptyInput)?;
        let flow = first
            .flow
            .as_ref()
            .ok_or_else(|| WriteError::MissingFlowData(first.name.clone()))?;

        // Placeholder header; only the counts and index fields change on the patch
        let mut header = SffHeader::new(flow.flow_chars.clone(), flow.key_sequence.clone())?;
        header.write_bytes(&mut self.inner)?;

        let mut offset = u64::from(header.header_length);
        let mut index = self.index.then(Vec::new);
        let mut count = 0u32;
        for read in std::iter::once(first).chain(records) {
            let indexable = read.name.len() == INDEX_NAME_LENGTH && offset <= MAX_INDEX_OFFSET;
            if index.is_some() && !indexable {
                log::debug!(
                    "Not writing an SFF index: read {} at offset {offset} cannot be indexed",
                    read.name
                );
                index = None;
            }
            if let Some(entries) = index.as_mut() {
                entries.push((read.name.clone(), offset));
            }
            offset += read.encode(&mut self.inner, &header.flow_chars, &header.key_sequence)? as u64;
            count = count
                .checked_add(1)
                .ok_or_else(|| WriteError::RecordTooLarge(read.name.clone()))?;
        }
        header.number_of_reads = count;

        if let Some(mut entries) = index {
            header.index_offset = offset;
            header.index_length = write_index(&mut self.inner, &mut entries, &self.xml)?;
        }

        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(start))?;
        header.write_bytes(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;
        Ok(count)
    }

    /// Mutable access to the underlying output
    pub fn by_ref(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consumes the writer, returning the underlying output
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sff::read::testing::make_read;
    use crate::sff::{read_index_xml, try_read_index, SffReader};
    use std::io::Cursor;

    fn indexed_reads() -> Vec<SffRead> {
        vec![
            make_read("E3MFGYR02JWQ7T", b"tcagGGTCTACATGTTGGTaa", 4, 19),
            make_read("E3MFGYR02JA6IL", b"tcagAAAA", 4, 0),
            make_read("E3MFGYR02FTGED", b"tcaGCCGATTCAGC", 3, 14),
        ]
    }

    #[test]
    fn test_roundtrip_preserves_bytes_and_xml() -> anyhow::Result<()> {
        let mut writer = SffWriterBuilder::default()
            .xml(b"<manifest>run 1</manifest>".to_vec())
            .build(Cursor::new(Vec::new()));
        assert_eq!(writer.write_file(&indexed_reads())?, 3);
        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len() % 8, 0);

        let mut cursor = Cursor::new(bytes.as_slice());
        let reader = SffReader::new(&mut cursor)?;
        let header = reader.header().clone();
        let reads = reader.collect::<Result<Vec<_>>>()?;
        assert_eq!(reads, indexed_reads());
        assert_eq!(header.number_of_reads, 3);
        assert!(header.has_index());

        let xml = read_index_xml(&mut cursor, &header)?;
        assert_eq!(xml, b"<manifest>run 1</manifest>");

        let mut again = SffWriterBuilder::default()
            .xml(xml)
            .build(Cursor::new(Vec::new()));
        again.write_file(&reads)?;
        assert_eq!(again.into_inner().into_inner(), bytes);
        Ok(())
    }

    #[test]
    fn test_index_offsets_point_at_records() -> anyhow::Result<()> {
        let mut writer = SffWriterBuilder::default().build(Cursor::new(Vec::new()));
        writer.write_file(&indexed_reads())?;
        let mut cursor = writer.into_inner();
        cursor.set_position(0);

        let header = SffHeader::from_reader(&mut cursor)?;
        for (name, offset) in try_read_index(&mut cursor, &header)? {
            cursor.set_position(offset);
            let read = SffRead::decode(&mut cursor, &header.flow_chars, &header.key_sequence, false)?;
            assert_eq!(read.name, name);
        }
        Ok(())
    }

    #[test]
    fn test_empty_input() {
        let mut writer = SffWriterBuilder::default().build(Cursor::new(Vec::new()));
        let err = writer.write_file(&Vec::<SffRead>::new()).unwrap_err();
        assert!(matches!(err, Error::WriteError(WriteError::EmptyInput)));
    }

    #[test]
    fn test_short_names_drop_index() -> anyhow::Result<()> {
        let reads = vec![make_read("r1", b"ACGT", 0, 0), make_read("r2", b"ACGT", 0, 0)];
        let mut writer = SffWriterBuilder::default().build(Cursor::new(Vec::new()));
        assert_eq!(writer.write_file(&reads)?, 2);
        let bytes = writer.into_inner().into_inner();

        let header = SffHeader::from_reader(&mut bytes.as_slice())?;
        assert!(!header.has_index());
        assert_eq!(header.index_length, 0);
        assert_eq!(header.number_of_reads, 2);
        Ok(())
    }

    #[test]
    fn test_offsets_relative_to_start() -> anyhow::Result<()> {
        let mut output = Cursor::new(b"PREFIX!!".to_vec());
        output.set_position(8);
        let mut writer = SffWriterBuilder::default().build(output);
        writer.write_file(&indexed_reads())?;
        let bytes = writer.into_inner().into_inner();

        let mut cursor = Cursor::new(bytes[8..].to_vec());
        let header = SffHeader::from_reader(&mut cursor)?;
        assert_eq!(try_read_index(&mut cursor, &header)?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_mixed_chemistry_rejected() {
        let mut second = make_read("E3MFGYR02JA6IL", b"ACGT", 0, 0);
        if let Some(flow) = second.flow.as_mut() {
            flow.key_sequence = b"GACT".to_vec();
        }
        let reads = vec![make_read("E3MFGYR02JWQ7T", b"ACGT", 0, 0), second];
        let mut writer = SffWriterBuilder::default().build(Cursor::new(Vec::new()));
        let err = writer.write_file(&reads).unwrap_err();
        assert!(matches!(err, Error::WriteError(WriteError::InconsistentFlowData(_))));
    }
}
