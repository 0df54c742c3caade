//! Records returned by random access lookups

use crate::error::{Result, ScanError};
use crate::format::Format;
use crate::scan::{fastq_record, FastqSection, LineReader, TextScanner};
use crate::sff::SffRead;

/// A record fetched from an indexed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Sff(SffRead),
    Text(TextRecord),
}
impl Record {
    /// The record's own identifier
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Sff(read) => &read.name,
            Self::Text(record) => &record.id,
        }
    }

    /// Sequence letters, if the format carries them in a form decoded here
    #[must_use]
    pub fn sequence(&self) -> Option<&[u8]> {
        match self {
            Self::Sff(read) => Some(&read.bases),
            Self::Text(record) => record.sequence.as_deref(),
        }
    }

    /// Per-base qualities (PHRED scores for SFF and QUAL, ASCII for FASTQ)
    #[must_use]
    pub fn quality(&self) -> Option<&[u8]> {
        match self {
            Self::Sff(read) => Some(&read.quality),
            Self::Text(record) => record.quality.as_deref(),
        }
    }

    #[must_use]
    pub fn as_sff(&self) -> Option<&SffRead> {
        match self {
            Self::Sff(read) => Some(read),
            Self::Text(_) => None,
        }
    }
}

/// A record of a text format
///
/// The identifier is extracted with the same rules used to build the index. FASTA
/// records also carry their sequence, QUAL records their scores and FASTQ records
/// both; for the annotation formats only the raw text is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub id: String,
    /// Exact bytes of the record in the file
    pub raw: Vec<u8>,
    pub sequence: Option<Vec<u8>>,
    pub quality: Option<Vec<u8>>,
}
impl TextRecord {
    /// Decodes the raw bytes of a record that started at `offset` in its file
    pub fn decode(format: Format, raw: Vec<u8>, offset: u64) -> Result<Self> {
        let id = TextScanner::with_position(raw.as_slice(), format, offset)?
            .next()
            .transpose()?
            .map(|(id, _)| id)
            .ok_or(ScanError::ExpectedRecordStart(offset))?;

        let (sequence, quality) = match format {
            Format::Fasta => (Some(body_letters(&raw)), None),
            Format::Qual => (None, Some(qual_scores(&raw, offset)?)),
            Format::Fastq => {
                let (sequence, quality) = fastq_payload(&raw, offset)?;
                (Some(sequence), Some(quality))
            }
            _ => (None, None),
        };
        Ok(Self {
            id,
            raw,
            sequence,
            quality,
        })
    }
}

/// Lines after the first one, stripped of all whitespace
fn body_lines(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split(|&b| b == b'\n').skip(1)
}

fn body_letters(raw: &[u8]) -> Vec<u8> {
    body_lines(raw)
        .flatten()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect()
}

fn qual_scores(raw: &[u8], offset: u64) -> Result<Vec<u8>> {
    let mut scores = Vec::new();
    for line in body_lines(raw) {
        let line = std::str::from_utf8(line)?;
        for token in line.split_whitespace() {
            let score = token
                .parse::<u8>()
                .map_err(|_| ScanError::InvalidQuality(offset))?;
            scores.push(score);
        }
    }
    Ok(scores)
}

fn fastq_payload(raw: &[u8], offset: u64) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut lines = LineReader::new(raw, offset);
    let header = lines
        .next_line()?
        .ok_or(ScanError::PrematureEof(offset))?;
    let mut sequence = Vec::new();
    let mut quality = Vec::new();
    fastq_record(&mut lines, &header, |section, line| match section {
        FastqSection::Sequence => sequence.extend_from_slice(line.trimmed()),
        FastqSection::Quality => quality.extend_from_slice(line.trimmed()),
        FastqSection::Header | FastqSection::Separator => {}
    })?;
    Ok((sequence, quality))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_fasta_record() -> anyhow::Result<()> {
        let raw = b">seq1 some description\nACGT\nGG TT\n\n".to_vec();
        let record = TextRecord::decode(Format::Fasta, raw.clone(), 120)?;
        assert_eq!(record.id, "seq1");
        assert_eq!(record.sequence.as_deref(), Some(&b"ACGTGGTT"[..]));
        assert_eq!(record.raw, raw);
        Ok(())
    }

    #[test]
    fn test_qual_record() -> anyhow::Result<()> {
        let record = TextRecord::decode(Format::Qual, b">q1\n40 40 12\n9\n".to_vec(), 0)?;
        assert_eq!(record.quality.as_deref(), Some(&[40, 40, 12, 9][..]));

        let err = TextRecord::decode(Format::Qual, b">q1\n40 x\n".to_vec(), 7).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::InvalidQuality(7))));
        Ok(())
    }

    #[test]
    fn test_fastq_record_wrapped() -> anyhow::Result<()> {
        let record = TextRecord::decode(Format::Fastq, b"@r1 x\nAC\nGT\n+\n@I\nII\n".to_vec(), 0)?;
        let record = Record::Text(record);
        assert_eq!(record.id(), "r1");
        assert_eq!(record.sequence(), Some(&b"ACGT"[..]));
        assert_eq!(record.quality(), Some(&b"@III"[..]));
        assert!(record.as_sff().is_none());
        Ok(())
    }

    #[test]
    fn test_annotation_format_keeps_raw_only() -> anyhow::Result<()> {
        let raw = b"ID   P1   Reviewed;\nAC   Q12345;\n//\n".to_vec();
        let record = TextRecord::decode(Format::Swiss, raw, 0)?;
        assert_eq!(record.id, "Q12345");
        assert!(record.sequence.is_none());
        Ok(())
    }

    #[test]
    fn test_not_a_record() {
        let err = TextRecord::decode(Format::Fasta, b"ACGT\n".to_vec(), 3).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::ExpectedRecordStart(3))));
    }
}
