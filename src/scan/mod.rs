//! Record boundary scanning for line based formats
//!
//! A [`TextScanner`] walks a text file once and yields the key and starting byte
//! offset of every record. Each format has its own rule for where the key lives:
//!
//! | Format                         | Record start       | Key                               |
//! |--------------------------------|--------------------|-----------------------------------|
//! | FASTA, QUAL, ACE, PHD, PIR     | marker line        | first word after the marker       |
//! | GenBank                        | `LOCUS `           | `VERSION` (`acc.N`) or `ACCESSION` |
//! | EMBL, IMGT                     | `ID `              | `SV` line, else parsed `ID` line  |
//! | SwissProt                      | `ID `              | first accession of the `AC` line  |
//! | IntelliGenetics                | `;` comment block  | first word after the comments     |
//! | Tab                            | every line         | text before the first tab         |
//! | FASTQ                          | `@`                | first word after `@`              |
//!
//! FASTQ records cannot be split on `@` alone since quality lines may start with it;
//! the end of a record is found by counting quality characters until they match the
//! number of sequence characters.
//!
//! [`read_raw`] returns the exact bytes of a single record using the same rules.

mod line;

use std::io::BufRead;

pub use line::{Line, LineReader};

use crate::error::{IndexError, Result, ScanError};
use crate::format::Format;

/// Whether `line` opens a new record of the given format
#[must_use]
pub fn is_record_start(format: Format, line: &[u8]) -> bool {
    match format {
        Format::Fasta | Format::Qual => line.starts_with(b">"),
        Format::Ace => line.starts_with(b"CO "),
        Format::Phd => line.starts_with(b"BEGIN_SEQUENCE"),
        Format::Pir => line.len() >= 4 && line[0] == b'>' && line[3] == b';',
        Format::GenBank => line.starts_with(b"LOCUS "),
        Format::Embl | Format::Imgt | Format::Swiss => line.starts_with(b"ID "),
        Format::Ig => line.starts_with(b";"),
        Format::Fastq => line.starts_with(b"@"),
        Format::Tab => !line.trim_ascii().is_empty(),
        Format::Sff | Format::SffTrim => false,
    }
}

/// Lines ending the EMBL header section that may carry an SV line
const EMBL_HEADER_END: [&[u8]; 4] = [b"FH ", b"FT ", b"SQ ", b"//"];

/// Length of the record start marker
fn marker_len(format: Format) -> usize {
    match format {
        Format::Fasta | Format::Qual | Format::Ig | Format::Fastq => 1,
        Format::Ace | Format::Embl | Format::Imgt | Format::Swiss => 3,
        Format::Pir => 4,
        Format::GenBank => 6,
        Format::Phd => 14,
        Format::Tab | Format::Sff | Format::SffTrim => 0,
    }
}

fn to_key(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

/// The `n`th whitespace separated token of a line
fn nth_token(bytes: &[u8], n: usize) -> Option<&[u8]> {
    bytes
        .split(u8::is_ascii_whitespace)
        .filter(|token| !token.is_empty())
        .nth(n)
}

/// First word following the marker of a record start line
fn key_after_marker(line: &Line, marker: usize) -> Result<String> {
    let rest = line.bytes.get(marker..).unwrap_or_default();
    let token = nth_token(rest, 0).ok_or(ScanError::MissingIdentifier(line.offset))?;
    to_key(token)
}

/// `acc.N` with a numeric version
fn is_accession_version(id: &[u8]) -> bool {
    let mut parts = id.split(|&b| b == b'.');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(_), Some(version), None) if !version.is_empty() && version.iter().all(u8::is_ascii_digit)
    )
}

/// Section of a FASTQ record a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FastqSection {
    Header,
    Sequence,
    Separator,
    Quality,
}

/// Consumes one FASTQ record starting with `header`, returning its key
///
/// Every line of the record is passed to `sink` together with its section. Sequence
/// and quality may be wrapped over several lines.
pub(crate) fn fastq_record<R: BufRead>(
    lines: &mut LineReader<R>,
    header: &Line,
    mut sink: impl FnMut(FastqSection, &Line),
) -> Result<String> {
    let offset = header.offset;
    if !header.starts_with(b"@") {
        return Err(ScanError::ExpectedRecordStart(offset).into());
    }
    let key = key_after_marker(header, 1)?;
    sink(FastqSection::Header, header);

    let mut seq_len = 0;
    loop {
        let Some(line) = lines.next_line()? else {
            return Err(ScanError::PrematureEof(offset).into());
        };
        if line.starts_with(b"+") {
            sink(FastqSection::Separator, &line);
            break;
        }
        seq_len += line.trimmed().len();
        sink(FastqSection::Sequence, &line);
    }

    let mut qual_len = 0;
    while qual_len < seq_len {
        let Some(line) = lines.next_line()? else {
            break;
        };
        qual_len += line.trimmed().len();
        sink(FastqSection::Quality, &line);
    }
    if qual_len != seq_len {
        return Err(ScanError::QualityLength {
            offset,
            seq_len,
            qual_len,
        }
        .into());
    }
    Ok(key)
}

/// Iterates over the `(key, offset)` pairs of a text file
///
/// The scanner stops after the first error.
#[derive(Debug)]
pub struct TextScanner<R> {
    lines: LineReader<R>,
    format: Format,
    done: bool,
}
impl<R: BufRead> TextScanner<R> {
    /// Scans a stream positioned at the start of the file
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedFormat`] for the binary SFF formats.
    pub fn new(inner: R, format: Format) -> Result<Self> {
        Self::with_position(inner, format, 0)
    }

    /// Scans a stream positioned at byte `position` of the file
    pub fn with_position(inner: R, format: Format, position: u64) -> Result<Self> {
        if format.is_sff() {
            return Err(IndexError::UnsupportedFormat(format.to_string()).into());
        }
        Ok(Self {
            lines: LineReader::new(inner, position),
            format,
            done: false,
        })
    }

    /// Next line opening a record, skipping anything in between
    fn next_start(&mut self) -> Result<Option<Line>> {
        while let Some(line) = self.lines.next_line()? {
            if is_record_start(self.format, &line.bytes) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    fn next_entry(&mut self) -> Result<Option<(String, u64)>> {
        match self.format {
            Format::GenBank => self.next_genbank(),
            Format::Embl | Format::Imgt => self.next_embl(),
            Format::Swiss => self.next_swiss(),
            Format::Ig => self.next_ig(),
            Format::Tab => self.next_tab(),
            Format::Fastq => self.next_fastq(),
            _ => {
                let Some(start) = self.next_start()? else {
                    return Ok(None);
                };
                let key = key_after_marker(&start, marker_len(self.format))?;
                Ok(Some((key, start.offset)))
            }
        }
    }

    fn next_genbank(&mut self) -> Result<Option<(String, u64)>> {
        let Some(start) = self.next_start()? else {
            return Ok(None);
        };
        let mut key = None;
        while let Some(line) = self.lines.next_line()? {
            if line.starts_with(b"ACCESSION ") {
                if let Some(accession) = nth_token(&line.bytes, 1) {
                    key = Some(accession.to_vec());
                }
            } else if line.starts_with(b"VERSION ") {
                if let Some(version) = nth_token(&line.bytes, 1).filter(|v| is_accession_version(v)) {
                    key = Some(version.to_vec());
                    break;
                }
            } else if is_record_start(Format::GenBank, &line.bytes) {
                self.lines.push_back(line);
                break;
            } else if line.starts_with(b"FEATURES ")
                || line.starts_with(b"ORIGIN ")
                || line.starts_with(b"//")
            {
                break;
            }
        }
        let key = key.ok_or(ScanError::MissingAccession(start.offset))?;
        Ok(Some((to_key(&key)?, start.offset)))
    }

    fn next_embl(&mut self) -> Result<Option<(String, u64)>> {
        let Some(start) = self.next_start()? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&start.bytes)?;
        let fields = text.get(3..).unwrap_or_default().trim_end();
        let mut key = match text.get(2..).unwrap_or_default().matches(';').count() {
            // 2006 style: ID   X56734; SV 1; linear; mRNA; STD; PLN; 1859 BP.
            6 => {
                let mut parts = fields.split(';');
                let accession = parts.next().unwrap_or_default().trim();
                let version = parts
                    .next()
                    .map(str::trim)
                    .filter(|part| part.starts_with("SV "))
                    .and_then(|part| part.split_whitespace().nth(1));
                match version {
                    Some(version) => format!("{accession}.{version}"),
                    None => accession.to_string(),
                }
            }
            // pre 2006: ID   X56734   standard; RNA; PLN; 1859 BP.
            3 => fields
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            _ => return Err(ScanError::UnrecognisedIdLine(start.offset).into()),
        };

        while let Some(line) = self.lines.next_line()? {
            if line.starts_with(b"SV ") {
                if let Some(version) = nth_token(&line.bytes, 1) {
                    key = to_key(version)?;
                }
                break;
            } else if is_record_start(self.format, &line.bytes) {
                self.lines.push_back(line);
                break;
            } else if EMBL_HEADER_END.iter().any(|prefix| line.starts_with(prefix)) {
                break;
            }
        }
        if key.is_empty() {
            return Err(ScanError::MissingIdentifier(start.offset).into());
        }
        Ok(Some((key, start.offset)))
    }

    fn next_swiss(&mut self) -> Result<Option<(String, u64)>> {
        let Some(start) = self.next_start()? else {
            return Ok(None);
        };
        let line = self
            .lines
            .next_line()?
            .filter(|line| line.starts_with(b"AC "))
            .ok_or(ScanError::MissingAcLine(start.offset))?;
        let accessions = std::str::from_utf8(&line.bytes[3..])?;
        let key = accessions.trim().split(';').next().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(ScanError::MissingIdentifier(start.offset).into());
        }
        Ok(Some((key.to_string(), start.offset)))
    }

    fn next_ig(&mut self) -> Result<Option<(String, u64)>> {
        let Some(start) = self.next_start()? else {
            return Ok(None);
        };
        loop {
            let Some(line) = self.lines.next_line()? else {
                return Err(ScanError::PrematureEof(start.offset).into());
            };
            if !line.starts_with(b";") && !line.is_blank() {
                let key = key_after_marker(&line, 0)?;
                return Ok(Some((key, start.offset)));
            }
        }
    }

    fn next_tab(&mut self) -> Result<Option<(String, u64)>> {
        while let Some(line) = self.lines.next_line()? {
            if line.is_blank() {
                continue;
            }
            let tab = line
                .bytes
                .iter()
                .position(|&b| b == b'\t')
                .ok_or(ScanError::MissingTab(line.offset))?;
            if tab == 0 {
                return Err(ScanError::MissingIdentifier(line.offset).into());
            }
            return Ok(Some((to_key(&line.bytes[..tab])?, line.offset)));
        }
        Ok(None)
    }

    fn next_fastq(&mut self) -> Result<Option<(String, u64)>> {
        let header = loop {
            match self.lines.next_line()? {
                None => return Ok(None),
                Some(line) if line.is_blank() => {}
                Some(line) => break line,
            }
        };
        let key = fastq_record(&mut self.lines, &header, |_, _| {})?;
        Ok(Some((key, header.offset)))
    }
}
impl<R: BufRead> Iterator for TextScanner<R> {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = self.next_entry().transpose();
        if !matches!(entry, Some(Ok(_))) {
            self.done = true;
        }
        entry
    }
}

/// Reads the exact bytes of the record starting at `offset`
///
/// `reader` must be positioned at `offset`.
///
/// # Errors
///
/// Returns an error if no record starts at `offset`, or if a FASTQ record is
/// incomplete. SFF records are not handled here.
pub fn read_raw<R: BufRead>(reader: R, format: Format, offset: u64) -> Result<Vec<u8>> {
    if format.is_sff() {
        return Err(IndexError::UnsupportedFormat(format.to_string()).into());
    }
    let mut lines = LineReader::new(reader, offset);
    let first = lines.next_line()?.ok_or(ScanError::PrematureEof(offset))?;
    if !is_record_start(format, &first.bytes) {
        return Err(ScanError::ExpectedRecordStart(offset).into());
    }

    let mut raw = Vec::new();
    match format {
        Format::Tab => raw = first.bytes,
        Format::Fastq => {
            fastq_record(&mut lines, &first, |_, line| raw.extend_from_slice(&line.bytes))?;
        }
        Format::Ig => {
            // comment block, then the body up to the next comment block
            raw.extend_from_slice(&first.bytes);
            let mut in_comments = true;
            while let Some(line) = lines.next_line()? {
                let comment = line.starts_with(b";");
                if comment && !in_comments {
                    break;
                }
                in_comments &= comment;
                raw.extend_from_slice(&line.bytes);
            }
        }
        _ => {
            raw.extend_from_slice(&first.bytes);
            while let Some(line) = lines.next_line()? {
                if is_record_start(format, &line.bytes) {
                    break;
                }
                raw.extend_from_slice(&line.bytes);
            }
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    fn scan(data: &[u8], format: Format) -> Result<Vec<(String, u64)>> {
        TextScanner::new(data, format)?.collect()
    }

    /// Every scanned record must start at its offset and the raw records must tile
    /// the file from the first record onwards
    fn check_raw_tiling(data: &[u8], format: Format) -> anyhow::Result<()> {
        let entries = scan(data, format)?;
        let mut tiled = Vec::new();
        for (_, offset) in &entries {
            let mut cursor = Cursor::new(data);
            cursor.set_position(*offset);
            tiled.extend(read_raw(cursor, format, *offset)?);
        }
        let start = entries.first().map_or(0, |(_, offset)| *offset as usize);
        assert_eq!(tiled, &data[start..]);
        Ok(())
    }

    #[test]
    fn test_fasta() -> anyhow::Result<()> {
        let data = b">alpha first\nACGT\nAC\n>beta\nGGG\n\n>gamma desc here\nT\n";
        let entries = scan(data, Format::Fasta)?;
        assert_eq!(
            entries,
            vec![
                ("alpha".to_string(), 0),
                ("beta".to_string(), 21),
                ("gamma".to_string(), 32),
            ]
        );
        check_raw_tiling(data, Format::Fasta)
    }

    #[test]
    fn test_fasta_empty_identifier() {
        let err = scan(b">ok\nAC\n> \nGG\n", Format::Fasta).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::MissingIdentifier(7))));
    }

    #[test]
    fn test_pir_ace_phd_markers() -> anyhow::Result<()> {
        let pir = b">P1;CRAB_ANAPL\nALPHA CRYSTALLIN\nMDITIHNPLI*\n>F1;ABC\nX*\n";
        assert_eq!(scan(pir, Format::Pir)?[1], ("ABC".to_string(), 44));
        check_raw_tiling(pir, Format::Pir)?;

        let ace = b"AS 2 2\n\nCO Contig1 10 1 1 U\nACGT\n\nCO Contig2 5 1 1 U\nAC\n";
        let keys: Vec<_> = scan(ace, Format::Ace)?.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Contig1", "Contig2"]);

        let phd = b"BEGIN_SEQUENCE read1\nBEGIN_DNA\na 9 6\nEND_DNA\nEND_SEQUENCE\nBEGIN_SEQUENCE read2\n";
        assert_eq!(scan(phd, Format::Phd)?[1], ("read2".to_string(), 58));
        Ok(())
    }

    #[test]
    fn test_genbank_version_preferred() -> anyhow::Result<()> {
        let data = b"LOCUS       AB000001   10 bp\n\
ACCESSION   AB000001\n\
VERSION     AB000001.2  GI:123\n\
ORIGIN\n        1 acgtacgtac\n//\n\
LOCUS       AB000002   10 bp\n\
ACCESSION   AB000002 AB000003\n\
VERSION     AB000002\n\
FEATURES             Location/Qualifiers\n//\n";
        let entries = scan(data, Format::GenBank)?;
        assert_eq!(entries[0], ("AB000001.2".to_string(), 0));
        // version without a numeric suffix falls back to the accession
        assert_eq!(entries[1].0, "AB000002");
        check_raw_tiling(data, Format::GenBank)
    }

    #[test]
    fn test_genbank_next_locus_terminates_header() -> anyhow::Result<()> {
        let data = b"LOCUS       A 1 bp\nACCESSION   A1\nLOCUS       B 1 bp\nACCESSION   B1\n";
        let entries = scan(data, Format::GenBank)?;
        assert_eq!(entries, vec![("A1".to_string(), 0), ("B1".to_string(), 34)]);
        Ok(())
    }

    #[test]
    fn test_genbank_missing_accession() {
        let err = scan(b"LOCUS       A 1 bp\nORIGIN\n//\n", Format::GenBank).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::MissingAccession(0))));
    }

    #[test]
    fn test_embl_id_styles() -> anyhow::Result<()> {
        let data = b"ID   X56734; SV 1; linear; mRNA; STD; PLN; 1859 BP.\n\
AC   X56734;\nFH   Key\n//\n\
ID   AB000263 standard; RNA; PRI; 368 BP.\n\
AC   AB000263;\nSV   AB000263.1\nSQ   Sequence\n//\n\
ID   Y00001; XX; linear; mRNA; STD; PLN; 10 BP.\nSQ   Sequence\n//\n";
        let keys: Vec<_> = scan(data, Format::Embl)?.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["X56734.1", "AB000263.1", "Y00001"]);
        check_raw_tiling(data, Format::Imgt)
    }

    #[test]
    fn test_embl_unrecognised_id() {
        let err = scan(b"ID   X56734 linear\n//\n", Format::Embl).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::UnrecognisedIdLine(0))));
    }

    #[test]
    fn test_swiss() -> anyhow::Result<()> {
        let data = b"ID   128UP_DROME   Reviewed;   368 AA.\nAC   P33450; Q9VQ21;\nSQ   SEQUENCE\n//\n\
ID   1433B_HUMAN   Reviewed;   246 AA.\nAC   P31946;\n//\n";
        let keys: Vec<_> = scan(data, Format::Swiss)?.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["P33450", "P31946"]);

        let err = scan(b"ID   X   Reviewed;\nDE   no accession\n", Format::Swiss).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::MissingAcLine(0))));
        Ok(())
    }

    #[test]
    fn test_intelligenetics() -> anyhow::Result<()> {
        let data = b";comment one\n;comment two\nSYK_HUMAN\nACGT1\n;next\n\nCOX\nGG1\n";
        let entries = scan(data, Format::Ig)?;
        assert_eq!(entries, vec![("SYK_HUMAN".to_string(), 0), ("COX".to_string(), 42)]);
        check_raw_tiling(data, Format::Ig)?;

        let err = scan(b";only comments\n;\n", Format::Ig).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::PrematureEof(0))));
        Ok(())
    }

    #[test]
    fn test_tab() -> anyhow::Result<()> {
        let data = b"id1\tACGT\n\nid2\tGG\n";
        assert_eq!(
            scan(data, Format::Tab)?,
            vec![("id1".to_string(), 0), ("id2".to_string(), 10)]
        );
        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(10);
        assert_eq!(read_raw(cursor, Format::Tab, 10)?, b"id2\tGG\n");

        let err = scan(b"id1\tA\nbroken line\n", Format::Tab).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::MissingTab(6))));
        Ok(())
    }

    #[test]
    fn test_fastq_quality_may_start_with_at() -> anyhow::Result<()> {
        let data = b"@r1 desc\nACGT\n+\n@@II\n@r2\nAC\nGT\n+r2\n@I\nII\n";
        let entries = scan(data, Format::Fastq)?;
        assert_eq!(entries, vec![("r1".to_string(), 0), ("r2".to_string(), 21)]);
        check_raw_tiling(data, Format::Fastq)
    }

    #[test]
    fn test_fastq_errors() {
        let err = scan(b"@r1\nACGT\n+\nIIIII\n", Format::Fastq).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::QualityLength { seq_len: 4, qual_len: 5, .. })
        ));

        let err = scan(b"@r1\nACGT\n+\nII\n", Format::Fastq).unwrap_err();
        assert!(matches!(
            err,
            Error::ScanError(ScanError::QualityLength { seq_len: 4, qual_len: 2, .. })
        ));

        let err = scan(b"@r1\nACGT\n", Format::Fastq).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::PrematureEof(0))));

        let err = scan(b"@r1\nA\n+\nI\nr2\nA\n+\nI\n", Format::Fastq).unwrap_err();
        assert!(matches!(err, Error::ScanError(ScanError::ExpectedRecordStart(10))));
    }

    #[test]
    fn test_scanner_stops_after_error() -> anyhow::Result<()> {
        let results: Vec<_> = TextScanner::new(&b"ok\tA\nbad\nlater\tB\n"[..], Format::Tab)?.collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
        Ok(())
    }

    #[test]
    fn test_sff_rejected() {
        assert!(TextScanner::new(&b""[..], Format::Sff).is_err());
        assert!(read_raw(&b""[..], Format::SffTrim, 0).is_err());
    }

    #[test]
    fn test_accession_version() {
        assert!(is_accession_version(b"AB000001.2"));
        assert!(!is_accession_version(b"AB000001"));
        assert!(!is_accession_version(b"AB000001."));
        assert!(!is_accession_version(b"A.1.2"));
        assert!(!is_accession_version(b"AB000001.x"));
    }
}
