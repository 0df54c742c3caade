//! Sequential reader over the reads of an SFF file

use std::io::Read;

use super::header::SffHeader;
use super::read::SffRead;
use crate::error::Result;

/// Iterates over every read of an SFF stream
///
/// The reader only needs [`Read`]: records are decoded in file order and the index
/// block (if any) is never touched, so pipes and compressed streams work as inputs.
///
/// # Examples
///
/// ```rust,no_run
/// use std::fs::File;
/// use std::io::BufReader;
/// use seqdex::sff::SffReader;
///
/// let handle = File::open("reads.sff").map(BufReader::new).unwrap();
/// for read in SffReader::new(handle).unwrap().trim(true) {
///     let read = read.unwrap();
///     println!("{}\t{}", read.name, read.len());
/// }
/// ```
#[derive(Debug)]
pub struct SffReader<R: Read> {
    inner: R,
    header: SffHeader,
    trim: bool,
    remaining: u32,
}
impl<R: Read> SffReader<R> {
    /// Reads the global header and prepares to iterate over the reads
    pub fn new(mut inner: R) -> Result<Self> {
        let header = SffHeader::from_reader(&mut inner)?;
        let remaining = header.number_of_reads;
        Ok(Self {
            inner,
            header,
            trim: false,
            remaining,
        })
    }

    /// Return only the quality clipped region of each read
    #[must_use]
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// The global header of the file
    #[must_use]
    pub fn header(&self) -> &SffHeader {
        &self.header
    }

    /// Consumes the reader, returning the inner stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}
impl<R: Read> Iterator for SffReader<R> {
    type Item = Result<SffRead>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let read = SffRead::decode(
            &mut self.inner,
            &self.header.flow_chars,
            &self.header.key_sequence,
            self.trim,
        );
        if read.is_err() {
            self.remaining = 0;
        }
        Some(read)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sff::read::testing::make_read;
    use crate::sff::SffWriterBuilder;
    use std::io::Cursor;

    #[test]
    fn test_iterate_untrimmed_and_trimmed() -> anyhow::Result<()> {
        let reads = vec![
            make_read("read_one", b"aacCGGtt", 3, 6),
            make_read("read_two", b"ACGTACGTACGT", 0, 0),
        ];
        let mut writer = SffWriterBuilder::default()
            .index(false)
            .build(Cursor::new(Vec::new()));
        writer.write_file(&reads)?;
        let bytes = writer.into_inner().into_inner();

        let untrimmed = SffReader::new(bytes.as_slice())?.collect::<Result<Vec<_>>>()?;
        assert_eq!(untrimmed, reads);

        let trimmed = SffReader::new(bytes.as_slice())?
            .trim(true)
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(trimmed[0].bases, b"CGG");
        assert_eq!(trimmed[1].bases, b"ACGTACGTACGT");
        assert!(trimmed.iter().all(SffRead::is_trimmed));
        Ok(())
    }

    #[test]
    fn test_stops_after_error() -> anyhow::Result<()> {
        let reads = vec![make_read("r1", b"ACGT", 0, 0), make_read("r2", b"ACGT", 0, 0)];
        let mut writer = SffWriterBuilder::default()
            .index(false)
            .build(Cursor::new(Vec::new()));
        writer.write_file(&reads)?;
        let mut bytes = writer.into_inner().into_inner();
        bytes.truncate(bytes.len() - 8);

        let results: Vec<_> = SffReader::new(bytes.as_slice())?.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().is_err_and(crate::Error::is_premature_eof));
        Ok(())
    }
}
