//! Offset-tracking line reader

use std::io::BufRead;

use crate::error::Result;

/// A single line together with the byte offset of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Offset of the line in the underlying stream
    pub offset: u64,
    /// Line contents including the line terminator, if any
    pub bytes: Vec<u8>,
}
impl Line {
    #[must_use]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    /// The line with leading and trailing whitespace removed
    #[must_use]
    pub fn trimmed(&self) -> &[u8] {
        self.bytes.trim_ascii()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }

    /// Number of bytes the line occupies in the stream
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reads lines while keeping track of their byte offsets
///
/// One line may be pushed back and is returned again by the next call to
/// [`next_line`](Self::next_line), which is all the lookahead record scanning needs.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    /// Offset of the next byte of `inner`
    position: u64,
    pushed: Option<Line>,
}
impl<R: BufRead> LineReader<R> {
    /// Wraps a reader positioned at `position`
    pub fn new(inner: R, position: u64) -> Self {
        Self {
            inner,
            position,
            pushed: None,
        }
    }

    /// Returns the next line, `None` at end of file
    pub fn next_line(&mut self) -> Result<Option<Line>> {
        if let Some(line) = self.pushed.take() {
            return Ok(Some(line));
        }
        let mut bytes = Vec::new();
        let n = self.inner.read_until(b'\n', &mut bytes)?;
        if n == 0 {
            return Ok(None);
        }
        let line = Line {
            offset: self.position,
            bytes,
        };
        self.position += n as u64;
        Ok(Some(line))
    }

    /// Makes `line` the next line returned
    ///
    /// Only a single line can be held; pushing back twice replaces the first line.
    pub fn push_back(&mut self, line: Line) {
        debug_assert!(self.pushed.is_none(), "only one line of lookahead");
        self.pushed = Some(line);
    }

    /// Offset of the next line to be returned
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pushed.as_ref().map_or(self.position, |line| line.offset)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_and_push_back() -> anyhow::Result<()> {
        let data = b">a\nACGT\r\n>b\nGG";
        let mut lines = LineReader::new(&data[..], 0);

        let first = lines.next_line()?.unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.bytes, b">a\n");

        let second = lines.next_line()?.unwrap();
        assert_eq!(second.offset, 3);
        assert_eq!(second.trimmed(), b"ACGT");

        let third = lines.next_line()?.unwrap();
        assert_eq!(third.offset, 9);
        lines.push_back(third.clone());
        assert_eq!(lines.position(), 9);
        assert_eq!(lines.next_line()?, Some(third));

        let last = lines.next_line()?.unwrap();
        assert_eq!((last.offset, last.len()), (12, 2));
        assert_eq!(lines.next_line()?, None);
        assert_eq!(lines.position(), 14);
        Ok(())
    }

    #[test]
    fn test_start_position() -> anyhow::Result<()> {
        let mut lines = LineReader::new(&b"\nx\n"[..], 100);
        assert!(lines.next_line()?.unwrap().is_blank());
        assert_eq!(lines.next_line()?.unwrap().offset, 101);
        Ok(())
    }
}
