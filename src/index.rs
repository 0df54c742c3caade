//! Random access to the records of a sequence file by key
//!
//! An [`IndexedFile`] pairs an open file handle with an [`OffsetStore`] mapping each
//! record key to the byte offset of the record. The store is filled once when the
//! file is opened (or reused from an SQLite database) and never changes afterwards.
//!
//! ```rust,no_run
//! use seqdex::{IndexBuilder, Format, StoreConfig};
//!
//! let mut reads = IndexBuilder::new(Format::Sff)
//!     .store(StoreConfig::sqlite("reads.sff.idx"))
//!     .open("reads.sff")
//!     .unwrap();
//! let read = reads.get("E3MFGYR02JWQ7T").unwrap();
//! println!("{}", String::from_utf8_lossy(read.sequence().unwrap()));
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::cursor::read_vec;
use crate::error::{IndexError, Result};
use crate::events::{IndexEvent, IndexObserver, LogObserver};
use crate::format::Format;
use crate::record::{Record, TextRecord};
use crate::scan::{read_raw, TextScanner};
use crate::sff::{sff_entries, ReadHeader, SffHeader, SffRead};
use crate::store::{MemoryStore, OffsetStore, SqliteStore, StoreConfig};

/// Maps a record identifier to the key it is indexed under
pub type KeyFunction = Box<dyn Fn(&str) -> String>;

/// A builder for opening [`IndexedFile`]s
///
/// # Examples
///
/// ```rust,no_run
/// use seqdex::{Format, IndexBuilder, IndexEvent};
///
/// let mut fallbacks = 0;
/// let file = IndexBuilder::new(Format::Fastq)
///     .key_function(|id| id.trim_end_matches("/1").to_string())
///     .observer(|event: &IndexEvent| {
///         if matches!(event, IndexEvent::MissingSffIndex) {
///             fallbacks += 1;
///         }
///     })
///     .open("reads.fastq")
///     .unwrap();
/// ```
pub struct IndexBuilder<'a> {
    format: Format,
    /// Optional mapping of record identifiers to keys (default: identity)
    key_function: Option<KeyFunction>,
    /// Where offsets are kept (default: memory)
    store: Option<StoreConfig>,
    /// Receives index events (default: [`LogObserver`])
    observer: Option<Box<dyn IndexObserver + 'a>>,
}
impl<'a> IndexBuilder<'a> {
    #[must_use]
    pub fn new(format: Format) -> Self {
        Self {
            format,
            key_function: None,
            store: None,
            observer: None,
        }
    }

    /// Sets the function mapping record identifiers to index keys
    #[must_use]
    pub fn key_function<F>(mut self, key_function: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.key_function = Some(Box::new(key_function));
        self
    }

    /// Sets where the offsets are stored
    ///
    /// An SQLite store that already exists is reused without scanning the file, after
    /// checking that its first and last keys still resolve to matching records.
    #[must_use]
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the observer notified of index events
    #[must_use]
    pub fn observer<O: IndexObserver + 'a>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Opens `path` and builds or reuses its index
    ///
    /// # Errors
    ///
    /// Fails on malformed records, duplicate keys, or a reused store that does not
    /// match the file ([`IndexError::StaleIndex`]). The file is closed in every case.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<IndexedFile> {
        let path = path.as_ref();
        let mut handle = BufReader::new(File::open(path)?);
        let reusing = matches!(&self.store, Some(StoreConfig::Sqlite { path, .. }) if path.exists());
        let sff_header = if self.format.is_sff() {
            match SffHeader::from_reader(&mut handle) {
                Ok(header) => Some(header),
                // the file no longer matches the store it was indexed into
                Err(e) if reusing => {
                    return Err(IndexError::StaleIndex(format!("unreadable SFF header: {e}")).into())
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        let mut observer = self
            .observer
            .unwrap_or_else(|| Box::new(LogObserver));

        let (store, reused): (Box<dyn OffsetStore>, Option<PathBuf>) = match self.store.unwrap_or_default() {
            StoreConfig::Memory => (Box::new(MemoryStore::default()), None),
            StoreConfig::Sqlite { path, .. } if path.exists() => {
                (Box::new(SqliteStore::open(&path)?), Some(path))
            }
            StoreConfig::Sqlite { path, batch_size } => {
                (Box::new(SqliteStore::create(path, batch_size)?), None)
            }
        };

        let mut file = IndexedFile {
            path: path.to_path_buf(),
            format: self.format,
            handle,
            store,
            key_function: self.key_function,
            sff_header,
        };
        match reused {
            Some(store_path) => {
                file.probe()?;
                observer.on_event(&IndexEvent::StoreReused { path: store_path });
            }
            None => file.build(observer.as_mut())?,
        }
        Ok(file)
    }
}

/// Read-only, dictionary-like access to the records of a file
pub struct IndexedFile {
    path: PathBuf,
    format: Format,
    handle: BufReader<File>,
    store: Box<dyn OffsetStore>,
    key_function: Option<KeyFunction>,
    sff_header: Option<SffHeader>,
}
impl IndexedFile {
    fn key_for(key_function: Option<&KeyFunction>, id: &str) -> String {
        key_function.map_or_else(|| id.to_string(), |f| f(id))
    }

    /// Scans the file and fills the store
    fn build(&mut self, observer: &mut dyn IndexObserver) -> Result<()> {
        self.handle.seek(SeekFrom::Start(0))?;
        let key_function = self.key_function.as_ref();
        let store = self.store.as_mut();
        let mut records = 0;
        let mut insert = |entry: Result<(String, u64)>| -> Result<()> {
            let (id, offset) = entry?;
            store.insert(Self::key_for(key_function, &id), offset)?;
            records += 1;
            Ok(())
        };
        match &self.sff_header {
            Some(header) => sff_entries(&mut self.handle, header, observer)?.try_for_each(&mut insert)?,
            None => TextScanner::new(&mut self.handle, self.format)?.try_for_each(&mut insert)?,
        }
        self.store.finish()?;
        observer.on_event(&IndexEvent::IndexBuilt { records });
        Ok(())
    }

    /// Checks a reused store against the file through its first and last keys
    fn probe(&mut self) -> Result<()> {
        let probes = [self.store.first_key()?, self.store.last_key()?];
        for key in probes.into_iter().flatten() {
            if let Err(e) = self.get(&key) {
                return Err(IndexError::StaleIndex(format!("lookup of {key} failed: {e}")).into());
            }
        }
        Ok(())
    }

    fn offset(&self, key: &str) -> Result<u64> {
        self.store
            .get(key)?
            .ok_or_else(|| IndexError::KeyNotFound(key.to_string()).into())
    }

    fn record_at(&mut self, offset: u64) -> Result<Record> {
        self.handle.seek(SeekFrom::Start(offset))?;
        match &self.sff_header {
            Some(header) => {
                let read = SffRead::decode(
                    &mut self.handle,
                    &header.flow_chars,
                    &header.key_sequence,
                    self.format == Format::SffTrim,
                )?;
                Ok(Record::Sff(read))
            }
            None => {
                let raw = read_raw(&mut self.handle, self.format, offset)?;
                Ok(Record::Text(TextRecord::decode(self.format, raw, offset)?))
            }
        }
    }

    /// Fetches and decodes the record stored under `key`
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::KeyNotFound`] for unknown keys and
    /// [`IndexError::KeyMismatch`] if the record found at the stored offset has a
    /// different key.
    pub fn get(&mut self, key: &str) -> Result<Record> {
        let offset = self.offset(key)?;
        let record = self.record_at(offset)?;
        let found = Self::key_for(self.key_function.as_ref(), record.id());
        if found != key {
            return Err(IndexError::KeyMismatch {
                expected: key.to_string(),
                found,
            }
            .into());
        }
        Ok(record)
    }

    /// Returns the exact bytes of the record stored under `key`
    ///
    /// For SFF files this is the complete read record including padding, which does
    /// not depend on trimming.
    pub fn get_raw(&mut self, key: &str) -> Result<Vec<u8>> {
        let offset = self.offset(key)?;
        self.handle.seek(SeekFrom::Start(offset))?;
        match &self.sff_header {
            Some(header) => {
                let read_header = ReadHeader::from_reader(&mut self.handle)?;
                let length = read_header.record_length(header.flows_per_read());
                self.handle.seek(SeekFrom::Start(offset))?;
                read_vec(&mut self.handle, length, "raw record")
            }
            None => read_raw(&mut self.handle, self.format, offset),
        }
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.store.contains(key)
    }

    /// Number of indexed records
    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }

    /// Every key, in file order
    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.keys()
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Global header of an SFF file, `None` for text formats
    #[must_use]
    pub fn sff_header(&self) -> Option<&SffHeader> {
        self.sff_header.as_ref()
    }
}
impl fmt::Debug for IndexedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedFile")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("sff_header", &self.sff_header)
            .finish_non_exhaustive()
    }
}

/// Opens `path` with an in-memory index
///
/// `format` is a format name such as `"sff"`, `"fasta"` or `"gb"`.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedFormat`] for unknown format names, and any error
/// from building the index.
pub fn open_indexed<P: AsRef<Path>>(
    path: P,
    format: &str,
    key_function: Option<KeyFunction>,
) -> Result<IndexedFile> {
    let mut builder = IndexBuilder::new(format.parse()?);
    builder.key_function = key_function;
    builder.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sff::testing::make_read;
    use crate::sff::SffWriterBuilder;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        let path = dir.path().join(name);
        File::create(&path)?.write_all(data)?;
        Ok(path)
    }

    #[test]
    fn test_fasta_get_and_raw() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_file(&dir, "x.fasta", b">a desc\nACGT\n>b\nGGCC\nTT\n")?;
        let mut file = IndexBuilder::new(Format::Fasta).open(&path)?;

        assert_eq!(file.len()?, 2);
        assert_eq!(file.keys()?, vec!["a", "b"]);
        assert!(file.contains("b")?);
        let record = file.get("b")?;
        assert_eq!(record.sequence(), Some(&b"GGCCTT"[..]));
        assert_eq!(file.get_raw("a")?, b">a desc\nACGT\n");

        let err = file.get("c").unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::KeyNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_key_function_applied() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_file(&dir, "x.tab", b"ID1\tACGT\nID2\tGG\n")?;
        let mut file = IndexBuilder::new(Format::Tab)
            .key_function(|id| id.to_lowercase())
            .open(&path)?;
        assert_eq!(file.keys()?, vec!["id1", "id2"]);
        assert_eq!(file.get("id2")?.id(), "ID2");
        Ok(())
    }

    #[test]
    fn test_duplicate_keys_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_file(&dir, "dup.fasta", b">a\nA\n>b\nC\n>a\nG\n")?;
        let err = IndexBuilder::new(Format::Fasta).open(&path).unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::DuplicateKey(ref k)) if k == "a"));

        let err = IndexBuilder::new(Format::Fasta)
            .store(StoreConfig::sqlite(dir.path().join("dup.idx")))
            .open(&path)
            .unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::DuplicateKey(ref k)) if k == "a"));
        Ok(())
    }

    #[test]
    fn test_sff_missing_index_event() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let reads = vec![make_read("r1", b"ACGT", 0, 0), make_read("r2", b"GGTT", 0, 0)];
        let mut writer = SffWriterBuilder::default().build(File::create(dir.path().join("x.sff"))?);
        writer.write_file(&reads)?;
        drop(writer);

        let mut events = Vec::new();
        let mut file = IndexBuilder::new(Format::Sff)
            .observer(|event: &IndexEvent| events.push(event.clone()))
            .open(dir.path().join("x.sff"))?;
        assert_eq!(file.get("r2")?.sequence(), Some(&b"GGTT"[..]));
        assert_eq!(file.sff_header().map(|h| h.number_of_reads), Some(2));
        drop(file);
        assert_eq!(
            events,
            vec![IndexEvent::MissingSffIndex, IndexEvent::IndexBuilt { records: 2 }]
        );
        Ok(())
    }

    #[test]
    fn test_open_indexed_unknown_format() {
        let err = open_indexed("missing.xyz", "xyz", None).unwrap_err();
        assert!(matches!(err, Error::IndexError(IndexError::UnsupportedFormat(_))));
    }
}
