//! Key to offset maps backing an index
//!
//! An [`OffsetStore`] is filled once while a file is scanned and queried afterwards.
//! Two implementations are provided:
//!
//! * [`MemoryStore`]: a hash map, rejecting duplicate keys as they are inserted
//! * [`SqliteStore`]: a single SQLite table that survives the process, with the
//!   uniqueness of keys enforced once the bulk load is finished
//!
//! Stores keep keys in insertion order, which is the order records appear in the
//! indexed file.

mod memory;
mod sqlite;

use auto_impl::auto_impl;

use crate::error::Result;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_BATCH_SIZE};

/// A map from record key to byte offset
///
/// Building a store is a two step process: every entry is passed to
/// [`insert`](OffsetStore::insert), then [`finish`](OffsetStore::finish) is called
/// exactly once. Duplicate keys are reported by `insert` or at the latest by `finish`.
#[auto_impl(&mut, Box)]
pub trait OffsetStore {
    /// Adds an entry to the store
    fn insert(&mut self, key: String, offset: u64) -> Result<()>;

    /// Completes the bulk load, making the store ready for lookups
    fn finish(&mut self) -> Result<()>;

    /// Looks up the offset of a key
    fn get(&self, key: &str) -> Result<Option<u64>>;

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of entries
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every key in insertion order
    fn keys(&self) -> Result<Vec<String>>;

    /// The lexicographically smallest key
    fn first_key(&self) -> Result<Option<String>>;

    /// The lexicographically largest key
    fn last_key(&self) -> Result<Option<String>>;
}

/// Where an index keeps its offsets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    /// Resident in memory, rebuilt every time the file is opened
    #[default]
    Memory,
    /// Persisted to an SQLite file, reused when it already exists
    Sqlite {
        path: std::path::PathBuf,
        /// Number of entries written per transaction while building
        batch_size: usize,
    },
}
impl StoreConfig {
    /// An SQLite store at `path` with the default batch size
    pub fn sqlite<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self::Sqlite {
            path: path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
