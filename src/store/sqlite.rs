use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};

use super::OffsetStore;
use crate::error::{IndexError, Result};

/// Entries written per transaction unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Offset store persisted to an SQLite database
///
/// The database holds a single table:
///
/// ```text
/// offset_data(key TEXT, offset INTEGER)
/// ```
///
/// While building, entries are buffered and written `batch_size` at a time inside one
/// transaction. No constraint exists on `key` until [`finish`](OffsetStore::finish)
/// creates the unique index `key_index`, so duplicate keys are only detected then.
/// A database without `key_index` comes from an aborted build and is refused by
/// [`SqliteStore::open`].
#[derive(Debug)]
pub struct SqliteStore {
    connection: Connection,
    path: PathBuf,
    pending: Vec<(String, u64)>,
    batch_size: usize,
}
impl SqliteStore {
    /// Creates a new, empty store at `path`
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreExists`] if a file is already present at `path`.
    pub fn create<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(IndexError::StoreExists(path.display().to_string()).into());
        }
        log::debug!("Creating offset index {}", path.display());
        let connection = Connection::open(path)?;
        connection.execute("CREATE TABLE offset_data (key TEXT, offset INTEGER)", ())?;
        Ok(Self {
            connection,
            path: path.to_path_buf(),
            pending: Vec::with_capacity(batch_size),
            batch_size: batch_size.max(1),
        })
    }

    /// Opens a finished store read-only
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StaleIndex`] if the file is not an SQLite database, or
    /// lacks the offset table or its unique key index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stale = |reason: String| IndexError::StaleIndex(format!("{}: {reason}", path.display()));

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(path, flags).map_err(|e| stale(e.to_string()))?;

        // not a database at all surfaces here, on the first query
        let schema = |kind: &str, name: &str| -> Result<bool> {
            connection
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    (kind, name),
                    |_| Ok(()),
                )
                .optional()
                .map(|found| found.is_some())
                .map_err(|e| stale(e.to_string()).into())
        };
        if !schema("table", "offset_data")? {
            return Err(stale("no offset table".to_string()).into());
        }
        if !schema("index", "key_index")? {
            return Err(stale("incomplete (unique key index missing)".to_string()).into());
        }

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            pending: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Location of the database file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the buffered entries in a single transaction
    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let transaction = self.connection.transaction()?;
        {
            let mut insert =
                transaction.prepare_cached("INSERT INTO offset_data (key, offset) VALUES (?1, ?2)")?;
            for (key, offset) in &self.pending {
                // SQLite integers are signed
                let offset = i64::try_from(*offset).map_err(|_| IndexError::InvalidOffset(i64::MAX))?;
                insert.execute((key, offset))?;
            }
        }
        transaction.commit()?;
        self.pending.clear();
        Ok(())
    }

    /// Finds one key stored more than once
    fn find_duplicate(&self) -> Result<Option<String>> {
        let key = self
            .connection
            .query_row(
                "SELECT key FROM offset_data GROUP BY key HAVING COUNT(*) > 1 LIMIT 1",
                (),
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    /// MIN / MAX aggregate over the keys, NULL on an empty table
    fn single_key(&self, sql: &str) -> Result<Option<String>> {
        let key: Option<String> = self.connection.query_row(sql, (), |row| row.get(0))?;
        Ok(key)
    }
}
impl OffsetStore for SqliteStore {
    fn insert(&mut self, key: String, offset: u64) -> Result<()> {
        self.pending.push((key, offset));
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        match self
            .connection
            .execute("CREATE UNIQUE INDEX key_index ON offset_data(key)", ())
        {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                let key = self.find_duplicate()?.unwrap_or_default();
                Err(IndexError::DuplicateKey(key).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, key: &str) -> Result<Option<u64>> {
        let mut select = self
            .connection
            .prepare_cached("SELECT offset FROM offset_data WHERE key = ?1")?;
        let offset: Option<i64> = select.query_row((key,), |row| row.get(0)).optional()?;
        offset
            .map(|offset| u64::try_from(offset).map_err(|_| IndexError::InvalidOffset(offset).into()))
            .transpose()
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM offset_data", (), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default() + self.pending.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut select = self
            .connection
            .prepare("SELECT key FROM offset_data ORDER BY ROWID")?;
        let keys = select
            .query_map((), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    fn first_key(&self) -> Result<Option<String>> {
        self.single_key("SELECT MIN(key) FROM offset_data")
    }

    fn last_key(&self) -> Result<Option<String>> {
        self.single_key("SELECT MAX(key) FROM offset_data")
    }
}
