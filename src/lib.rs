//! # seqdex
//!
//! Random access to the records of sequence files, and a complete codec for the
//! binary Standard Flowgram Format (SFF).
//!
//! ## Overview
//!
//! * [`sff`]: read, write and index SFF files, including the Roche index block
//!   embedded by sequencing instruments.
//! * [`scan`]: record boundary detection for FASTA, FASTQ, GenBank, EMBL and other
//!   line based formats.
//! * [`store`]: key to offset maps, held in memory or persisted to SQLite.
//! * [`IndexedFile`]: dictionary-like lookup of records by key built on top of the
//!   above.
//!
//! ## Example
//!
//! ```rust,no_run
//! use seqdex::open_indexed;
//!
//! let mut records = open_indexed("reads.fastq", "fastq", None).unwrap();
//! println!("{} records", records.len().unwrap());
//! let raw = records.get_raw("read_42").unwrap();
//! ```
//!
//! ## Logging
//!
//! The crate reports through the [`log`] facade and never installs a logger. Index
//! events (such as falling back from a damaged SFF index to a full scan) go to an
//! [`IndexObserver`], which defaults to logging them.

mod cursor;
mod error;
mod events;
mod format;
mod index;
mod record;

pub mod scan;
pub mod sff;
pub mod store;

pub use error::{
    Error, HeaderError, IndexError, ReadError, Result, RocheIndexError, ScanError, WriteError,
};
pub use events::{IndexEvent, IndexObserver, LogObserver};
pub use format::Format;
pub use index::{open_indexed, IndexBuilder, IndexedFile, KeyFunction};
pub use record::{Record, TextRecord};
pub use store::{MemoryStore, OffsetStore, SqliteStore, StoreConfig};
