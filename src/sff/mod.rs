//! # Standard Flowgram Format
//!
//! SFF is the binary format written by Roche 454 and Ion Torrent instruments. A file
//! holds a global header, one record per read with its flowgram, called bases and
//! qualities, and optionally an index block mapping read names to record offsets.
//!
//! ## File Structure
//!
//! All integers are big-endian and every section is zero padded to a multiple of 8.
//!
//! ```text
//! ┌───────────────────┐
//! │   Global Header   │ 31 bytes + flow chars + key sequence
//! ├───────────────────┤
//! │   Read Record     │ read header + flows, flow index, bases, qualities
//! ├───────────────────┤
//! │       ...         │
//! ├───────────────────┤
//! │   Index Block     │ optional, Roche ".mft" layout
//! └───────────────────┘
//! ```
//!
//! ## Trimming
//!
//! Each read carries a quality clip window. Untrimmed reads keep the full sequence
//! with the bases outside the window in lower case; trimmed reads keep only the
//! window. Left clips are stored 1-based on disk (0 meaning no clip) and are exposed
//! 0-based; right clips are exclusive ends and stored unchanged.
//!
//! ## Modules
//!
//! * `header`: global header codec
//! * `read`: read record codec
//! * `index`: embedded index codec and the slow-scan fallback
//! * `reader`: sequential iteration over reads
//! * `writer`: two-pass writer with index generation

mod header;
mod index;
mod read;
mod reader;
mod writer;

pub use header::{SffHeader, FLOWGRAM_FORMAT, MAGIC, SIZE_FIXED_HEADER, VERSION};
pub use index::{
    decode_offset, encode_offset, locate_roche_index, read_index_xml, sff_entries,
    try_read_index, write_index, RocheIndexHeader, SffEntries, SlowScan, INDEX_MAGIC,
    INDEX_NAME_LENGTH, INDEX_VERSION, MAX_INDEX_OFFSET, SIZE_INDEX_ENTRY, SIZE_INDEX_HEADER,
};
pub use read::{FlowData, ReadHeader, SffRead, SIZE_READ_HEADER};
pub use reader::SffReader;
pub use writer::{SffWriter, SffWriterBuilder};

#[cfg(test)]
pub(crate) use read::testing;
