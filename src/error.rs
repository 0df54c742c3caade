/// Custom Result type for seqdex operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the seqdex library, encompassing all possible error cases
/// that can occur while decoding, encoding, scanning or indexing sequence files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to SFF global header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while decoding SFF read records
    ReadError(#[from] ReadError),
    /// Errors that occur while encoding SFF files
    WriteError(#[from] WriteError),
    /// Structural problems with an embedded Roche index block
    RocheIndexError(#[from] RocheIndexError),
    /// Malformed record boundaries in text formats
    ScanError(#[from] ScanError),
    /// Errors raised while building or querying an offset index
    IndexError(#[from] IndexError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// UTF-8 errors on owned buffers
    FromUtf8Error(#[from] std::string::FromUtf8Error),
    /// Errors from the SQLite backed offset store
    SqliteError(#[from] rusqlite::Error),
}
impl Error {
    /// True if the stream ended before a declared length was satisfied
    #[must_use]
    pub fn is_premature_eof(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::UnexpectedEof { .. }))
    }
}

/// Errors specific to processing and validating the SFF global header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid SFF magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    #[error("Unsupported SFF version in header: {0:?}")]
    InvalidFormatVersion([u8; 4]),

    /// Only flowgram format code 1 (u16 flow values) is defined
    #[error("Flowgram format code {0} not supported")]
    InvalidFlowgramFormat(u8),

    /// Exactly one of the index offset / index length fields was set
    #[error("Index offset {offset} but index length {length}")]
    InconsistentIndexFields { offset: u64, length: u32 },

    /// The declared header length is not a multiple of 8 or does not agree
    /// with the flow and key lengths
    ///
    /// # Fields
    /// * `declared` - The header length field
    /// * `expected` - The padded length implied by the flow chars and key
    #[error("Invalid SFF header length {declared}, expected {expected}")]
    InvalidHeaderLength { declared: u16, expected: usize },

    /// The header cannot represent the given flow chars or key sequence
    #[error("Flow chars ({flows}) or key sequence ({key}) too long for the SFF header")]
    FieldTooLong { flows: usize, key: usize },
}

/// Errors that can occur while reading SFF records
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The stream ended before a declared field or record was complete
    ///
    /// # Fields
    /// * `context` - Which part of the file was being read
    /// * `expected` - The number of bytes the field required
    #[error("Premature end of file while reading {context} ({expected} bytes expected)")]
    UnexpectedEof {
        context: &'static str,
        expected: usize,
    },

    /// The read header length is too small or not a multiple of 8
    #[error("Malformed read header, says length is {0}")]
    InvalidReadHeaderLength(u16),

    /// A padding region that must be zero contained data
    ///
    /// # Fields
    /// * `context` - Which padding region was being checked
    /// * `len` - The length of the padding region
    #[error("{context} {len} byte padding region contained data")]
    NonZeroPadding { context: &'static str, len: usize },

    /// Fewer records were found than the header declared
    #[error("Indexed {found} records, expected {expected}")]
    RecordCountMismatch { found: u32, expected: u32 },
}

/// Errors that can occur while writing SFF data
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// At least one record is required since it carries the flow metadata
    #[error("Need at least one record for SFF output")]
    EmptyInput,

    /// The record carries no flowgram/clip metadata (e.g. a trimmed read)
    #[error("Missing SFF flow information for read {0}")]
    MissingFlowData(String),

    /// The record's flow chars or key sequence differ from the file's
    #[error("Read {0} has inconsistent SFF flow data")]
    InconsistentFlowData(String),

    /// The number of flow values does not match the flows per read
    #[error("Read {name} has {got} flow values, expected {expected}")]
    FlowValueCount {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Per-base arrays do not share the sequence length
    #[error("Read {name}: {field} length {got} does not match sequence length {expected}")]
    PerBaseLength {
        name: String,
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// Name or sequence too long for the fixed-width record fields
    #[error("Read {0} is too large for SFF record fields")]
    RecordTooLarge(String),

    /// A Roche index entry needs a name of exactly 14 bytes
    #[error("Read name {0:?} is not 14 bytes and cannot be stored in a Roche index")]
    InvalidIndexName(String),

    /// The offset cannot be written with four base-255 digits
    #[error("Offset {0} cannot be represented in a Roche index")]
    OffsetOutOfRange(u64),
}

/// Structural problems with an embedded Roche index block.
///
/// These are recoverable exactly once: the SFF indexer discards anything it
/// read from the block and falls back to scanning every record.
#[derive(thiserror::Error, Debug)]
pub enum RocheIndexError {
    /// The header does not declare an index block
    #[error("No index present in this SFF file")]
    Missing,

    /// The magic number of the index block does not match
    #[error("Wrong magic number in SFF index header: {0}")]
    InvalidMagicNumber(u32),

    /// The version of the index block is not "1.00"
    #[error("Unsupported version in index header: {0:?}")]
    InvalidVersion([u8; 4]),

    /// The sizes in the index header disagree with the global header
    #[error("Index length {declared} does not match index block sizes ({computed})")]
    LengthMismatch { declared: u32, computed: u64 },

    /// The read index data is not 20 bytes per read
    #[error("Expect index data block of {expected} bytes (20 bytes per read), got {got}")]
    DataLengthMismatch { expected: u64, got: u32 },

    /// An entry lacked the NUL after the name or the 0xFF sentinel
    #[error("Malformed index entry {0}")]
    MalformedEntry(u32),

    /// An entry points outside the read record region
    #[error("Index entry {entry} has offset {offset} outside the read region")]
    OffsetOutOfRange { entry: u32, offset: u64 },

    /// An entry name is not valid UTF-8
    #[error("Index entry {0} has a non UTF-8 name")]
    InvalidName(u32),

    /// The block ended early
    #[error("Index block truncated")]
    Truncated,

    /// I/O failure while reading the block
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Malformed record boundaries found while scanning a text format
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The record start line does not carry an identifier
    #[error("Missing identifier on record line at offset {0}")]
    MissingIdentifier(u64),

    /// GenBank record with no usable ACCESSION/VERSION line
    #[error("Did not find ACCESSION/VERSION lines for record at offset {0}")]
    MissingAccession(u64),

    /// EMBL/IMGT ID line with an unrecognised layout
    #[error("Did not recognise the ID line layout at offset {0}")]
    UnrecognisedIdLine(u64),

    /// SwissProt ID line not followed by an AC line
    #[error("Expected AC line after ID line for record at offset {0}")]
    MissingAcLine(u64),

    /// Tab-separated line without a tab
    #[error("Missing tab separator on line at offset {0}")]
    MissingTab(u64),

    /// A line was found where a record start was required
    #[error("Expected record start at offset {0}")]
    ExpectedRecordStart(u64),

    /// The file ended inside a record
    #[error("Premature end of file in record at offset {0}")]
    PrematureEof(u64),

    /// A QUAL record contains something other than integer scores
    #[error("Invalid quality score in record at offset {0}")]
    InvalidQuality(u64),

    /// FASTQ sequence and quality lengths disagree
    #[error("Sequence length {seq_len} and quality length {qual_len} differ for record at offset {offset}")]
    QualityLength {
        offset: u64,
        seq_len: usize,
        qual_len: usize,
    },
}

/// Errors raised while building or querying an offset index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The format name is not known
    #[error("Unsupported format '{0}'")]
    UnsupportedFormat(String),

    /// The same key was produced twice while building an index
    #[error("Duplicate key '{0}'")]
    DuplicateKey(String),

    /// The record decoded at a stored offset carries a different key
    #[error("Key did not match ({expected} vs {found})")]
    KeyMismatch { expected: String, found: String },

    /// A reused persistent index does not agree with the data file
    #[error("Stale or incompatible offset index: {0}")]
    StaleIndex(String),

    /// The requested key is not present
    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    /// A persistent store already exists where a new one was to be created
    #[error("Offset index {0} already exists")]
    StoreExists(String),

    /// An offset outside the range a persistent index can hold
    #[error("Invalid stored offset {0}")]
    InvalidOffset(i64),
}
