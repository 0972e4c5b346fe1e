use std::io;

/// Errors raised while reading a zip archive.
///
/// Any of these aborts the whole operation; a partially built index or a
/// partially verified entry is never handed out.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// File is smaller than an empty archive's end record
    #[error("file is too short to be a zip archive ({len} bytes)")]
    TooShort {
        /// Actual file length
        len: u64,
    },

    /// End of central directory signature found in neither search window
    #[error("end of central directory record not found")]
    EocdNotFound,

    /// EOCD points somewhere without a central directory header
    #[error("no central directory header at offset {offset}")]
    MissingCentralDirectory {
        /// Offset recorded in the EOCD
        offset: u64,
    },

    /// Neither a central directory header nor the EOCD where one was expected
    #[error("unexpected signature {found:#010x} at offset {offset}")]
    UnexpectedSignature {
        /// Offset of the bad record
        offset: u64,
        /// Value read
        found: u32,
    },

    /// A structure ended before its fixed or declared length
    #[error("truncated {what}")]
    Truncated {
        /// Structure being read
        what: &'static str,
    },

    /// Entry is compressed where only stored entries are supported
    #[error("entry {name} is not stored uncompressed")]
    CompressedEntry {
        /// Entry name
        name: String,
    },

    /// Local header missing or inconsistent
    #[error("invalid local file header for {name}")]
    InvalidLocalHeader {
        /// Entry name
        name: String,
    },

    /// Two central directory records share a name
    #[error("duplicate entry {name}")]
    DuplicateEntry {
        /// Entry name
        name: String,
    },

    /// Requested entry is not in the archive
    #[error("entry {name} not found")]
    EntryNotFound {
        /// Entry name
        name: String,
    },

    /// Compression method this crate cannot decode
    #[error("entry {name} uses unsupported compression method {method}")]
    UnsupportedMethod {
        /// Entry name
        name: String,
        /// Raw method id
        method: u16,
    },

    /// Decoded data does not match the recorded checksum
    #[error("CRC mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// Entry name
        name: String,
        /// Checksum from the central directory
        expected: u32,
        /// Checksum of the decoded bytes
        actual: u32,
    },

    /// Entry name would extract outside the destination directory
    #[error("entry {name} escapes the extraction directory")]
    UnsafePath {
        /// Entry name
        name: String,
    },

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Map an I/O error from a fixed-size read into `Truncated`.
    pub(crate) fn eof_as_truncated(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ArchiveError::Truncated { what }
        } else {
            ArchiveError::Io(err)
        }
    }
}
