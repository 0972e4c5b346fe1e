//! ZIP archive parsing, indexing, extraction and packing.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`index`]: Name → `(offset, size)` table over stored entries
//! - [`extractor`]: Full extraction of stored and deflated entries
//! - [`writer`]: Packing a directory tree into an archive
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! This implementation reads the EOCD first (from the end of the file),
//! then the Central Directory, which allows listing files and locating
//! payloads without reading the entire archive.
//!
//! ## Limitations
//!
//! - No ZIP64 support
//! - No encryption support
//! - No multi-disk archive support
//! - Only STORED and DEFLATE can be extracted; only STORED can be indexed

mod error;
mod extractor;
mod index;
mod parser;
mod structures;
mod writer;

pub use error::ArchiveError;
pub use extractor::ZipExtractor;
pub use index::{ArchiveEntry, ArchiveIndex, LoadRequest};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::ZipPacker;
