//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Follow its pointer to the first Central Directory File Header
//! 3. Walk the headers until the EOCD signature comes up again
//! 4. For data access, read each file's Local File Header to find where
//!    the payload starts
//!
//! The central directory pointer is always taken from the EOCD. Scanning
//! forward from the start of the file for the header signature would be
//! fooled by entry data that happens to contain it.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::io::ReadAt;

use super::error::ArchiveError;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code indexes files on disk
/// and archives already held in memory.
///
/// ## Usage
///
/// Typically used through [`ArchiveIndex`](super::ArchiveIndex) or
/// [`ZipExtractor`](super::ZipExtractor) rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let entries = parser.list_files()?;
/// for entry in entries {
///     let offset = parser.get_data_offset(&entry)?;
///     // Read file data from offset...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Two windows are tried. First the record is expected exactly 22
    /// bytes before the end of the file (no archive comment). Failing
    /// that, the last `22 + 65535` bytes (clamped to the start of the
    /// file) are scanned forward for the signature, which covers the
    /// largest comment the format allows.
    ///
    /// A candidate is accepted only if its central directory pointer
    /// lands on a central directory file header. An empty archive, whose
    /// pointer lands on the EOCD itself, is accepted as well.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::TooShort`] if the file cannot hold an EOCD
    /// - [`ArchiveError::EocdNotFound`] if no signature is in either window
    /// - [`ArchiveError::MissingCentralDirectory`] if signatures were found
    ///   but none points at a central directory
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64), ArchiveError> {
        let record_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < record_size {
            return Err(ArchiveError::TooShort { len: self.size });
        }

        // Common case: no comment, record sits flush with the end.
        let offset = self.size - record_size;
        let mut buf = [0u8; EndOfCentralDirectory::SIZE];
        self.reader
            .read_exact_at(offset, &mut buf)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "end of central directory"))?;
        if read_signature(&buf, 0) == EndOfCentralDirectory::SIGNATURE {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            if self.points_at_central_directory(&eocd, offset)? {
                return Ok((eocd, offset));
            }
        }

        // Assume a comment of up to the maximum size and scan forward.
        let search_start = self.size.saturating_sub(record_size + MAX_COMMENT_SIZE);
        let mut window = vec![0u8; (self.size - search_start) as usize];
        self.reader
            .read_exact_at(search_start, &mut window)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "end of central directory"))?;

        let mut loose = None;
        let mut dangling = None;
        for i in 0..=window.len() - EndOfCentralDirectory::SIZE {
            if read_signature(&window, i) != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let candidate = search_start + i as u64;
            let eocd =
                EndOfCentralDirectory::from_bytes(&window[i..i + EndOfCentralDirectory::SIZE])?;
            if !self.points_at_central_directory(&eocd, candidate)? {
                dangling.get_or_insert(eocd.cd_offset as u64);
                continue;
            }
            // The record's own comment must run exactly to the end of the file.
            if candidate + record_size + eocd.comment_len as u64 == self.size {
                return Ok((eocd, candidate));
            }
            loose.get_or_insert((eocd, candidate));
        }

        if let Some(found) = loose {
            tracing::warn!(offset = found.1, "end record comment length does not match file size");
            return Ok(found);
        }
        match dangling {
            Some(offset) => Err(ArchiveError::MissingCentralDirectory { offset }),
            None => Err(ArchiveError::EocdNotFound),
        }
    }

    /// Check that the EOCD at `eocd_offset` points at a central directory.
    fn points_at_central_directory(
        &self,
        eocd: &EndOfCentralDirectory,
        eocd_offset: u64,
    ) -> Result<bool, ArchiveError> {
        let cd_offset = eocd.cd_offset as u64;
        if cd_offset == eocd_offset {
            return Ok(eocd.total_entries == 0);
        }
        if cd_offset > eocd_offset {
            return Ok(false);
        }

        let mut sig = [0u8; 4];
        self.reader.read_exact_at(cd_offset, &mut sig)?;
        Ok(u32::from_le_bytes(sig) == CDFH_SIGNATURE)
    }

    /// List all files in the ZIP archive.
    ///
    /// Reads everything from the start of the Central Directory up to and
    /// including the EOCD signature in one read, then walks the file headers
    /// until the EOCD signature is reached.
    ///
    /// # Returns
    ///
    /// A vector of [`ZipFileEntry`] structures in central directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read. No
    /// entries are returned when any header is bad.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>, ArchiveError> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        let cd_offset = eocd.cd_offset as u64;

        let mut cd_data = vec![0u8; (eocd_offset - cd_offset) as usize + 4];
        self.reader
            .read_exact_at(cd_offset, &mut cd_data)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "central directory"))?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        loop {
            let at = cd_offset + cursor.position();
            let signature = cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| ArchiveError::eof_as_truncated(e, "central directory"))?;
            match signature {
                EndOfCentralDirectory::SIGNATURE => break,
                CDFH_SIGNATURE => {
                    let entry = parse_cdfh(&mut cursor)
                        .map_err(|e| ArchiveError::eof_as_truncated(e, "central directory"))?;
                    tracing::trace!(
                        name = %entry.file_name,
                        lfh_offset = entry.lfh_offset,
                        size = entry.compressed_size,
                        "found central directory entry"
                    );
                    entries.push(entry);
                }
                found => return Err(ArchiveError::UnexpectedSignature { offset: at, found }),
            }
        }

        Ok(entries)
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry, so the
    /// header itself is read to find where the payload begins.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidLocalHeader`] if the LFH signature is
    /// missing at the recorded offset.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64, ArchiveError> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "local file header"))?;

        if read_signature(&lfh_buf, 0) != LFH_SIGNATURE {
            return Err(ArchiveError::InvalidLocalHeader {
                name: entry.file_name.clone(),
            });
        }

        // Name and extra lengths sit at fixed positions 26 and 28.
        let file_name_length = u16::from_le_bytes([lfh_buf[26], lfh_buf[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh_buf[28], lfh_buf[29]]) as u64;

        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset + entry.compressed_size > self.size {
            return Err(ArchiveError::Truncated { what: "entry data" });
        }

        Ok(data_offset)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Total size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Parse a Central Directory File Header whose signature was just consumed.
///
/// Leaves the cursor at the next header (or the EOCD signature).
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> std::io::Result<ZipFileEntry> {
    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    let is_directory = file_name.ends_with('/');

    cursor.set_position(cursor.position() + extra_field_length as u64 + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        is_directory,
    })
}

fn read_signature(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
