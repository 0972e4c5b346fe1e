use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::error::ArchiveError;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;
    /// Offset of the central directory pointer within the record.
    pub const CD_OFFSET_FIELD: usize = 16;

    pub fn from_bytes(data: &[u8]) -> Result<Self, ArchiveError> {
        if data.len() < Self::SIZE {
            return Err(ArchiveError::Truncated {
                what: "end of central directory",
            });
        }

        let mut cursor = Cursor::new(data);
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != Self::SIGNATURE {
            return Err(ArchiveError::EocdNotFound);
        }

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
pub const LFH_SIZE: usize = 30;

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// An entry is stored when it was written without compression and both
    /// recorded sizes agree.
    pub fn is_stored(&self) -> bool {
        self.compression_method == CompressionMethod::Stored
            && self.compressed_size == self.uncompressed_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eocd_from_bytes() {
        let mut record = Vec::new();
        record.extend_from_slice(&EndOfCentralDirectory::SIGNATURE.to_le_bytes());
        record.extend_from_slice(&[0, 0, 0, 0]);
        record.extend_from_slice(&3u16.to_le_bytes());
        record.extend_from_slice(&3u16.to_le_bytes());
        record.extend_from_slice(&120u32.to_le_bytes());
        record.extend_from_slice(&4096u32.to_le_bytes());
        record.extend_from_slice(&0u16.to_le_bytes());

        let eocd = EndOfCentralDirectory::from_bytes(&record).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 120);
        assert_eq!(eocd.cd_offset, 4096);
        assert_eq!(
            &record[EndOfCentralDirectory::CD_OFFSET_FIELD..EndOfCentralDirectory::CD_OFFSET_FIELD + 4],
            &4096u32.to_le_bytes()
        );
    }

    #[test]
    fn test_eocd_rejects_short_record() {
        let err = EndOfCentralDirectory::from_bytes(&[0x50, 0x4b, 0x05, 0x06]).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated { .. }));
    }
}
