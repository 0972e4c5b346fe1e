use flate2::read::DeflateDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::io::{LocalFileReader, ReadAt};

use super::error::ArchiveError;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl ZipExtractor<LocalFileReader> {
    /// Open the archive at `path` for extraction.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        Ok(Self::new(LocalFileReader::new(path)?))
    }
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>, ArchiveError> {
        self.parser.list_files()
    }

    /// Extract file data to memory, verifying its CRC-32.
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>, ArchiveError> {
        let data_offset = self.parser.get_data_offset(entry)?;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "entry data"))?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(ArchiveError::UnsupportedMethod {
                    name: entry.file_name.clone(),
                    method,
                });
            }
        };

        let mut crc = flate2::Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(ArchiveError::CrcMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }

    /// Extract file to disk
    pub fn extract_to_file(
        &self,
        entry: &ZipFileEntry,
        output_path: &Path,
    ) -> Result<(), ArchiveError> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = self.extract_to_memory(entry)?;
        fs::write(output_path, data)?;

        Ok(())
    }

    /// Unpack every entry under `dest`, keeping the archive's directory
    /// structure. Returns the number of files written.
    pub fn extract_all(&self, dest: &Path) -> Result<usize, ArchiveError> {
        let entries = self.list_files()?;
        fs::create_dir_all(dest)?;

        let mut written = 0;
        for entry in &entries {
            let target = enclosed_path(dest, &entry.file_name)?;
            if entry.is_directory {
                fs::create_dir_all(&target)?;
                continue;
            }
            self.extract_to_file(entry, &target)?;
            written += 1;
        }

        tracing::debug!(dest = %dest.display(), files = written, "unpacked archive");
        Ok(written)
    }
}

/// Join an archive name onto `dest`, refusing absolute paths and `..`.
fn enclosed_path(dest: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut path = dest.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(ArchiveError::UnsafePath {
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosed_path() {
        let dest = Path::new("/tmp/out");
        assert_eq!(
            enclosed_path(dest, "assets/a.txt").unwrap(),
            PathBuf::from("/tmp/out/assets/a.txt")
        );
        assert!(enclosed_path(dest, "../evil").is_err());
        assert!(enclosed_path(dest, "/etc/passwd").is_err());
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let mut archive =
            crate::zip::parser::tests::build_archive(&[("a", b"payload")], &[], &[]);
        // Flip one payload byte after the 31-byte local header.
        archive[31] ^= 0xFF;
        let extractor = ZipExtractor::new(archive);
        let entries = extractor.list_files().unwrap();
        assert!(matches!(
            extractor.extract_to_memory(&entries[0]),
            Err(ArchiveError::CrcMismatch { .. })
        ));
    }
}
