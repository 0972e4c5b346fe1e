//! Name → byte range index over the stored entries of a zip archive.
//!
//! Large payloads packed without compression can be handed to a consumer as
//! an `(offset, size)` pair into the archive file instead of being unzipped.
//! The index is built once by [`ArchiveIndex::open`]; the file handle used
//! for parsing is closed before `open` returns and every later read reopens
//! the file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::io::{LocalFileReader, ReadAt};

use super::error::ArchiveError;
use super::parser::ZipParser;

/// Location of one stored entry's payload inside the archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    /// First byte of the entry data, past the local header.
    pub offset: u64,
    pub size: u64,
}

/// Descriptor a downstream loader can use to read an entry straight from
/// the archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub offset: u64,
    pub size: u64,
}

impl LoadRequest {
    /// Open the archive positioned at the entry, limited to its bytes.
    pub fn open(&self) -> io::Result<io::Take<File>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        Ok(file.take(self.size))
    }
}

/// Immutable index of a zip archive whose entries are all stored.
#[derive(Debug)]
pub struct ArchiveIndex {
    path: PathBuf,
    entries: HashMap<String, ArchiveEntry>,
}

impl ArchiveIndex {
    /// Parse the central directory of the archive at `path`.
    ///
    /// Fails on the first structural problem: a missing end record or
    /// central directory, a compressed entry, or a repeated name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let reader = LocalFileReader::new(path)?;
        let entries = index_entries(&ZipParser::new(reader))?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "indexed archive");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Path of the indexed archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up an entry by its full archive path.
    pub fn get(&self, name: &str) -> Result<&ArchiveEntry, ArchiveError> {
        self.entries
            .get(name)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                name: name.to_string(),
            })
    }

    /// All entries in archive order.
    pub fn entries(&self) -> Vec<&ArchiveEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.offset);
        entries
    }

    /// Read an entry's bytes, reopening the archive file.
    pub fn read_bytes(&self, entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
        tracing::debug!(name = %entry.name, offset = entry.offset, size = entry.size, "loading entry");
        let reader = LocalFileReader::new(&self.path)?;
        let mut buf = vec![0u8; entry.size as usize];
        reader
            .read_exact_at(entry.offset, &mut buf)
            .map_err(|e| ArchiveError::eof_as_truncated(e, "entry data"))?;
        Ok(buf)
    }

    /// Read the bytes of the entry named `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.read_bytes(self.get(name)?)
    }

    /// Offset and length of `name` for loaders that read the file themselves.
    pub fn load_request(&self, name: &str) -> Result<LoadRequest, ArchiveError> {
        let entry = self.get(name)?;
        Ok(LoadRequest {
            path: self.path.clone(),
            offset: entry.offset,
            size: entry.size,
        })
    }
}

fn index_entries<R: ReadAt>(
    parser: &ZipParser<R>,
) -> Result<HashMap<String, ArchiveEntry>, ArchiveError> {
    let mut entries = HashMap::new();

    for file in parser.list_files()? {
        if !file.is_stored() {
            return Err(ArchiveError::CompressedEntry {
                name: file.file_name,
            });
        }

        let offset = parser.get_data_offset(&file)?;
        if entries.contains_key(&file.file_name) {
            return Err(ArchiveError::DuplicateEntry {
                name: file.file_name,
            });
        }

        entries.insert(
            file.file_name.clone(),
            ArchiveEntry {
                name: file.file_name,
                offset,
                size: file.compressed_size,
            },
        );
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::parser::tests::build_archive;

    fn index_of(archive: Vec<u8>) -> Result<HashMap<String, ArchiveEntry>, ArchiveError> {
        index_entries(&ZipParser::new(archive))
    }

    #[test]
    fn test_offsets_point_at_payload() {
        let archive = build_archive(
            &[("Bundles/one", b"first payload"), ("Bundles/two", b"second")],
            &[1, 2, 3],
            &[],
        );
        let entries = index_of(archive.clone()).unwrap();

        for (name, data) in [("Bundles/one", &b"first payload"[..]), ("Bundles/two", b"second")] {
            let entry = &entries[name];
            let start = entry.offset as usize;
            assert_eq!(&archive[start..start + entry.size as usize], data);
        }
    }

    #[test]
    fn test_size_mismatch_fails_whole_archive() {
        let mut archive = build_archive(&[("ok", b"aaaa"), ("bad", b"bbbb")], &[], &[]);
        // Patch the second central header's uncompressed size.
        let cd_offset = (30 + 2 + 4) + (30 + 3 + 4);
        let second = cd_offset + 46 + 2;
        archive[second + 24..second + 28].copy_from_slice(&99u32.to_le_bytes());

        match index_of(archive) {
            Err(ArchiveError::CompressedEntry { name }) => assert_eq!(name, "bad"),
            other => panic!("expected CompressedEntry, got {other:?}"),
        }
    }

    #[test]
    fn test_deflate_method_rejected() {
        let mut archive = build_archive(&[("x", b"1234")], &[], &[]);
        let cd_offset = 30 + 1 + 4;
        archive[cd_offset + 10..cd_offset + 12].copy_from_slice(&8u16.to_le_bytes());
        assert!(matches!(
            index_of(archive),
            Err(ArchiveError::CompressedEntry { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let archive = build_archive(&[("same", b"1"), ("same", b"2")], &[], &[]);
        assert!(matches!(
            index_of(archive),
            Err(ArchiveError::DuplicateEntry { .. })
        ));
    }
}
