use std::fs;
use std::io::Read;
use std::path::Path;

use playbundle::registry::{BundleData, RegistryError};
use playbundle::{ArchiveError, ArchiveIndex, BundleRegistry, LoadMode, ZipPacker};

fn payload_dir(dir: &Path) {
    fs::create_dir_all(dir.join("Bundles")).unwrap();
    fs::write(dir.join("Bundles/examplebundle"), b"UnityFS\0bundle payload").unwrap();
    fs::write(dir.join("Bundles/empty"), b"").unwrap();
    fs::write(dir.join("readme.txt"), vec![b'x'; 4096]).unwrap();
}

fn stored_archive(tmp: &Path) -> std::path::PathBuf {
    let source = tmp.join("payload");
    payload_dir(&source);
    let archive = tmp.join("Bundles.zip");
    ZipPacker::stored().pack_directory(&source, &archive).unwrap();
    archive
}

#[test]
fn test_index_stored_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = stored_archive(tmp.path());

    let index = ArchiveIndex::open(&archive).unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(index.path(), archive);

    let raw = fs::read(&archive).unwrap();
    for entry in index.entries() {
        let expected = fs::read(tmp.path().join("payload").join(&entry.name)).unwrap();
        assert_eq!(entry.size, expected.len() as u64);
        let start = entry.offset as usize;
        assert_eq!(&raw[start..start + expected.len()], expected.as_slice());
        assert_eq!(index.read_bytes(entry).unwrap(), expected);
    }

    let empty = index.get("Bundles/empty").unwrap();
    assert_eq!(empty.size, 0);
    assert!(index.read("Bundles/empty").unwrap().is_empty());
}

#[test]
fn test_entries_are_in_archive_order() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();

    let offsets: Vec<_> = index.entries().iter().map(|e| e.offset).collect();
    let mut sorted = offsets.clone();
    sorted.sort();
    assert_eq!(offsets, sorted);
}

#[test]
fn test_load_request_reads_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();

    let request = index.load_request("Bundles/examplebundle").unwrap();
    let mut data = Vec::new();
    request.open().unwrap().read_to_end(&mut data).unwrap();
    assert_eq!(data, b"UnityFS\0bundle payload");
}

#[test]
fn test_missing_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();

    assert!(!index.contains("Bundles/other"));
    assert!(matches!(
        index.get("Bundles/other"),
        Err(ArchiveError::EntryNotFound { .. })
    ));
}

#[test]
fn test_deflated_archive_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("payload");
    payload_dir(&source);
    let archive = tmp.path().join("deflated.zip");
    ZipPacker::deflated().pack_directory(&source, &archive).unwrap();

    assert!(matches!(
        ArchiveIndex::open(&archive),
        Err(ArchiveError::CompressedEntry { .. })
    ));
}

#[test]
fn test_short_file_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("short.zip");
    fs::write(&archive, b"PK\x05\x06").unwrap();

    assert!(matches!(
        ArchiveIndex::open(&archive),
        Err(ArchiveError::TooShort { len: 4 })
    ));
}

#[test]
fn test_garbage_file_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("garbage.zip");
    fs::write(&archive, vec![0xAB; 1024]).unwrap();

    assert!(matches!(
        ArchiveIndex::open(&archive),
        Err(ArchiveError::EocdNotFound)
    ));
}

#[test]
fn test_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(matches!(
        ArchiveIndex::open(tmp.path().join("absent.zip")),
        Err(ArchiveError::Io(_))
    ));
}

#[test]
fn test_registry_load_modes() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();
    let mut registry = BundleRegistry::new();

    let bundle = registry
        .load(&index, "Bundles/examplebundle", LoadMode::Memory)
        .unwrap();
    assert_eq!(bundle.size(), 22);
    assert_eq!(
        bundle.data,
        BundleData::Memory(b"UnityFS\0bundle payload".to_vec())
    );

    let bundle = registry
        .load(&index, "readme.txt", LoadMode::File)
        .unwrap();
    let BundleData::File(request) = &bundle.data else {
        panic!("expected a file load");
    };
    assert_eq!(request.size, 4096);
    assert_eq!(request.offset, index.get("readme.txt").unwrap().offset);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_rejects_double_load() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();
    let mut registry = BundleRegistry::new();

    registry
        .load(&index, "Bundles/examplebundle", LoadMode::File)
        .unwrap();
    assert!(matches!(
        registry.load(&index, "Bundles/examplebundle", LoadMode::Memory),
        Err(RegistryError::AlreadyLoaded { .. })
    ));
    assert!(matches!(
        registry.load(&index, "Bundles/absent", LoadMode::Memory),
        Err(RegistryError::Archive(ArchiveError::EntryNotFound { .. }))
    ));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_registry_unload() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ArchiveIndex::open(stored_archive(tmp.path())).unwrap();
    let mut registry = BundleRegistry::new();

    registry.load(&index, "Bundles/examplebundle", LoadMode::File).unwrap();
    registry.load(&index, "readme.txt", LoadMode::File).unwrap();

    let unloaded = registry.unload("readme.txt").unwrap();
    assert_eq!(unloaded.name, "readme.txt");
    assert!(registry.unload("readme.txt").is_none());
    assert!(registry.get("Bundles/examplebundle").is_some());

    // An unloaded bundle can be loaded again.
    registry.load(&index, "readme.txt", LoadMode::Memory).unwrap();
    assert_eq!(registry.unload_all(), 2);
    assert!(registry.is_empty());
}
