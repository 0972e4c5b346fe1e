use std::fs;
use std::path::{Path, PathBuf};

use playbundle::bundle::{ArrangeError, arrange};

fn converted_package(dir: &Path) {
    fs::create_dir_all(dir.join("assets")).unwrap();
    fs::create_dir_all(dir.join("lib/x86")).unwrap();
    fs::create_dir_all(dir.join("META-INF")).unwrap();
    fs::write(dir.join("AndroidManifest.xml"), b"<manifest/>").unwrap();
    fs::write(dir.join("resources.pb"), b"table").unwrap();
    fs::write(dir.join("classes.dex"), b"dex").unwrap();
    fs::write(dir.join("assets/foo.txt"), b"foo").unwrap();
    fs::write(dir.join("lib/x86/libfoo.so"), b"elf").unwrap();
    fs::write(dir.join("META-INF/MANIFEST.MF"), b"sig").unwrap();
}

/// Every file under `dir`, relative and `/`-separated, sorted.
fn tree(dir: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let relative = path.strip_prefix(base).unwrap();
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

fn dirs(tmp: &Path) -> (PathBuf, PathBuf) {
    let source = tmp.join("source");
    let destination = tmp.join("destination");
    fs::create_dir_all(&destination).unwrap();
    (source, destination)
}

#[test]
fn test_arrange_converted_package() {
    let tmp = tempfile::tempdir().unwrap();
    let (source, destination) = dirs(tmp.path());
    converted_package(&source);

    let moved = arrange(&source, &destination).unwrap();

    assert_eq!(moved, 5);
    assert_eq!(
        tree(&destination),
        vec![
            "assets/foo.txt",
            "dex/classes.dex",
            "lib/x86/libfoo.so",
            "manifest/AndroidManifest.xml",
            "resources.pb",
        ]
    );
    assert!(!destination.join("META-INF").exists());
    assert_eq!(fs::read_dir(&source).unwrap().count(), 0);
    assert_eq!(fs::read(destination.join("dex/classes.dex")).unwrap(), b"dex");
}

#[test]
fn test_arrange_is_repeatable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut results = Vec::new();
    for run in ["first", "second"] {
        let (source, destination) = dirs(&tmp.path().join(run));
        converted_package(&source);
        arrange(&source, &destination).unwrap();
        results.push(tree(&destination));
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_other_items_go_to_root() {
    let tmp = tempfile::tempdir().unwrap();
    let (source, destination) = dirs(tmp.path());
    fs::create_dir_all(source.join("kotlin")).unwrap();
    fs::create_dir_all(source.join("res/drawable")).unwrap();
    fs::write(source.join("kotlin/collections.kotlin_builtins"), b"k").unwrap();
    fs::write(source.join("res/drawable/icon.png"), b"png").unwrap();
    fs::write(source.join("classes2.dex"), b"dex2").unwrap();
    fs::write(source.join("build-data.properties"), b"p").unwrap();
    fs::write(source.join("dexopt.txt"), b"not dex").unwrap();

    arrange(&source, &destination).unwrap();

    assert_eq!(
        tree(&destination),
        vec![
            "dex/classes2.dex",
            "res/drawable/icon.png",
            "root/build-data.properties",
            "root/dexopt.txt",
            "root/kotlin/collections.kotlin_builtins",
        ]
    );
}

#[test]
fn test_arrange_refuses_to_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let (source, destination) = dirs(tmp.path());
    converted_package(&source);
    fs::create_dir_all(destination.join("manifest")).unwrap();
    fs::write(destination.join("manifest/AndroidManifest.xml"), b"old").unwrap();

    let err = arrange(&source, &destination).unwrap_err();

    assert!(matches!(err, ArrangeError::Collision { .. }));
    assert_eq!(
        fs::read(destination.join("manifest/AndroidManifest.xml")).unwrap(),
        b"old"
    );
}

#[test]
fn test_arrange_missing_source() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, destination) = dirs(tmp.path());

    let err = arrange(&tmp.path().join("absent"), &destination).unwrap_err();
    assert!(matches!(err, ArrangeError::Io { .. }));
}
