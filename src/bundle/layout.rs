//! Module directory layout of an app bundle.
//!
//! A converted package is a flat tree (`AndroidManifest.xml`, `resources.pb`,
//! `classes*.dex`, `assets/`, `lib/`, `res/`, ...). A bundle module wants the
//! same content regrouped:
//!
//! ```text
//! module/
//! ├── manifest/AndroidManifest.xml
//! ├── dex/            # *dex
//! ├── assets/
//! ├── lib/
//! ├── res/
//! ├── root/           # everything else
//! └── resources.pb
//! ```
//!
//! `META-INF/` from the converted package is dropped.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Android manifest, in protocol-buffer form after conversion.
pub const MANIFEST_FILE: &str = "AndroidManifest.xml";
/// Compiled resource table; the only file kept at the module root.
pub const RESOURCE_TABLE_FILE: &str = "resources.pb";
/// Files whose name ends with this go to `dex/`. There is no dot, so
/// optimized `.odex` files match as well.
pub const DEX_SUFFIX: &str = "dex";
/// Signature directory of the package; bundletool signs the bundle anew.
pub const SIGNATURE_DIR: &str = "META-INF";

pub const MANIFEST_DIR: &str = "manifest";
pub const DEX_DIR: &str = "dex";
pub const ASSETS_DIR: &str = "assets";
pub const LIB_DIR: &str = "lib";
pub const RES_DIR: &str = "res";
pub const ROOT_DIR: &str = "root";

/// Where one top-level item of the converted package ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// `manifest/<name>`
    Manifest,
    /// `<name>` at the module root
    ResourceTable,
    /// `dex/<name>`
    Dex,
    /// Whole directory moved to the module directory of the same name
    Named(&'static str),
    /// `root/<name>`
    Root,
    /// Not copied
    Drop,
}

impl Placement {
    /// Classify a regular file by name.
    pub fn for_file(name: &str) -> Self {
        if name == MANIFEST_FILE {
            Placement::Manifest
        } else if name == RESOURCE_TABLE_FILE {
            Placement::ResourceTable
        } else if name.ends_with(DEX_SUFFIX) {
            Placement::Dex
        } else {
            Placement::Root
        }
    }

    /// Classify a directory by name.
    pub fn for_dir(name: &str) -> Self {
        match name {
            SIGNATURE_DIR => Placement::Drop,
            ASSETS_DIR => Placement::Named(ASSETS_DIR),
            LIB_DIR => Placement::Named(LIB_DIR),
            RES_DIR => Placement::Named(RES_DIR),
            _ => Placement::Root,
        }
    }

    /// Destination of an item called `name` under `destination`.
    pub fn target(&self, destination: &Path, name: &OsStr) -> Option<PathBuf> {
        match self {
            Placement::Manifest => Some(destination.join(MANIFEST_DIR).join(name)),
            Placement::ResourceTable => Some(destination.join(name)),
            Placement::Dex => Some(destination.join(DEX_DIR).join(name)),
            Placement::Named(dir) => Some(destination.join(dir)),
            Placement::Root => Some(destination.join(ROOT_DIR).join(name)),
            Placement::Drop => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArrangeError {
    /// Target already exists; the converted package is malformed
    #[error("destination already exists: {path:?}")]
    Collision { path: PathBuf },

    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArrangeError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArrangeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Move the contents of `source` into module layout under `destination`.
///
/// Files are handled before directories, each group in name order. Every
/// item is moved, never copied, so `source` is empty afterwards. Moving
/// onto an existing path is an error rather than an overwrite.
///
/// Returns the number of items moved.
pub fn arrange(source: &Path, destination: &Path) -> Result<usize, ArrangeError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(source).map_err(|e| ArrangeError::io(source, e))? {
        let entry = entry.map_err(|e| ArrangeError::io(source, e))?;
        let file_type = entry.file_type().map_err(|e| ArrangeError::io(&entry.path(), e))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();

    let mut moved = 0;
    for path in &files {
        let placement = Placement::for_file(&item_name(path));
        if place(path, placement, destination)? {
            moved += 1;
        }
    }
    for path in &dirs {
        let placement = Placement::for_dir(&item_name(path));
        if placement == Placement::Drop {
            tracing::debug!(path = %path.display(), "dropping signature directory");
            fs::remove_dir_all(path).map_err(|e| ArrangeError::io(path, e))?;
            continue;
        }
        if place(path, placement, destination)? {
            moved += 1;
        }
    }

    Ok(moved)
}

fn item_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn place(path: &Path, placement: Placement, destination: &Path) -> Result<bool, ArrangeError> {
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    let Some(target) = placement.target(destination, name) else {
        return Ok(false);
    };

    if fs::symlink_metadata(&target).is_ok() {
        return Err(ArrangeError::Collision { path: target });
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ArrangeError::io(parent, e))?;
    }
    fs::rename(path, &target).map_err(|e| ArrangeError::io(path, e))?;
    tracing::trace!(from = %path.display(), to = %target.display(), "moved");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_rules_in_priority_order() {
        assert_eq!(Placement::for_file("AndroidManifest.xml"), Placement::Manifest);
        assert_eq!(Placement::for_file("resources.pb"), Placement::ResourceTable);
        assert_eq!(Placement::for_file("classes.dex"), Placement::Dex);
        assert_eq!(Placement::for_file("classes2.dex"), Placement::Dex);
        assert_eq!(Placement::for_file("classes.odex"), Placement::Dex);
        assert_eq!(Placement::for_file("dexopt.txt"), Placement::Root);
        assert_eq!(Placement::for_file("resources.arsc"), Placement::Root);
        assert_eq!(Placement::for_file("androidmanifest.xml"), Placement::Root);
    }

    #[test]
    fn test_dir_rules() {
        assert_eq!(Placement::for_dir("META-INF"), Placement::Drop);
        assert_eq!(Placement::for_dir("assets"), Placement::Named("assets"));
        assert_eq!(Placement::for_dir("lib"), Placement::Named("lib"));
        assert_eq!(Placement::for_dir("res"), Placement::Named("res"));
        assert_eq!(Placement::for_dir("kotlin"), Placement::Root);
    }

    #[test]
    fn test_targets() {
        let dest = Path::new("/d");
        let name = OsStr::new("AndroidManifest.xml");
        assert_eq!(
            Placement::Manifest.target(dest, name),
            Some(PathBuf::from("/d/manifest/AndroidManifest.xml"))
        );
        assert_eq!(
            Placement::Named("lib").target(dest, OsStr::new("lib")),
            Some(PathBuf::from("/d/lib"))
        );
        assert_eq!(Placement::Drop.target(dest, name), None);
    }

    #[test]
    fn test_collision_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        let dest = tmp.path().join("destination");
        fs::create_dir_all(source.join("assets")).unwrap();
        fs::create_dir_all(dest.join("assets")).unwrap();

        match arrange(&source, &dest) {
            Err(ArrangeError::Collision { path }) => assert_eq!(path, dest.join("assets")),
            other => panic!("expected collision, got {other:?}"),
        }
    }
}
