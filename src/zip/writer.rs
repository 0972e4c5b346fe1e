use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::CompressionMethod as ZipMethod;
use zip::write::SimpleFileOptions;

/// Packs a directory tree into a zip archive.
///
/// Only regular files become entries; names are relative to the packed
/// directory, `/`-separated, and written in sorted order so packing the
/// same tree twice yields the same entry list.
#[derive(Debug, Clone, Copy)]
pub struct ZipPacker {
    method: ZipMethod,
}

impl ZipPacker {
    /// Deflate every entry. Module archives are written this way.
    pub fn deflated() -> Self {
        Self {
            method: ZipMethod::Deflated,
        }
    }

    /// Store every entry uncompressed, so it can be indexed by
    /// [`ArchiveIndex`](super::ArchiveIndex).
    pub fn stored() -> Self {
        Self {
            method: ZipMethod::Stored,
        }
    }

    /// Write every file under `source` into a new archive at `output`.
    /// Returns the number of entries written.
    pub fn pack_directory(&self, source: &Path, output: &Path) -> io::Result<usize> {
        let mut files = Vec::new();
        collect_files(source, &mut files)?;
        files.sort();

        let mut writer = zip::ZipWriter::new(File::create(output)?);
        let options = SimpleFileOptions::default()
            .compression_method(self.method)
            .large_file(false);

        for path in &files {
            let name = entry_name(source, path)?;
            writer.start_file(name.as_str(), options).map_err(io::Error::other)?;
            let mut file = File::open(path)?;
            io::copy(&mut file, &mut writer)?;
        }

        writer.finish().map_err(io::Error::other)?;
        tracing::debug!(
            source = %source.display(),
            output = %output.display(),
            entries = files.len(),
            "packed directory"
        );
        Ok(files.len())
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn entry_name(base: &Path, path: &Path) -> io::Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| io::Error::other(format!("{} is outside {}", path.display(), base.display())))?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let base = Path::new("/work/destination");
        let path = base.join("lib").join("x86").join("libfoo.so");
        assert_eq!(entry_name(base, &path).unwrap(), "lib/x86/libfoo.so");
    }

    #[test]
    fn test_entry_name_outside_base() {
        assert!(entry_name(Path::new("/a"), Path::new("/b/c")).is_err());
    }
}
