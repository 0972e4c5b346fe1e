use std::fs;
use std::path::{Path, PathBuf};

use crate::zip::ZipExtractor;

use super::error::{BuildError, Stage};
use super::progress::{ClearOnDrop, ProgressSink};
use super::tools::Toolchain;

pub const UNPACKED_DIR: &str = "unpacked";
pub const APKS_FILE: &str = "unpacked.apks";

/// Build the installable sets for `bundle` and unpack them into an
/// `unpacked/` directory beside it, which is emptied first.
///
/// Returns the `unpacked/` directory.
pub fn run_bundle(
    toolchain: &dyn Toolchain,
    progress: &dyn ProgressSink,
    bundle: &Path,
) -> Result<PathBuf, BuildError> {
    let _clear = ClearOnDrop(progress);
    if !bundle.is_file() {
        return Err(BuildError::fs(
            Stage::BuildApks,
            bundle,
            std::io::Error::new(std::io::ErrorKind::NotFound, "bundle not found"),
        ));
    }

    progress.report("Extracting apks from bundle", 0.1);
    let folder = bundle
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let unpacked = folder.join(UNPACKED_DIR);
    if unpacked.exists() {
        fs::remove_dir_all(&unpacked).map_err(|e| BuildError::fs(Stage::Prepare, &unpacked, e))?;
    }
    fs::create_dir_all(&unpacked).map_err(|e| BuildError::fs(Stage::Prepare, &unpacked, e))?;

    let apks = unpacked.join(APKS_FILE);
    toolchain
        .build_apks(bundle, &apks)
        .map_err(|e| BuildError::tool(Stage::BuildApks, e))?;

    progress.report("Unpacking apks", 0.6);
    let files = ZipExtractor::open(&apks)
        .and_then(|extractor| extractor.extract_all(&unpacked))
        .map_err(|e| BuildError::archive(Stage::Unpack, e))?;

    tracing::info!(dir = %unpacked.display(), files, "unpacked installable sets");
    Ok(unpacked)
}
