//! # playbundle
//!
//! Build Android App Bundles from a single built package, and read stored
//! payloads out of zip archives by byte offset.
//!
//! ## Features
//!
//! - Convert a binary-format package into a bundle base module
//! - Optionally add an on-demand feature module carrying an asset payload
//! - Assemble and sign the bundle through aapt2, bundletool and jarsigner
//! - Index the stored (uncompressed) entries of a zip by name, so large
//!   payloads can be read in place instead of unzipped
//! - Unpack zip archives with STORED and DEFLATE entries
//!
//! ## Example
//!
//! ```no_run
//! use playbundle::{ArchiveIndex, BundleRegistry, LoadMode};
//!
//! fn main() -> anyhow::Result<()> {
//!     let index = ArchiveIndex::open("Bundles.zip")?;
//!     for entry in index.entries() {
//!         println!("{} @ {} ({} bytes)", entry.name, entry.offset, entry.size);
//!     }
//!
//!     let mut registry = BundleRegistry::new();
//!     let bundle = registry.load(&index, "Bundles/examplebundle", LoadMode::File)?;
//!     println!("{} bytes", bundle.size());
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod io;
pub mod registry;
pub mod zip;

pub use bundle::{BuildError, BuildReport, BuildRequest, BundleBuilder, FeatureModule};
pub use cli::Cli;
pub use io::{LocalFileReader, ReadAt};
pub use registry::{BundleRegistry, LoadMode, LoadedBundle};
pub use zip::{ArchiveEntry, ArchiveError, ArchiveIndex, ZipExtractor, ZipFileEntry, ZipPacker};
