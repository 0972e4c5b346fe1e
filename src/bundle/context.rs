//! Working directory of one bundle build.
//!
//! ```text
//! <root>/
//! ├── package.apk          # output of the platform build
//! ├── BundleConfig.json    # bundler configuration
//! ├── source/              # base module: converted package, unpacked
//! ├── destination/         # base module: arranged layout
//! ├── base.zip
//! ├── res/values/strings.xml
//! ├── compiled/            # compiled feature resources
//! ├── <feature>/
//! │   ├── AndroidManifest.xml
//! │   ├── assets/
//! │   ├── source/
//! │   └── destination/
//! └── <feature>.zip
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const BASE_MODULE: &str = "base";

/// Names a feature module may not take because the working root already
/// uses them.
pub const RESERVED_NAMES: &[&str] = &["source", "destination", "res", "compiled", BASE_MODULE];

/// Staging directories of one module.
#[derive(Debug, Clone)]
pub struct ModuleDirs {
    pub root: PathBuf,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ModuleDirs {
    fn under(root: PathBuf) -> Self {
        Self {
            source: root.join("source"),
            destination: root.join("destination"),
            root,
        }
    }

    fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.source)?;
        fs::create_dir_all(&self.destination)
    }
}

/// Transient state of a single build.
///
/// Creating a context destroys whatever a previous run left at the same
/// root. The root is removed again on drop unless [`keep`](Self::keep)
/// was called.
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    output: PathBuf,
    modules: Vec<PathBuf>,
    keep: bool,
}

impl BuildContext {
    pub fn create(root: impl AsRef<Path>, output: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            tracing::debug!(root = %root.display(), "removing previous working directory");
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;

        let context = Self {
            root,
            output: output.as_ref().to_path_buf(),
            modules: Vec::new(),
            keep: false,
        };
        context.base_dirs().create()?;
        Ok(context)
    }

    /// Leave the working directory in place after the build.
    pub fn keep(&mut self) {
        self.keep = true;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final bundle path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn package_path(&self) -> PathBuf {
        self.root.join("package.apk")
    }

    pub fn bundle_config_path(&self) -> PathBuf {
        self.root.join("BundleConfig.json")
    }

    pub fn base_dirs(&self) -> ModuleDirs {
        ModuleDirs::under(self.root.clone())
    }

    /// Staging directories for feature `name`, created on first call.
    pub fn feature_dirs(&self, name: &str) -> io::Result<ModuleDirs> {
        let dirs = ModuleDirs::under(self.root.join(name));
        dirs.create()?;
        Ok(dirs)
    }

    pub fn values_dir(&self) -> PathBuf {
        self.root.join("res").join("values")
    }

    pub fn compiled_dir(&self) -> PathBuf {
        self.root.join("compiled")
    }

    /// Archive path for module `name`. Bundletool takes the module name
    /// from the file stem.
    pub fn module_zip(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.zip"))
    }

    pub fn push_module(&mut self, zip: PathBuf) {
        self.modules.push(zip);
    }

    /// Module archives produced so far, base first.
    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            tracing::warn!(root = %self.root.display(), %err, "failed to remove working directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_replaces_previous_run() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("work");
        fs::create_dir_all(root.join("stale")).unwrap();
        fs::write(root.join("stale").join("old.txt"), b"old").unwrap();

        let context = BuildContext::create(&root, tmp.path().join("app.aab")).unwrap();
        assert!(!root.join("stale").exists());
        assert!(context.base_dirs().source.is_dir());
        assert!(context.base_dirs().destination.is_dir());
    }

    #[test]
    fn test_drop_removes_root_unless_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("work");

        drop(BuildContext::create(&root, "out.aab").unwrap());
        assert!(!root.exists());

        let mut context = BuildContext::create(&root, "out.aab").unwrap();
        context.keep();
        drop(context);
        assert!(root.exists());
    }

    #[test]
    fn test_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("work");
        let context = BuildContext::create(&root, "out.aab").unwrap();
        assert_eq!(context.module_zip("base"), root.join("base.zip"));

        let feature = context.feature_dirs("feature").unwrap();
        assert_eq!(feature.root, root.join("feature"));
        assert!(feature.source.is_dir());
        assert_eq!(context.values_dir(), root.join("res").join("values"));
    }
}
