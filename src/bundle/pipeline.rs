//! End-to-end app bundle build.
//!
//! Stages run strictly in order and the first failure ends the run:
//!
//! 1. build the binary-format package
//! 2. convert it to protocol-buffer format
//! 3. unpack the converted package
//! 4. arrange it into module layout
//! 5. zip the base module
//! 6. optionally synthesize, link and zip a feature module
//! 7. assemble all module zips into the bundle
//! 8. sign the bundle

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::zip::{ZipExtractor, ZipPacker};

use super::config::bundle_config_json;
use super::context::{BASE_MODULE, BuildContext, ModuleDirs, RESERVED_NAMES};
use super::documents::{FEATURE_STRINGS_XML, feature_manifest, is_valid_identifier};
use super::error::{BuildError, Stage, ToolError};
use super::layout::{ASSETS_DIR, MANIFEST_FILE, arrange};
use super::progress::{ClearOnDrop, ProgressSink};
use super::tools::{LinkRequest, Toolchain};

/// Optional on-demand module carrying extra assets.
#[derive(Debug, Clone)]
pub struct FeatureModule {
    /// Module name, also the split name in its manifest.
    pub name: String,
    /// Application id of the base package.
    pub package: String,
    /// File placed under the module's `assets/`.
    pub payload: PathBuf,
}

/// What to build and where.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Bundle to write; replaced if it exists.
    pub output: PathBuf,
    /// Working root; destroyed and recreated by every run.
    pub work_dir: PathBuf,
    pub feature: Option<FeatureModule>,
    pub keep_work_dir: bool,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub output: PathBuf,
    /// Names of the bundled modules, base first.
    pub modules: Vec<String>,
}

/// Drives a build against a [`Toolchain`], reporting to a [`ProgressSink`].
pub struct BundleBuilder<'a> {
    toolchain: &'a dyn Toolchain,
    progress: &'a dyn ProgressSink,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, progress: &'a dyn ProgressSink) -> Self {
        Self {
            toolchain,
            progress,
        }
    }

    /// Build and sign the bundle described by `request`.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let _clear = ClearOnDrop(self.progress);
        validate(request, &self.toolchain.inputs())?;

        let mut ctx = BuildContext::create(&request.work_dir, &request.output)
            .map_err(|e| BuildError::fs(Stage::Prepare, &request.work_dir, e))?;
        if request.keep_work_dir {
            ctx.keep();
        }
        tracing::info!(work_dir = %ctx.root().display(), "starting bundle build");

        self.progress.report("Building package", 0.0);
        let package = ctx.package_path();
        self.toolchain
            .build_package(&package)
            .map_err(|e| BuildError::tool(Stage::Compile, e))?;
        if !package.is_file() {
            return Err(BuildError::Compile(format!(
                "no package was produced at {}",
                package.display()
            )));
        }

        self.progress.report("Running aapt2", 0.2);
        let base = ctx.base_dirs();
        let intermediate = intermediate_path(&base, BASE_MODULE);
        self.toolchain
            .convert(&package, &intermediate)
            .map_err(|e| BuildError::tool(Stage::Convert, e))?;

        self.progress.report("Creating base module", 0.4);
        let base_zip = ctx.module_zip(BASE_MODULE);
        self.assemble_module(&intermediate, &base, &base_zip)?;
        ctx.push_module(base_zip);

        if let Some(feature) = &request.feature {
            self.progress.report("Creating feature module", 0.5);
            let feature_zip = self.build_feature_module(&ctx, &package, feature)?;
            ctx.push_module(feature_zip);
        }

        self.progress.report("Running bundletool", 0.6);
        self.assemble_bundle(&ctx)?;

        self.progress.report("Signing bundle", 0.8);
        self.toolchain
            .sign(ctx.output())
            .map_err(|e| BuildError::tool(Stage::Sign, e))?;

        let modules = ctx.modules().iter().map(|m| module_name(m)).collect();
        tracing::info!(output = %ctx.output().display(), ?modules, "bundle built");
        Ok(BuildReport {
            output: ctx.output().to_path_buf(),
            modules,
        })
    }

    /// Unpack a converted package, arrange it and zip it as a module.
    fn assemble_module(
        &self,
        intermediate: &Path,
        dirs: &ModuleDirs,
        zip: &Path,
    ) -> Result<(), BuildError> {
        {
            let extractor = ZipExtractor::open(intermediate)
                .map_err(|e| BuildError::archive(Stage::Unpack, e))?;
            extractor
                .extract_all(&dirs.source)
                .map_err(|e| BuildError::archive(Stage::Unpack, e))?;
        }
        fs::remove_file(intermediate).map_err(|e| BuildError::fs(Stage::Unpack, intermediate, e))?;

        let moved = arrange(&dirs.source, &dirs.destination).map_err(BuildError::arrange)?;
        tracing::debug!(module = %dirs.root.display(), moved, "arranged module");

        ZipPacker::deflated()
            .pack_directory(&dirs.destination, zip)
            .map_err(|e| BuildError::fs(Stage::ZipModule, zip, e))?;
        Ok(())
    }

    fn build_feature_module(
        &self,
        ctx: &BuildContext,
        base_package: &Path,
        feature: &FeatureModule,
    ) -> Result<PathBuf, BuildError> {
        let dirs = ctx
            .feature_dirs(&feature.name)
            .map_err(|e| BuildError::fs(Stage::Prepare, ctx.root(), e))?;

        let assets = dirs.root.join(ASSETS_DIR);
        copy_payload(&feature.payload, &assets)
            .map_err(|e| BuildError::fs(Stage::FeatureAssets, &feature.payload, e))?;

        let values = ctx.values_dir();
        let strings = values.join("strings.xml");
        fs::create_dir_all(&values)
            .and_then(|_| fs::write(&strings, FEATURE_STRINGS_XML))
            .map_err(|e| BuildError::fs(Stage::FeatureResources, &strings, e))?;

        let compiled = ctx.compiled_dir();
        fs::create_dir_all(&compiled)
            .map_err(|e| BuildError::fs(Stage::FeatureResources, &compiled, e))?;
        self.toolchain
            .compile_resources(&strings, &compiled)
            .map_err(|e| BuildError::tool(Stage::FeatureResources, e))?;
        let compiled_resources = first_file(&compiled)
            .map_err(|e| BuildError::fs(Stage::FeatureResources, &compiled, e))?
            .ok_or_else(|| {
                BuildError::tool(
                    Stage::FeatureResources,
                    ToolError::new("no compiled resources were produced"),
                )
            })?;

        let manifest = dirs.root.join(MANIFEST_FILE);
        fs::write(
            &manifest,
            feature_manifest(&feature.package, &feature.name, false),
        )
        .map_err(|e| BuildError::fs(Stage::FeatureManifest, &manifest, e))?;

        let intermediate = intermediate_path(&dirs, &feature.name);
        self.toolchain
            .link(&LinkRequest {
                manifest: &manifest,
                assets: &assets,
                base_package,
                compiled_resources: &compiled_resources,
                output: &intermediate,
            })
            .map_err(|e| BuildError::tool(Stage::FeatureLink, e))?;

        let zip = ctx.module_zip(&feature.name);
        self.assemble_module(&intermediate, &dirs, &zip)?;
        Ok(zip)
    }

    fn assemble_bundle(&self, ctx: &BuildContext) -> Result<(), BuildError> {
        let output = ctx.output();
        // The caller has already agreed to replace an existing bundle.
        match fs::remove_file(output) {
            Ok(()) => tracing::debug!(output = %output.display(), "removed existing bundle"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::fs(Stage::Assemble, output, e)),
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BuildError::fs(Stage::Assemble, parent, e))?;
        }

        let config = ctx.bundle_config_path();
        fs::write(&config, bundle_config_json())
            .map_err(|e| BuildError::fs(Stage::Assemble, &config, e))?;

        self.toolchain
            .build_bundle(ctx.modules(), &config, output)
            .map_err(|e| BuildError::tool(Stage::Assemble, e))
    }
}

/// Reject requests whose working root would swallow files the build needs
/// or the user keeps. The root is wiped before any stage runs.
fn validate(request: &BuildRequest, inputs: &[PathBuf]) -> Result<(), BuildError> {
    let work_dir = &request.work_dir;
    if request.output.starts_with(work_dir) {
        return Err(BuildError::Configuration(format!(
            "output {} is inside the working directory",
            request.output.display()
        )));
    }
    let protected = std::env::current_dir()
        .ok()
        .into_iter()
        .chain(home_dir());
    for dir in protected {
        if dir.starts_with(work_dir) {
            return Err(BuildError::Configuration(format!(
                "working directory {} contains {}",
                work_dir.display(),
                dir.display()
            )));
        }
    }
    let feature_payload = request.feature.as_ref().map(|f| &f.payload);
    for input in inputs.iter().chain(feature_payload) {
        if input.starts_with(work_dir) {
            return Err(BuildError::Configuration(format!(
                "input {} is inside the working directory",
                input.display()
            )));
        }
    }

    let Some(feature) = &request.feature else {
        return Ok(());
    };
    if !is_valid_identifier(&feature.name) || RESERVED_NAMES.contains(&feature.name.as_str()) {
        return Err(BuildError::Configuration(format!(
            "invalid feature module name {:?}",
            feature.name
        )));
    }
    if !is_valid_identifier(&feature.package) {
        return Err(BuildError::Configuration(format!(
            "invalid application id {:?}",
            feature.package
        )));
    }
    if !feature.payload.is_file() {
        return Err(BuildError::fs(
            Stage::FeatureAssets,
            &feature.payload,
            io::Error::new(io::ErrorKind::NotFound, "feature payload is not a file"),
        ));
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Converted packages are written next to, not inside, the source tree.
fn intermediate_path(dirs: &ModuleDirs, module: &str) -> PathBuf {
    dirs.root.join(format!("{module}.proto.zip"))
}

fn copy_payload(payload: &Path, assets: &Path) -> io::Result<()> {
    let name = payload
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "payload has no file name"))?;
    fs::create_dir_all(assets)?;
    fs::copy(payload, assets.join(name))?;
    Ok(())
}

fn first_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}

fn module_name(zip: &Path) -> String {
    zip.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
