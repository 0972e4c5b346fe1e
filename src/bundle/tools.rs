//! External tools the pipeline drives.
//!
//! Every tool runs as a blocking subprocess. Output is captured and only
//! surfaces when the tool fails, as the message of a [`ToolError`].

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::error::ToolError;

pub const BUNDLETOOL_VERSION: &str = "0.6.1";

/// Inputs of the feature module link step.
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    pub manifest: &'a Path,
    pub assets: &'a Path,
    /// Base package the feature resources link against.
    pub base_package: &'a Path,
    pub compiled_resources: &'a Path,
    pub output: &'a Path,
}

/// The collaborators a bundle build depends on.
pub trait Toolchain {
    /// Produce the binary-format package at `output`.
    fn build_package(&self, output: &Path) -> Result<(), ToolError>;

    /// Convert a binary-format package to the protocol-buffer format.
    fn convert(&self, package: &Path, output: &Path) -> Result<(), ToolError>;

    /// Compile one resource file into `output_dir`.
    fn compile_resources(&self, input: &Path, output_dir: &Path) -> Result<(), ToolError>;

    /// Link a feature module into a protocol-buffer format package.
    fn link(&self, request: &LinkRequest<'_>) -> Result<(), ToolError>;

    /// Assemble module archives into an app bundle.
    fn build_bundle(&self, modules: &[PathBuf], config: &Path, output: &Path)
    -> Result<(), ToolError>;

    /// Build the device-specific installable set container from a bundle.
    fn build_apks(&self, bundle: &Path, output: &Path) -> Result<(), ToolError>;

    /// Sign `archive` in place.
    fn sign(&self, archive: &Path) -> Result<(), ToolError>;

    /// Files read by the tools that must exist before the build starts.
    fn inputs(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Where the binary-format package comes from.
#[derive(Debug, Clone)]
pub enum PackageSource {
    /// Copy an already built package.
    Prebuilt(PathBuf),
    /// Run a build command. `{output}` in any argument is replaced by the
    /// package path; without a placeholder the path is appended.
    Command(Vec<String>),
}

/// Signing key material.
#[derive(Debug, Clone)]
pub struct Keystore {
    pub path: PathBuf,
    pub store_password: String,
    pub alias: String,
    pub key_password: String,
}

impl Keystore {
    /// The Android SDK debug keystore in the user's home directory, if it
    /// has been created.
    pub fn debug() -> Option<Self> {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
        let path = PathBuf::from(home).join(".android").join("debug.keystore");
        if !path.is_file() {
            return None;
        }
        Some(Self {
            path,
            store_password: "android".to_string(),
            alias: "androiddebugkey".to_string(),
            key_password: "android".to_string(),
        })
    }
}

/// Locations of the tool binaries.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub aapt2: PathBuf,
    pub java: PathBuf,
    pub jarsigner: PathBuf,
    pub bundletool_jar: PathBuf,
    pub android_jar: PathBuf,
}

impl ToolPaths {
    /// Every tool looked up on `PATH`; no platform jar.
    pub fn new(bundletool_jar: PathBuf) -> Self {
        Self {
            aapt2: PathBuf::from(exe("aapt2")),
            java: PathBuf::from(exe("java")),
            jarsigner: PathBuf::from(exe("jarsigner")),
            bundletool_jar,
            android_jar: PathBuf::new(),
        }
    }

    /// Take aapt2 and android.jar from an Android SDK.
    pub fn with_sdk(mut self, sdk_root: &Path, build_tools_version: &str, platform: &str) -> Self {
        self.aapt2 = sdk_root
            .join("build-tools")
            .join(build_tools_version)
            .join(exe("aapt2"));
        self.android_jar = sdk_root.join("platforms").join(platform).join("android.jar");
        self
    }
}

/// Default bundletool jar location, `Library/` under the current directory.
/// The directory is created if missing.
pub fn default_bundletool_jar() -> io::Result<PathBuf> {
    let dir = std::env::current_dir()?.join("Library");
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!("bundletool-all-{BUNDLETOOL_VERSION}.jar")))
}

fn exe(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Toolchain backed by aapt2, bundletool and jarsigner on this machine.
#[derive(Debug, Clone)]
pub struct CommandLineToolchain {
    pub paths: ToolPaths,
    pub package: PackageSource,
    pub keystore: Option<Keystore>,
}

impl CommandLineToolchain {
    fn bundletool(&self, subcommand: &str, mut args: Vec<OsString>) -> Result<(), ToolError> {
        let mut full = vec![
            OsString::from("-jar"),
            self.paths.bundletool_jar.clone().into_os_string(),
            OsString::from(subcommand),
        ];
        full.append(&mut args);
        run_tool(&self.paths.java, full)
    }
}

impl Toolchain for CommandLineToolchain {
    fn build_package(&self, output: &Path) -> Result<(), ToolError> {
        match &self.package {
            PackageSource::Prebuilt(path) => {
                fs::copy(path, output)
                    .map_err(|e| ToolError::new(format!("{}: {e}", path.display())))?;
                Ok(())
            }
            PackageSource::Command(argv) => {
                let Some((program, args)) = argv.split_first() else {
                    return Err(ToolError::new("empty build command"));
                };
                run_tool(program, substitute_output(args, output))
            }
        }
    }

    fn convert(&self, package: &Path, output: &Path) -> Result<(), ToolError> {
        run_tool(
            &self.paths.aapt2,
            [
                OsStr::new("convert"),
                OsStr::new("--output-format"),
                OsStr::new("proto"),
                OsStr::new("-o"),
                output.as_os_str(),
                package.as_os_str(),
            ],
        )
    }

    fn compile_resources(&self, input: &Path, output_dir: &Path) -> Result<(), ToolError> {
        run_tool(
            &self.paths.aapt2,
            [
                OsStr::new("compile"),
                OsStr::new("-o"),
                output_dir.as_os_str(),
                input.as_os_str(),
            ],
        )
    }

    fn link(&self, request: &LinkRequest<'_>) -> Result<(), ToolError> {
        run_tool(
            &self.paths.aapt2,
            [
                OsStr::new("link"),
                OsStr::new("--proto-format"),
                OsStr::new("-o"),
                request.output.as_os_str(),
                OsStr::new("-I"),
                self.paths.android_jar.as_os_str(),
                OsStr::new("-I"),
                request.base_package.as_os_str(),
                OsStr::new("--manifest"),
                request.manifest.as_os_str(),
                OsStr::new("-A"),
                request.assets.as_os_str(),
                request.compiled_resources.as_os_str(),
            ],
        )
    }

    fn build_bundle(
        &self,
        modules: &[PathBuf],
        config: &Path,
        output: &Path,
    ) -> Result<(), ToolError> {
        let modules = modules
            .iter()
            .map(|m| m.to_string_lossy())
            .collect::<Vec<_>>()
            .join(",");
        self.bundletool(
            "build-bundle",
            vec![
                flag("--config=", config.as_os_str()),
                flag("--modules=", OsStr::new(&modules)),
                flag("--output=", output.as_os_str()),
            ],
        )
    }

    fn build_apks(&self, bundle: &Path, output: &Path) -> Result<(), ToolError> {
        let mut args = Vec::new();
        if let Some(ks) = &self.keystore {
            args.push(flag("--ks=", ks.path.as_os_str()));
            args.push(OsString::from(format!("--ks-pass=pass:{}", ks.store_password)));
            args.push(OsString::from(format!("--ks-key-alias={}", ks.alias)));
            args.push(OsString::from(format!("--key-pass=pass:{}", ks.key_password)));
        }
        args.push(flag("--bundle=", bundle.as_os_str()));
        args.push(flag("--output=", output.as_os_str()));
        self.bundletool("build-apks", args)
    }

    fn sign(&self, archive: &Path) -> Result<(), ToolError> {
        let Some(ks) = &self.keystore else {
            return Err(ToolError::new("no keystore configured"));
        };
        run_tool(
            &self.paths.jarsigner,
            [
                OsStr::new("-keystore"),
                ks.path.as_os_str(),
                OsStr::new("-storepass"),
                OsStr::new(&ks.store_password),
                OsStr::new("-keypass"),
                OsStr::new(&ks.key_password),
                archive.as_os_str(),
                OsStr::new(&ks.alias),
            ],
        )
    }

    fn inputs(&self) -> Vec<PathBuf> {
        match &self.package {
            PackageSource::Prebuilt(path) => vec![path.clone()],
            PackageSource::Command(_) => Vec::new(),
        }
    }
}

fn flag(name: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(value);
    arg
}

fn substitute_output(args: &[String], output: &Path) -> Vec<OsString> {
    let output = output.to_string_lossy();
    let mut substituted = false;
    let mut result: Vec<OsString> = args
        .iter()
        .map(|arg| {
            if arg.contains("{output}") {
                substituted = true;
                OsString::from(arg.replace("{output}", &output))
            } else {
                OsString::from(arg)
            }
        })
        .collect();
    if !substituted {
        result.push(OsString::from(output.as_ref()));
    }
    result
}

/// Run `program` to completion. A non-zero exit becomes a [`ToolError`]
/// carrying the tool's stderr followed by its stdout.
pub fn run_tool<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<(), ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let mut command = Command::new(program);
    command.args(args);
    tracing::debug!(?command, "running tool");

    let output = command.output().map_err(|e| {
        ToolError::new(format!("could not start {}: {e}", program.to_string_lossy()))
    })?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if message.is_empty() {
        Err(ToolError::new(format!("exited with {}", output.status)))
    } else {
        Err(ToolError::new(message))
    }
}
