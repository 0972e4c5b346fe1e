//! Main entry point for the playbundle CLI application.
//!
//! Builds app bundles through the Android command-line tools, and inspects
//! zip archives whose stored entries are read in place.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use playbundle::bundle::tools::{BUNDLETOOL_VERSION, default_bundletool_jar};
use playbundle::bundle::{
    BuildRequest, BundleBuilder, CommandLineToolchain, FeatureModule, LogProgress, PackageSource,
    ToolPaths, run_bundle,
};
use playbundle::cli::{BuildArgs, Command, RunArgs};
use playbundle::{ArchiveIndex, Cli, ZipExtractor};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and dispatches to the
/// handler of the chosen subcommand.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Build(args) => build(args),
        Command::Run(args) => run(args),
        Command::List { file, verbose } => list_entries(&file, verbose),
        Command::Cat { file, name } => cat_entry(&file, &name),
        Command::Unpack { file, extract_dir } => unpack(&file, &extract_dir),
    }
}

/// Build and sign a bundle.
fn build(args: BuildArgs) -> Result<()> {
    if args.output.exists() && !args.overwrite {
        bail!(
            "{} already exists (use -o to overwrite)",
            args.output.display()
        );
    }

    let bundletool_jar = resolve_bundletool(args.bundletool_jar)?;
    let mut paths = ToolPaths::new(bundletool_jar);
    let sdk_root = args
        .sdk_root
        .or_else(|| std::env::var_os("ANDROID_HOME").map(PathBuf::from));
    match sdk_root {
        Some(root) => paths = paths.with_sdk(&root, &args.build_tools, &args.platform),
        None if args.feature_assets.is_some() => {
            bail!("feature modules need an Android SDK; pass --sdk-root or set ANDROID_SDK_ROOT")
        }
        None => tracing::warn!("no Android SDK given, taking aapt2 from PATH"),
    }
    if let Some(aapt2) = args.aapt2 {
        paths.aapt2 = aapt2;
    }
    if let Some(java) = args.java {
        paths.java = java;
    }
    if let Some(jarsigner) = args.jarsigner {
        paths.jarsigner = jarsigner;
    }

    let package = match args.apk {
        Some(apk) => PackageSource::Prebuilt(std::path::absolute(&apk)?),
        None => PackageSource::Command(args.build_command),
    };
    let toolchain = CommandLineToolchain {
        paths,
        package,
        keystore: args.keystore.resolve(),
    };
    if toolchain.keystore.is_none() {
        bail!("no keystore to sign with; pass --keystore or create ~/.android/debug.keystore");
    }

    let feature = match args.feature_assets {
        Some(payload) => Some(FeatureModule {
            name: args.feature_name,
            package: args.package.unwrap_or_default(),
            payload: std::path::absolute(&payload)?,
        }),
        None => None,
    };
    let work_dir = args
        .work_dir
        .unwrap_or_else(|| std::env::temp_dir().join("play-bundle"));
    let request = BuildRequest {
        output: std::path::absolute(&args.output)?,
        work_dir: std::path::absolute(&work_dir)?,
        feature,
        keep_work_dir: args.keep_work_dir,
    };

    let report = BundleBuilder::new(&toolchain, &LogProgress).build(&request)?;
    let size = std::fs::metadata(&report.output)
        .map(|m| m.len())
        .unwrap_or_default();
    println!(
        "{} ({}, modules: {})",
        report.output.display(),
        format_size(size),
        report.modules.join(", ")
    );
    Ok(())
}

/// Build installable sets from a bundle and unpack them beside it.
fn run(args: RunArgs) -> Result<()> {
    let mut paths = ToolPaths::new(resolve_bundletool(args.bundletool_jar)?);
    if let Some(java) = args.java {
        paths.java = java;
    }
    let toolchain = CommandLineToolchain {
        paths,
        package: PackageSource::Command(Vec::new()),
        keystore: args.keystore.resolve(),
    };

    let unpacked = run_bundle(&toolchain, &LogProgress, &args.bundle)?;
    println!("{}", unpacked.display());
    Ok(())
}

/// The bundletool jar to use, failing early when it is missing.
fn resolve_bundletool(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let jar = match explicit {
        Some(jar) => jar,
        None => default_bundletool_jar().context("cannot prepare the Library directory")?,
    };
    if !jar.is_file() {
        bail!(
            "bundletool not found at {}; download bundletool-all-{BUNDLETOOL_VERSION}.jar there or pass --bundletool-jar",
            jar.display()
        );
    }
    Ok(jar)
}

/// List the stored entries of an archive.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Verbose format (`-v`): table with data offset and size
fn list_entries(file: &Path, verbose: bool) -> Result<()> {
    let index = ArchiveIndex::open(file)?;
    let entries = index.entries();

    if !verbose {
        for entry in &entries {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!("{:>12}  {:>12}  Name", "Offset", "Size");
    println!("{}", "-".repeat(50));
    let mut total = 0u64;
    for entry in &entries {
        println!("{:>12}  {:>12}  {}", entry.offset, entry.size, entry.name);
        total += entry.size;
    }
    println!("{}", "-".repeat(50));
    println!(
        "{:>12}  {:>12}  {} entries ({})",
        "",
        total,
        entries.len(),
        format_size(total)
    );
    Ok(())
}

/// Write one stored entry to stdout.
fn cat_entry(file: &Path, name: &str) -> Result<()> {
    let index = ArchiveIndex::open(file)?;
    let request = index.load_request(name)?;
    let mut data = request
        .open()
        .with_context(|| format!("cannot open {}", file.display()))?;
    let mut stdout = std::io::stdout().lock();
    std::io::copy(&mut data, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Extract every entry of an archive into `dest`.
fn unpack(file: &Path, dest: &Path) -> Result<()> {
    let extractor = ZipExtractor::open(file)?;
    let count = extractor.extract_all(dest)?;
    tracing::info!(files = count, dest = %dest.display(), "unpacked");
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
