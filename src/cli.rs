use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::bundle::Keystore;

#[derive(Parser, Debug)]
#[command(name = "playbundle")]
#[command(version)]
#[command(about = "Build Android App Bundles and read stored zip entries in place", long_about = None)]
#[command(after_help = "Examples:\n  \
  playbundle build --apk game.apk game.aab           bundle a prebuilt package\n  \
  playbundle build game.aab -- make apk OUT={output}  build the package first\n  \
  playbundle build --apk game.apk --package com.example.game \\\n      \
  --feature-assets Bundles.zip game.aab          add a feature module\n  \
  playbundle list -v Bundles.zip                     show entry offsets\n  \
  playbundle cat Bundles.zip Bundles/examplebundle   write one entry to stdout")]
pub struct Cli {
    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log filter for the chosen quietness.
    pub fn log_level(&self) -> &'static str {
        match self.quiet {
            0 => "info",
            1 => "warn",
            _ => "error",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and sign an app bundle
    Build(BuildArgs),
    /// Build installable sets from a bundle and unpack them beside it
    Run(RunArgs),
    /// List the stored entries of a zip with their offsets
    List {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// List verbosely
        #[arg(short = 'v')]
        verbose: bool,
    },
    /// Write one stored entry to stdout
    Cat {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Entry name
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Extract every entry of a zip
    Unpack {
        /// ZIP file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Bundle to write
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Prebuilt binary-format package
    #[arg(
        long,
        value_name = "APK",
        conflicts_with = "build_command",
        required_unless_present = "build_command"
    )]
    pub apk: Option<PathBuf>,

    /// Command that builds the package, after `--`; `{output}` is replaced
    /// by its path
    #[arg(last = true, value_name = "ARGV")]
    pub build_command: Vec<String>,

    /// Application id of the package
    #[arg(long, value_name = "ID")]
    pub package: Option<String>,

    /// File to ship in an on-demand feature module
    #[arg(long, value_name = "FILE", requires = "package")]
    pub feature_assets: Option<PathBuf>,

    /// Feature module name
    #[arg(long, value_name = "NAME", default_value = "feature")]
    pub feature_name: String,

    /// Android SDK root
    #[arg(long, value_name = "DIR", env = "ANDROID_SDK_ROOT")]
    pub sdk_root: Option<PathBuf>,

    /// build-tools version holding aapt2
    #[arg(long, value_name = "VERSION", default_value = "28.0.3")]
    pub build_tools: String,

    /// Platform whose android.jar feature resources link against
    #[arg(long, value_name = "PLATFORM", default_value = "android-27")]
    pub platform: String,

    /// aapt2 binary, overriding the SDK lookup
    #[arg(long, value_name = "PATH")]
    pub aapt2: Option<PathBuf>,

    /// java binary
    #[arg(long, value_name = "PATH")]
    pub java: Option<PathBuf>,

    /// jarsigner binary
    #[arg(long, value_name = "PATH")]
    pub jarsigner: Option<PathBuf>,

    /// bundletool jar
    #[arg(long, value_name = "PATH")]
    pub bundletool_jar: Option<PathBuf>,

    #[command(flatten)]
    pub keystore: KeystoreArgs,

    /// Working directory, destroyed and recreated by each build
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Keep the working directory after the build
    #[arg(long)]
    pub keep_work_dir: bool,

    /// Overwrite an existing bundle WITHOUT prompting
    #[arg(short = 'o', long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Bundle to build installable sets from
    #[arg(value_name = "BUNDLE")]
    pub bundle: PathBuf,

    /// java binary
    #[arg(long, value_name = "PATH")]
    pub java: Option<PathBuf>,

    /// bundletool jar
    #[arg(long, value_name = "PATH")]
    pub bundletool_jar: Option<PathBuf>,

    #[command(flatten)]
    pub keystore: KeystoreArgs,
}

#[derive(Args, Debug, Clone)]
pub struct KeystoreArgs {
    /// Keystore (default: ~/.android/debug.keystore)
    #[arg(long, value_name = "PATH", requires = "ks_alias")]
    pub keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, value_name = "PASS", env = "PLAYBUNDLE_KS_PASS", hide_env_values = true)]
    pub ks_pass: Option<String>,

    /// Key alias
    #[arg(long, value_name = "ALIAS")]
    pub ks_alias: Option<String>,

    /// Key password (default: keystore password)
    #[arg(long, value_name = "PASS", env = "PLAYBUNDLE_KEY_PASS", hide_env_values = true)]
    pub key_pass: Option<String>,
}

impl KeystoreArgs {
    /// Key material to sign with; the debug keystore unless one was given.
    pub fn resolve(&self) -> Option<Keystore> {
        let Some(path) = &self.keystore else {
            return Keystore::debug();
        };
        let store_password = self.ks_pass.clone().unwrap_or_default();
        Some(Keystore {
            path: path.clone(),
            key_password: self
                .key_pass
                .clone()
                .unwrap_or_else(|| store_password.clone()),
            store_password,
            alias: self.ks_alias.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_package_source() {
        assert!(Cli::try_parse_from(["playbundle", "build", "out.aab"]).is_err());
        let cli = Cli::try_parse_from(["playbundle", "build", "--apk", "game.apk", "out.aab"]).unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.apk, Some(PathBuf::from("game.apk")));
        assert_eq!(args.feature_name, "feature");
    }

    #[test]
    fn test_build_command_follows_output() {
        let cli = Cli::try_parse_from([
            "playbundle", "build", "out.aab", "--", "make", "-j4", "apk", "OUT={output}",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.output, PathBuf::from("out.aab"));
        assert_eq!(args.apk, None);
        assert_eq!(args.build_command, vec!["make", "-j4", "apk", "OUT={output}"]);

        let both = Cli::try_parse_from([
            "playbundle", "build", "--apk", "game.apk", "out.aab", "--", "make",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_feature_assets_require_package() {
        let result = Cli::try_parse_from([
            "playbundle",
            "build",
            "--apk",
            "game.apk",
            "--feature-assets",
            "Bundles.zip",
            "out.aab",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_levels() {
        let cli = Cli::try_parse_from(["playbundle", "-qq", "list", "a.zip"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn test_explicit_keystore() {
        let args = KeystoreArgs {
            keystore: Some(PathBuf::from("release.jks")),
            ks_pass: Some("secret".to_string()),
            ks_alias: Some("upload".to_string()),
            key_pass: None,
        };
        let ks = args.resolve().unwrap();
        assert_eq!(ks.key_password, "secret");
        assert_eq!(ks.alias, "upload");
    }
}
