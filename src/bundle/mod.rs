//! Android App Bundle assembly.
//!
//! - [`layout`]: arranging a converted package into module layout
//! - [`context`]: the per-run working directory
//! - [`tools`]: external tool collaborators
//! - [`pipeline`]: the staged build
//! - [`runner`]: building installable sets from a finished bundle

pub mod config;
pub mod context;
pub mod documents;
mod error;
pub mod layout;
mod pipeline;
mod progress;
mod runner;
pub mod tools;

pub use context::BuildContext;
pub use error::{BuildError, Stage, ToolError};
pub use layout::{ArrangeError, Placement, arrange};
pub use pipeline::{BuildReport, BuildRequest, BundleBuilder, FeatureModule};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use runner::run_bundle;
pub use tools::{CommandLineToolchain, Keystore, LinkRequest, PackageSource, ToolPaths, Toolchain};
