use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::zip::ArchiveError;

use super::layout::ArrangeError;

/// Step of a bundle build, used to tag errors and progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Compile,
    Convert,
    Unpack,
    Arrange,
    ZipModule,
    FeatureAssets,
    FeatureResources,
    FeatureManifest,
    FeatureLink,
    Assemble,
    Sign,
    BuildApks,
}

impl Stage {
    /// Short tag shown in front of error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Prepare => "Working directory",
            Stage::Compile => "Build",
            Stage::Convert => "aapt2",
            Stage::Unpack => "Unzip",
            Stage::Arrange => "Arrange",
            Stage::ZipModule => "Zip creation",
            Stage::FeatureAssets => "Feature assets",
            Stage::FeatureResources => "aapt2 compile",
            Stage::FeatureManifest => "Feature manifest",
            Stage::FeatureLink => "aapt2 link",
            Stage::Assemble => "bundletool",
            Stage::Sign => "Signing",
            Stage::BuildApks => "bundletool build-apks",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Failure reported by an external tool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Captured output of the tool, or why it could not be started
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<io::Error> for ToolError {
    fn from(err: io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result of any pipeline step. Every failure aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The platform build step did not produce a package
    #[error("Build failed. {0}")]
    Compile(String),

    /// An external tool exited unsuccessfully
    #[error("{stage}: failed: {message}")]
    Tool {
        stage: Stage,
        message: String,
    },

    /// An archive could not be read
    #[error("{stage}: failed: {source}")]
    Archive {
        stage: Stage,
        #[source]
        source: ArchiveError,
    },

    /// A file or directory operation failed
    #[error("{stage}: failed: {path:?}: {source}")]
    FileSystem {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Arrangement would have overwritten an earlier file
    #[error("{stage}: failed: destination already exists: {path:?}")]
    Collision { stage: Stage, path: PathBuf },

    /// Caller supplied nothing usable to build
    #[error("configuration: {0}")]
    Configuration(String),
}

impl BuildError {
    pub fn tool(stage: Stage, err: ToolError) -> Self {
        if stage == Stage::Compile {
            return BuildError::Compile(err.message);
        }
        BuildError::Tool {
            stage,
            message: err.message,
        }
    }

    pub fn archive(stage: Stage, source: ArchiveError) -> Self {
        BuildError::Archive { stage, source }
    }

    pub fn fs(stage: Stage, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BuildError::FileSystem {
            stage,
            path: path.into(),
            source,
        }
    }

    pub fn arrange(err: ArrangeError) -> Self {
        match err {
            ArrangeError::Collision { path } => BuildError::Collision {
                stage: Stage::Arrange,
                path,
            },
            ArrangeError::Io { path, source } => BuildError::fs(Stage::Arrange, path, source),
        }
    }

    /// Stage the error came from, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BuildError::Compile(_) => Some(Stage::Compile),
            BuildError::Tool { stage, .. }
            | BuildError::Archive { stage, .. }
            | BuildError::FileSystem { stage, .. }
            | BuildError::Collision { stage, .. } => Some(*stage),
            BuildError::Configuration(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_message_is_tagged() {
        let err = BuildError::tool(Stage::Convert, ToolError::new("error: bad apk"));
        assert_eq!(err.to_string(), "aapt2: failed: error: bad apk");
        assert_eq!(err.stage(), Some(Stage::Convert));
    }

    #[test]
    fn test_compile_stage_reports_build_failed() {
        let err = BuildError::tool(Stage::Compile, ToolError::new("exit status 1"));
        assert!(err.to_string().starts_with("Build failed."));
    }
}
