//! Error handling module for spotinstall
//!
//! Every failure surfaces as a [`StepFailure`]: the stage that was running,
//! a typed cause ([`ProvisionError`]) and the process exit code. `main` owns
//! the single abort routine that prints it and terminates.

use std::path::PathBuf;

use thiserror::Error;

use crate::install_state::{ProvisionStage, StageTransitionError};

/// Typed cause of a failed provisioning step
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// IO errors (file operations, checksum reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Neither root nor a usable sudo
    #[error("Privilege error: {0}")]
    Privilege(String),

    /// Required host tools are not installed
    #[error("Missing required tools: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    /// The external program could not be started at all
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran and exited non-zero
    #[error("{context} failed (exit code {code}){}", format_detail(.detail))]
    CommandFailed {
        context: String,
        code: i32,
        detail: String,
    },

    /// An asset download failed
    #[error("Failed to download {url}")]
    Fetch { url: String },

    /// A downloaded asset did not match its pinned checksum
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// cargo is still missing after running the rustup installer
    #[error("cargo is still not available after running the rustup installer; see {0}")]
    ToolchainUnavailable(String),

    /// The checkout directory exists but cannot be read
    #[error("Source directory {} exists but is not accessible: {source}", .path.display())]
    SourceInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stage machine misuse
    #[error("Stage transition error: {0}")]
    Transition(#[from] StageTransitionError),
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a privilege error
    pub fn privilege(msg: impl Into<String>) -> Self {
        Self::Privilege(msg.into())
    }
}

/// A step that aborted the run.
#[derive(Error, Debug)]
#[error("{stage}: {source}")]
pub struct StepFailure {
    /// Stage that was running when the failure happened
    pub stage: ProvisionStage,
    #[source]
    pub source: ProvisionError,
}

impl StepFailure {
    /// Uniform exit code for every aborted run
    pub const EXIT_CODE: i32 = 1;

    pub fn new(stage: ProvisionStage, source: ProvisionError) -> Self {
        Self { stage, source }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        Self::EXIT_CODE
    }

    /// Hint printed after the failure message
    pub fn rerun_hint(&self) -> Option<&'static str> {
        match self.source {
            ProvisionError::Config(_) => {
                Some("Fix the configuration file and run spotinstall again.")
            }
            ProvisionError::Privilege(_) => {
                Some("Run spotinstall as root, or install sudo for the invoking user.")
            }
            ProvisionError::Transition(_) => None,
            _ => Some(
                "Fix the problem above and run spotinstall again; completed steps are skipped.",
            ),
        }
    }
}
