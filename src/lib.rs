//! spotinstall library
//!
//! Builds the spotifyd audio-streaming daemon from source and installs it as
//! a systemd service. Every host interaction goes through a
//! [`CommandRunner`], so the whole run can be exercised against a fake.

pub mod cli;
pub mod command_runner;
pub mod config;
pub mod error;
pub mod install_state;
pub mod installer;
pub mod manifest;
pub mod process_guard;
pub mod sanity;
pub mod steps;

#[doc(hidden)]
pub mod testing;

// Re-export main types for convenience
pub use command_runner::{CommandOutput, CommandRunner, SystemRunner, ToolCommand};
pub use config::{AssetKind, AssetSource, ProvisionConfig};
pub use error::{ProvisionError, StepFailure};
pub use install_state::{ProvisionContext, ProvisionStage, StageTransitionError};
pub use installer::{ProvisionReport, Provisioner, RunOptions};
pub use manifest::{InstallManifest, ManifestEntry};
pub use sanity::Privilege;
pub use steps::assets::{AssetVerifier, Sha256Verifier};
