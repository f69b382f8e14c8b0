//! Pre-flight sanity checks for the runtime environment
//!
//! Runs once before any step:
//! - Required host tools are present
//! - The installer can obtain root (already root, or sudo is available)
//!
//! The privilege decision made here is the only one; privileged commands are
//! wrapped by the runner according to it.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{ProvisionError, Result};
use crate::process_guard::CommandLifecycle;

/// How privileged commands get root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Effective UID is 0; run privileged commands directly
    Root,
    /// Prefix privileged commands with sudo
    Sudo,
}

impl Privilege {
    /// Decide how to escalate, or fail if there is no way to.
    pub fn detect() -> Result<Self> {
        if is_running_as_root() {
            Ok(Self::Root)
        } else if binary_exists("sudo") {
            Ok(Self::Sudo)
        } else {
            Err(ProvisionError::privilege(
                "not running as root and sudo is not installed",
            ))
        }
    }
}

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub privilege: Option<Privilege>,
}

/// Host tools the installer needs before it can install anything else.
/// git and curl come from the package list itself.
const REQUIRED_BINARIES: &[&str] = &[
    "sh",         // rustup installer pipeline
    "dpkg-query", // package presence checks
    "apt-get",    // package installation
    "systemctl",  // service control
    "install",    // file installation (coreutils)
];

/// Check if a binary is available in PATH
pub fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .die_with_parent()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment() -> SanityCheckResult {
    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|binary| !binary_exists(binary))
        .map(|binary| (*binary).to_string())
        .collect();

    let privilege = match Privilege::detect() {
        Ok(privilege) => Some(privilege),
        Err(e) => {
            debug!("privilege detection failed: {}", e);
            None
        }
    };

    SanityCheckResult {
        missing_binaries,
        privilege,
    }
}

/// Verify the environment and return the privilege mode to run with.
///
/// In dry-run nothing privileged executes, so a missing privilege is only a
/// warning there.
pub fn run_preflight_checks(dry_run: bool) -> Result<Privilege> {
    debug!("Running pre-flight sanity checks (dry_run={})...", dry_run);

    let result = verify_environment();

    if !result.missing_binaries.is_empty() {
        return Err(ProvisionError::MissingTools(result.missing_binaries));
    }

    let privilege = match result.privilege {
        Some(privilege) => privilege,
        None if dry_run => {
            warn!("no way to obtain root; continuing because this is a dry run");
            Privilege::Root
        }
        None => {
            return Err(ProvisionError::privilege(
                "root privileges are required to install packages, files and services \
                 (run as root or install sudo)",
            ));
        }
    };

    info!("Pre-flight checks passed: privilege={:?}", privilege);
    Ok(privilege)
}
