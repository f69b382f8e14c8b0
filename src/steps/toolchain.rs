//! Toolchain bootstrapper.
//!
//! Probes `cargo --version`. When that fails the rustup installer is piped
//! into `sh` over TLS 1.2, then cargo is probed once more at the location
//! rustup installs it to. There is no further retry.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::command_runner::{CommandRunner, ToolCommand, probe};
use crate::config::ToolchainConfig;
use crate::error::{ProvisionError, Result};

/// Where to look when rustup did not work as expected
pub const TROUBLESHOOTING_URL: &str =
    "https://rust-lang.github.io/rustup/installation/index.html";

/// Which cargo the builder should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cargo: String,
    /// True if this run installed it
    pub installed: bool,
}

pub fn version_command(cargo: &str) -> ToolCommand {
    ToolCommand::new(cargo).arg("--version").captured()
}

pub fn installer_command(installer_url: &str) -> ToolCommand {
    ToolCommand::new("sh")
        .arg("-c")
        .arg(format!(
            "curl --proto '=https' --tlsv1.2 -sSf {} | sh -s -- -y",
            installer_url
        ))
        .mutating()
}

/// cargo as installed by rustup: `$CARGO_HOME/bin/cargo`, else `~/.cargo/bin/cargo`
pub fn rustup_cargo_path(config: &ToolchainConfig) -> Option<PathBuf> {
    if let Some(path) = &config.installed_cargo {
        return Some(path.clone());
    }
    if let Some(cargo_home) = std::env::var_os("CARGO_HOME") {
        return Some(PathBuf::from(cargo_home).join("bin").join("cargo"));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".cargo").join("bin").join("cargo"))
}

pub fn ensure_toolchain(
    config: &ToolchainConfig,
    runner: &mut dyn CommandRunner,
) -> Result<Toolchain> {
    if probe(runner, &version_command(&config.cargo)) {
        info!("Rust toolchain found ({})", config.cargo);
        return Ok(Toolchain {
            cargo: config.cargo.clone(),
            installed: false,
        });
    }

    warn!("cargo not found, installing the Rust toolchain via rustup");
    runner
        .run(&installer_command(&config.installer_url))?
        .ensure_success("rustup installer")?;

    let installed = rustup_cargo_path(config)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| config.cargo.clone());

    // A skipped installer leaves nothing to probe
    if runner.is_dry_run() || probe(runner, &version_command(&installed)) {
        info!("Rust toolchain installed ({})", installed);
        return Ok(Toolchain {
            cargo: installed,
            installed: true,
        });
    }

    Err(ProvisionError::ToolchainUnavailable(
        TROUBLESHOOTING_URL.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use crate::testing::FakeRunner;

    fn config() -> ToolchainConfig {
        ToolchainConfig {
            installed_cargo: Some(PathBuf::from("/home/pi/.cargo/bin/cargo")),
            ..ToolchainConfig::default()
        }
    }

    #[test]
    fn test_present_toolchain_skips_installer() {
        let mut runner = FakeRunner::new();
        let toolchain = ensure_toolchain(&config(), &mut runner).unwrap();
        assert_eq!(
            toolchain,
            Toolchain {
                cargo: "cargo".to_string(),
                installed: false
            }
        );
        assert_eq!(runner.calls.len(), 1);
        assert_eq!(runner.count("sh", "-c"), 0);
    }

    #[test]
    fn test_missing_toolchain_is_installed_and_reprobed() {
        let mut runner = FakeRunner::new().on(
            |c| c.program == "cargo",
            CommandOutput::failed(127, "cargo: not found"),
        );
        let toolchain = ensure_toolchain(&config(), &mut runner).unwrap();
        assert_eq!(toolchain.cargo, "/home/pi/.cargo/bin/cargo");
        assert!(toolchain.installed);

        let installer = runner.find("sh", "-c").unwrap();
        assert!(installer.args[1].contains("--proto '=https' --tlsv1.2"));
        assert!(installer.args[1].contains("https://sh.rustup.rs"));
        assert!(!installer.privileged);
        assert_eq!(runner.calls.len(), 3);
    }

    #[test]
    fn test_dry_run_skips_installer_and_reprobe() {
        let mut runner = FakeRunner::dry_run().on(
            |c| c.program == "cargo",
            CommandOutput::failed(127, "cargo: not found"),
        );
        let toolchain = ensure_toolchain(&config(), &mut runner).unwrap();
        assert_eq!(toolchain.cargo, "/home/pi/.cargo/bin/cargo");
        assert!(toolchain.installed);

        // only the first probe ran
        assert_eq!(runner.calls.len(), 1);
        assert_eq!(runner.skipped.len(), 1);
        assert_eq!(runner.skipped[0].program, "sh");
    }

    #[test]
    fn test_still_missing_after_install_points_to_troubleshooting() {
        let mut runner = FakeRunner::new().on(
            |c| c.program.ends_with("cargo"),
            CommandOutput::failed(127, ""),
        );
        let err = ensure_toolchain(&config(), &mut runner).unwrap_err();
        assert!(matches!(err, ProvisionError::ToolchainUnavailable(_)));
        assert!(err.to_string().contains(TROUBLESHOOTING_URL));
        // one probe, one install, one re-probe; no retry loop
        assert_eq!(runner.calls.len(), 3);
    }

    #[test]
    fn test_installer_failure_aborts() {
        let mut runner = FakeRunner::new()
            .on(|c| c.program == "cargo", CommandOutput::failed(127, ""))
            .on(|c| c.program == "sh", CommandOutput::failed(1, "curl: (6)"));
        let err = ensure_toolchain(&config(), &mut runner).unwrap_err();
        assert!(err.to_string().contains("rustup installer failed"));
    }

    #[test]
    fn test_configured_install_location_wins() {
        assert_eq!(
            rustup_cargo_path(&config()),
            Some(PathBuf::from("/home/pi/.cargo/bin/cargo"))
        );
    }
}
