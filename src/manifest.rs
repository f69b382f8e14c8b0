//! Install manifest: which local file goes where, with which mode.
//!
//! Built right before the copy step from the configuration and consumed once.

use std::path::PathBuf;

use crate::command_runner::ToolCommand;
use crate::config::{AssetKind, ProvisionConfig};

/// Mode for executables (daemon binary, event hook)
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode for unit and configuration files
pub const REGULAR_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: u32,
}

impl ManifestEntry {
    /// `install -D -m <mode> <source> <destination>`, run as root.
    ///
    /// `-D` creates missing leading directories of the destination.
    pub fn install_command(&self) -> ToolCommand {
        ToolCommand::new("install")
            .args(["-D", "-m"])
            .arg(format!("{:o}", self.mode))
            .path_arg(&self.source)
            .path_arg(&self.destination)
            .privileged()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallManifest {
    entries: Vec<ManifestEntry>,
}

impl InstallManifest {
    /// Unit file, configuration file, daemon binary, event hook, in that order.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        let asset = |kind: AssetKind, mode: u32| ManifestEntry {
            source: config.asset_download_path(kind),
            destination: config.asset_destination(kind).to_path_buf(),
            mode,
        };

        Self {
            entries: vec![
                asset(AssetKind::UnitFile, REGULAR_MODE),
                asset(AssetKind::ConfigFile, REGULAR_MODE),
                ManifestEntry {
                    source: config.build_output(),
                    destination: config.paths.binary_destination.clone(),
                    mode: EXECUTABLE_MODE,
                },
                asset(AssetKind::EventHook, EXECUTABLE_MODE),
            ],
        }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for InstallManifest {
    type Item = ManifestEntry;
    type IntoIter = std::vec::IntoIter<ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
