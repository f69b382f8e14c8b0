//! Provisioning configuration.
//!
//! One immutable [`ProvisionConfig`] describes a run: which packages to
//! install, where the source comes from, how it is built, where the assets
//! are downloaded from and where everything ends up. The compiled-in defaults
//! are a complete configuration; a JSON file can override any subset of it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// Base URL the auxiliary files are served from
pub const DEFAULT_ASSET_BASE_URL: &str = "https://static.example.com/spotinstall";

/// Upstream daemon repository
pub const DEFAULT_REPOSITORY: &str = "https://github.com/Spotifyd/spotifyd.git";

/// rustup bootstrap script
pub const DEFAULT_RUSTUP_URL: &str = "https://sh.rustup.rs";

/// Complete description of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// systemd unit name, without the `.service` suffix
    pub service_name: String,
    /// Packages checked and installed in this order
    pub packages: Vec<String>,
    pub paths: PathConfig,
    pub source: SourceConfig,
    pub build: BuildConfig,
    pub toolchain: ToolchainConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    /// Scratch directory for downloads
    pub temp_dir: PathBuf,
    /// Source checkout
    pub source_dir: PathBuf,
    pub unit_destination: PathBuf,
    pub config_destination: PathBuf,
    pub binary_destination: PathBuf,
    pub hook_destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub repository: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Name of the produced binary under `target/release`
    pub binary_name: String,
    /// Cargo features selecting the audio backends
    pub features: Vec<String>,
    pub default_features: bool,
    /// Job count override; defaults to the number of processors
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// cargo as found on PATH
    pub cargo: String,
    pub installer_url: String,
    /// Where rustup puts cargo; derived from CARGO_HOME/HOME when unset
    pub installed_cargo: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub unit_file: AssetSource,
    pub config_file: AssetSource,
    pub event_hook: AssetSource,
}

/// A remote file and its optional pinned digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSource {
    pub url: String,
    /// Lowercase hex SHA-256; verification is skipped when absent
    #[serde(default)]
    pub sha256: Option<String>,
}

impl AssetSource {
    fn from_base(file: &str) -> Self {
        Self {
            url: format!("{}/{}", DEFAULT_ASSET_BASE_URL, file),
            sha256: None,
        }
    }
}

/// The three auxiliary files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AssetKind {
    #[strum(serialize = "unit file")]
    UnitFile,
    #[strum(serialize = "configuration file")]
    ConfigFile,
    #[strum(serialize = "event hook")]
    EventHook,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            service_name: "spotifyd".to_string(),
            packages: [
                "git",
                "curl",
                "build-essential",
                "pkg-config",
                "libasound2-dev",
                "libpulse-dev",
                "libssl-dev",
                "libdbus-1-dev",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            paths: PathConfig::default(),
            source: SourceConfig::default(),
            build: BuildConfig::default(),
            toolchain: ToolchainConfig::default(),
            assets: AssetsConfig::default(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("/tmp/spotifyd-install"),
            source_dir: PathBuf::from("/tmp/spotifyd-install/spotifyd"),
            unit_destination: PathBuf::from("/etc/systemd/system/spotifyd.service"),
            config_destination: PathBuf::from("/etc/spotifyd.conf"),
            binary_destination: PathBuf::from("/usr/local/bin/spotifyd"),
            hook_destination: PathBuf::from("/usr/local/bin/spotifyd-event.sh"),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            branch: "master".to_string(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            binary_name: "spotifyd".to_string(),
            features: vec!["alsa_backend".to_string(), "pulseaudio_backend".to_string()],
            default_features: false,
            jobs: None,
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
            installer_url: DEFAULT_RUSTUP_URL.to_string(),
            installed_cargo: None,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            unit_file: AssetSource::from_base("spotifyd.service"),
            config_file: AssetSource::from_base("spotifyd.conf"),
            event_hook: AssetSource::from_base("spotifyd-event.sh"),
        }
    }
}

impl ProvisionConfig {
    /// Load overrides from a JSON file on top of the defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let service = self.service_name.trim();
        if service.is_empty() {
            anyhow::bail!("Service name must be specified");
        }
        if service
            .chars()
            .any(|c| c.is_whitespace() || c == '/')
        {
            anyhow::bail!("Service name must not contain whitespace or '/'");
        }

        if self.packages.is_empty() {
            anyhow::bail!("Package list must not be empty");
        }
        if let Some(bad) = self
            .packages
            .iter()
            .find(|p| p.trim().is_empty() || p.starts_with('-') || p.contains(char::is_whitespace))
        {
            anyhow::bail!("Invalid package name: {:?}", bad);
        }

        require_https("source.repository", &self.source.repository)?;
        require_https("toolchain.installer_url", &self.toolchain.installer_url)?;
        for kind in AssetKind::iter() {
            let asset = self.asset(kind);
            require_https(&kind.to_string(), &asset.url)?;
            if let Some(digest) = &asset.sha256 {
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    anyhow::bail!("sha256 for the {} must be 64 hex characters", kind);
                }
            }
        }

        if self.source.branch.trim().is_empty() {
            anyhow::bail!("source.branch must be specified");
        }
        if self.build.binary_name.trim().is_empty() {
            anyhow::bail!("build.binary_name must be specified");
        }
        if self.build.features.is_empty() {
            anyhow::bail!("build.features must name at least one audio backend");
        }
        if self.build.jobs == Some(0) {
            anyhow::bail!("build.jobs must be at least 1");
        }

        let paths = &self.paths;
        for (name, path) in [
            ("paths.temp_dir", &paths.temp_dir),
            ("paths.source_dir", &paths.source_dir),
            ("paths.unit_destination", &paths.unit_destination),
            ("paths.config_destination", &paths.config_destination),
            ("paths.binary_destination", &paths.binary_destination),
            ("paths.hook_destination", &paths.hook_destination),
        ] {
            if !path.is_absolute() {
                anyhow::bail!("{} must be an absolute path, got {:?}", name, path);
            }
        }
        for (name, path) in [
            ("paths.unit_destination", &paths.unit_destination),
            ("paths.config_destination", &paths.config_destination),
            ("paths.hook_destination", &paths.hook_destination),
        ] {
            if path.file_name().is_none() {
                anyhow::bail!("{} must name a file, got {:?}", name, path);
            }
        }

        Ok(())
    }

    /// `<source_dir>/target/release/<binary_name>`
    pub fn build_output(&self) -> PathBuf {
        self.paths
            .source_dir
            .join("target")
            .join("release")
            .join(&self.build.binary_name)
    }

    pub fn asset(&self, kind: AssetKind) -> &AssetSource {
        match kind {
            AssetKind::UnitFile => &self.assets.unit_file,
            AssetKind::ConfigFile => &self.assets.config_file,
            AssetKind::EventHook => &self.assets.event_hook,
        }
    }

    /// Final system location of an asset
    pub fn asset_destination(&self, kind: AssetKind) -> &Path {
        match kind {
            AssetKind::UnitFile => &self.paths.unit_destination,
            AssetKind::ConfigFile => &self.paths.config_destination,
            AssetKind::EventHook => &self.paths.hook_destination,
        }
    }

    /// Download location: the temp dir plus the destination's file name
    pub fn asset_download_path(&self, kind: AssetKind) -> PathBuf {
        let destination = self.asset_destination(kind);
        let file_name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| kind.to_string().replace(' ', "-").into());
        self.paths.temp_dir.join(file_name)
    }

    /// systemd unit name with the `.service` suffix
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.service_name)
    }
}

fn require_https(name: &str, url: &str) -> Result<()> {
    if !url.starts_with("https://") || url.len() <= "https://".len() {
        anyhow::bail!("{} must be an https:// URL, got {:?}", name, url);
    }
    Ok(())
}
