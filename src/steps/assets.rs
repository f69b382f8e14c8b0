//! Asset fetcher.
//!
//! Downloads the unit file, the configuration file and the event hook with
//! curl (HTTPS only, TLS 1.2 or newer, fail on HTTP errors). Any failure
//! aborts the run and names the URL.
//!
//! # Integrity
//!
//! Verification is optional. An asset with a pinned `sha256` is checked by
//! the configured [`AssetVerifier`]; assets without one are accepted as
//! downloaded.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::command_runner::{CommandRunner, ToolCommand};
use crate::config::{AssetKind, AssetSource, ProvisionConfig};
use crate::error::{ProvisionError, Result};

/// Checks a downloaded file against its source description
pub trait AssetVerifier {
    fn verify(&self, asset: &AssetSource, path: &Path) -> Result<()>;
}

/// Compares the file's SHA-256 with the pinned digest, if any
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Verifier;

impl AssetVerifier for Sha256Verifier {
    fn verify(&self, asset: &AssetSource, path: &Path) -> Result<()> {
        let Some(expected) = &asset.sha256 else {
            debug!("no checksum pinned for {}, skipping verification", asset.url);
            return Ok(());
        };

        let actual = sha256_file(path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ProvisionError::Integrity {
                path: path.to_path_buf(),
                expected: expected.to_lowercase(),
                actual,
            });
        }
        debug!("{} matches pinned sha256", path.display());
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn fetch_command(url: &str, destination: &Path) -> ToolCommand {
    ToolCommand::new("curl")
        .args([
            "--proto",
            "=https",
            "--tlsv1.2",
            "-fsSL",
            "--create-dirs",
            "-o",
        ])
        .path_arg(destination)
        .arg(url)
        .mutating()
}

/// Fetch one asset and verify it
pub fn fetch_asset(
    asset: &AssetSource,
    destination: &Path,
    verifier: &dyn AssetVerifier,
    runner: &mut dyn CommandRunner,
) -> Result<()> {
    info!("Downloading {}", asset.url);
    let output = runner.run(&fetch_command(&asset.url, destination))?;
    if !output.success {
        debug!("curl exited with {:?}: {}", output.exit_code, output.stderr.trim());
        return Err(ProvisionError::Fetch {
            url: asset.url.clone(),
        });
    }

    if runner.is_dry_run() {
        return Ok(());
    }
    verifier.verify(asset, destination)
}

/// Fetch all three assets in order. Returns their local paths.
pub fn fetch_assets(
    config: &ProvisionConfig,
    verifier: &dyn AssetVerifier,
    runner: &mut dyn CommandRunner,
) -> Result<Vec<PathBuf>> {
    let mut fetched = Vec::new();
    for kind in AssetKind::iter() {
        let destination = config.asset_download_path(kind);
        fetch_asset(config.asset(kind), &destination, verifier, runner)?;
        debug!("{} saved to {}", kind, destination.display());
        fetched.push(destination);
    }
    Ok(fetched)
}
