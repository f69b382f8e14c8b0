//! Builder.
//!
//! Runs a release build of the daemon with the configured audio backends and
//! one job per processor. The only up-to-date check is whether the output
//! binary exists: a stale or half-written artifact is reused as is, unless
//! the source acquirer just changed the checkout. An artifact path that
//! cannot be checked aborts the build step.

use std::path::Path;

use tracing::info;

use crate::command_runner::{CommandRunner, ToolCommand};
use crate::config::BuildConfig;
use crate::error::Result;

/// Job count: configured, else number of available processors
pub fn job_count(config: &BuildConfig) -> usize {
    config.jobs.unwrap_or_else(num_cpus::get).max(1)
}

pub fn build_command(config: &BuildConfig, cargo: &str, source_dir: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(cargo)
        .args(["build", "--release", "--jobs"])
        .arg(job_count(config).to_string());
    if !config.default_features {
        cmd = cmd.arg("--no-default-features");
    }
    cmd.arg("--features")
        .arg(config.features.join(","))
        .in_dir(source_dir)
        .mutating()
}

/// Build unless `output` already exists. `force` rebuilds regardless.
/// Returns true if a build ran.
pub fn ensure_built(
    config: &BuildConfig,
    cargo: &str,
    source_dir: &Path,
    output: &Path,
    force: bool,
    runner: &mut dyn CommandRunner,
) -> Result<bool> {
    if output.try_exists()? && !force {
        info!("{} already built, skipping build", output.display());
        return Ok(false);
    }

    let command = build_command(config, cargo, source_dir);
    info!("Building {}: {}", config.binary_name, command);
    runner.run(&command)?.ensure_success("cargo build")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use crate::error::ProvisionError;
    use crate::testing::FakeRunner;
    use std::os::unix::fs::PermissionsExt;

    fn config() -> BuildConfig {
        BuildConfig {
            jobs: Some(4),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_build_command_shape() {
        let cmd = build_command(&config(), "cargo", Path::new("/tmp/src"));
        assert_eq!(
            cmd.args,
            vec![
                "build",
                "--release",
                "--jobs",
                "4",
                "--no-default-features",
                "--features",
                "alsa_backend,pulseaudio_backend"
            ]
        );
        assert_eq!(cmd.current_dir.as_deref(), Some(Path::new("/tmp/src")));
        assert!(!cmd.privileged);
    }

    #[test]
    fn test_default_features_flag_omitted_when_enabled() {
        let config = BuildConfig {
            default_features: true,
            ..config()
        };
        let cmd = build_command(&config, "cargo", Path::new("/tmp/src"));
        assert!(!cmd.args.iter().any(|a| a == "--no-default-features"));
    }

    #[test]
    fn test_job_count_defaults_to_cpus() {
        assert_eq!(job_count(&BuildConfig::default()), num_cpus::get().max(1));
    }

    #[test]
    fn test_existing_artifact_skips_build_even_if_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("spotifyd");
        std::fs::write(&output, b"").unwrap();
        let mut runner = FakeRunner::new();

        let built =
            ensure_built(&config(), "cargo", tmp.path(), &output, false, &mut runner).unwrap();
        assert!(!built);
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_force_rebuilds_existing_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("spotifyd");
        std::fs::write(&output, b"old").unwrap();
        let mut runner = FakeRunner::new();

        assert!(ensure_built(&config(), "cargo", tmp.path(), &output, true, &mut runner).unwrap());
        assert_eq!(runner.count("cargo", "build"), 1);
    }

    #[test]
    fn test_missing_artifact_builds_with_resolved_cargo() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("target/release/spotifyd");
        let mut runner = FakeRunner::new();

        let cargo = "/root/.cargo/bin/cargo";
        assert!(ensure_built(&config(), cargo, tmp.path(), &output, false, &mut runner).unwrap());
        assert_eq!(runner.count(cargo, "build"), 1);
    }

    #[test]
    fn test_unreachable_artifact_aborts_without_building() {
        // root ignores directory permissions
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let release = tmp.path().join("target/release");
        std::fs::create_dir_all(&release).unwrap();
        std::fs::set_permissions(&release, std::fs::Permissions::from_mode(0o000)).unwrap();
        let mut runner = FakeRunner::new();

        let result = ensure_built(
            &config(),
            "cargo",
            tmp.path(),
            &release.join("spotifyd"),
            false,
            &mut runner,
        );
        std::fs::set_permissions(&release, std::fs::Permissions::from_mode(0o700)).unwrap();

        assert!(matches!(result, Err(ProvisionError::Io(_))));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_build_failure_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner =
            FakeRunner::new().on(|c| c.program == "cargo", CommandOutput::failed(101, ""));
        let err = ensure_built(
            &config(),
            "cargo",
            tmp.path(),
            &tmp.path().join("spotifyd"),
            false,
            &mut runner,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "cargo build failed (exit code 101)");
    }
}
