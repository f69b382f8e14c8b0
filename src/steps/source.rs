//! Source acquirer.
//!
//! Clones the daemon's repository when the checkout directory is absent and
//! reuses it otherwise. Bringing an existing checkout up to date is opt-in
//! (`--update-source`) and never happens implicitly.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::command_runner::{CommandRunner, ToolCommand};
use crate::config::SourceConfig;
use crate::error::{ProvisionError, Result};

/// What happened to the checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Freshly cloned
    Cloned,
    /// Existing checkout used as is
    Reused,
    /// Existing checkout fast-forwarded to its upstream
    Updated,
}

impl SourceState {
    /// True if the checkout may differ from the last build
    pub fn changed(self) -> bool {
        matches!(self, Self::Cloned | Self::Updated)
    }
}

pub fn clone_command(source: &SourceConfig, dir: &Path) -> ToolCommand {
    ToolCommand::new("git")
        .args(["clone", "--branch", source.branch.as_str(), source.repository.as_str()])
        .path_arg(dir)
        .mutating()
}

/// Fails if `dir` exists but cannot be listed
fn check_accessible(dir: &Path) -> Result<()> {
    fs::read_dir(dir)
        .map(|_| ())
        .map_err(|source| ProvisionError::SourceInaccessible {
            path: dir.to_path_buf(),
            source,
        })
}

pub fn acquire_source(
    source: &SourceConfig,
    dir: &Path,
    update: bool,
    runner: &mut dyn CommandRunner,
) -> Result<SourceState> {
    let exists = dir
        .try_exists()
        .map_err(|source| ProvisionError::SourceInaccessible {
            path: dir.to_path_buf(),
            source,
        })?;
    if !exists {
        info!("Cloning {} into {}", source.repository, dir.display());
        runner
            .run(&clone_command(source, dir))?
            .ensure_success("git clone")?;
        return Ok(SourceState::Cloned);
    }

    check_accessible(dir)?;
    info!("Reusing existing checkout at {}", dir.display());

    if update && update_checkout(dir, runner)? {
        return Ok(SourceState::Updated);
    }
    Ok(SourceState::Reused)
}

/// Fetch and fast-forward when `HEAD` is behind its upstream.
/// Returns true if the checkout changed.
pub fn update_checkout(dir: &Path, runner: &mut dyn CommandRunner) -> Result<bool> {
    runner
        .run(&ToolCommand::new("git").arg("fetch").in_dir(dir).mutating())?
        .ensure_success("git fetch")?;

    let local = rev_parse(dir, "HEAD", runner)?;
    let upstream = rev_parse(dir, "@{u}", runner)?;
    if local == upstream {
        debug!("checkout is up to date at {}", local);
        return Ok(false);
    }

    info!("Updating checkout {} -> {}", short(&local), short(&upstream));
    runner
        .run(
            &ToolCommand::new("git")
                .args(["pull", "--ff-only"])
                .in_dir(dir)
                .mutating(),
        )?
        .ensure_success("git pull")?;
    Ok(true)
}

fn rev_parse(dir: &Path, rev: &str, runner: &mut dyn CommandRunner) -> Result<String> {
    let output = runner.run(
        &ToolCommand::new("git")
            .args(["rev-parse", rev])
            .in_dir(dir)
            .captured(),
    )?;
    output.ensure_success("git rev-parse")?;
    Ok(output.stdout.trim().to_string())
}

fn short(rev: &str) -> &str {
    rev.get(..8).unwrap_or(rev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use crate::testing::FakeRunner;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_missing_dir_is_cloned_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("spotifyd");
        let mut runner = FakeRunner::new();

        let state = acquire_source(&SourceConfig::default(), &dir, false, &mut runner).unwrap();
        assert_eq!(state, SourceState::Cloned);
        assert_eq!(runner.count("git", "clone"), 1);

        let clone = runner.find("git", "clone").unwrap();
        assert_eq!(
            clone.args,
            vec![
                "clone".to_string(),
                "--branch".to_string(),
                "master".to_string(),
                "https://github.com/Spotifyd/spotifyd.git".to_string(),
                dir.display().to_string(),
            ]
        );
    }

    #[test]
    fn test_existing_dir_is_reused_without_git() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new();

        let state =
            acquire_source(&SourceConfig::default(), tmp.path(), false, &mut runner).unwrap();
        assert_eq!(state, SourceState::Reused);
        assert!(!state.changed());
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_clone_failure_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new().on(
            |c| c.program == "git",
            CommandOutput::failed(128, "fatal: unable to access"),
        );
        let err = acquire_source(
            &SourceConfig::default(),
            &tmp.path().join("missing"),
            false,
            &mut runner,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("git clone failed (exit code 128)"));
    }

    #[test]
    fn test_file_in_place_of_dir_is_inaccessible() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("spotifyd");
        fs::write(&file, b"not a directory").unwrap();
        let mut runner = FakeRunner::new();

        let err = acquire_source(&SourceConfig::default(), &file, false, &mut runner).unwrap_err();
        assert!(matches!(err, ProvisionError::SourceInaccessible { .. }));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_unreachable_checkout_is_not_cloned() {
        // root ignores directory permissions
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let locked = tmp.path().join("locked");
        let dir = locked.join("spotifyd");
        fs::create_dir_all(&dir).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let mut runner = FakeRunner::new();

        let result = acquire_source(&SourceConfig::default(), &dir, false, &mut runner);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();

        assert!(matches!(
            result,
            Err(ProvisionError::SourceInaccessible { .. })
        ));
        assert!(runner.calls.is_empty());
    }

    #[test]
    fn test_update_pulls_when_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new()
            .on(
                |c| c.args == ["rev-parse", "HEAD"],
                CommandOutput::ok("1111111111111111\n"),
            )
            .on(
                |c| c.args == ["rev-parse", "@{u}"],
                CommandOutput::ok("2222222222222222\n"),
            );

        let state =
            acquire_source(&SourceConfig::default(), tmp.path(), true, &mut runner).unwrap();
        assert_eq!(state, SourceState::Updated);
        assert!(state.changed());
        assert_eq!(runner.count("git", "fetch"), 1);
        assert_eq!(runner.count("git", "pull"), 1);
        assert_eq!(
            runner.find("git", "pull").unwrap().current_dir.as_deref(),
            Some(tmp.path())
        );
    }

    #[test]
    fn test_update_noop_when_current() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new().on(
            |c| c.subcommand() == Some("rev-parse"),
            CommandOutput::ok("abcdef0123456789\n"),
        );

        let state =
            acquire_source(&SourceConfig::default(), tmp.path(), true, &mut runner).unwrap();
        assert_eq!(state, SourceState::Reused);
        assert_eq!(runner.count("git", "pull"), 0);
    }
}
