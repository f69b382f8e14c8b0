//! Service controller.
//!
//! Stops a running instance, installs the manifest's files and then enables
//! and starts the unit. A failed copy leaves earlier copies in place; there
//! is no rollback.

use tracing::info;

use crate::command_runner::{CommandRunner, ToolCommand};
use crate::error::Result;
use crate::manifest::InstallManifest;

fn systemctl(action: &str, unit: &str) -> ToolCommand {
    ToolCommand::new("systemctl").args([action, unit]).privileged()
}

/// `systemctl is-active --quiet <unit>`: exit 0 means active
pub fn is_active(unit: &str, runner: &mut dyn CommandRunner) -> Result<bool> {
    let output = runner.run(
        &ToolCommand::new("systemctl")
            .args(["is-active", "--quiet", unit])
            .captured(),
    )?;
    Ok(output.success)
}

/// Stop the unit if it is running. Returns true if it was running.
pub fn stop_if_active(unit: &str, runner: &mut dyn CommandRunner) -> Result<bool> {
    if !is_active(unit, runner)? {
        info!("{} is not running", unit);
        return Ok(false);
    }

    info!("Stopping {}", unit);
    runner
        .run(&systemctl("stop", unit))?
        .ensure_success("systemctl stop")?;
    Ok(true)
}

/// Install every manifest entry, stopping at the first failure.
/// Returns the number of files installed.
pub fn install_files(manifest: InstallManifest, runner: &mut dyn CommandRunner) -> Result<usize> {
    let mut installed = 0;
    for entry in manifest {
        info!(
            "Installing {} -> {} ({:o})",
            entry.source.display(),
            entry.destination.display(),
            entry.mode
        );
        runner
            .run(&entry.install_command())?
            .ensure_success(&format!("install {}", entry.destination.display()))?;
        installed += 1;
    }
    Ok(installed)
}

/// Reload unit files, then enable and start the unit
pub fn enable_and_start(unit: &str, runner: &mut dyn CommandRunner) -> Result<()> {
    runner
        .run(&ToolCommand::new("systemctl").arg("daemon-reload").privileged())?
        .ensure_success("systemctl daemon-reload")?;

    info!("Enabling and starting {}", unit);
    runner
        .run(&systemctl("enable", unit))?
        .ensure_success("systemctl enable")?;
    runner
        .run(&systemctl("start", unit))?
        .ensure_success("systemctl start")?;
    Ok(())
}
