//! Dependency installer.
//!
//! Each package is queried with `dpkg-query`; only the missing ones are
//! handed to a single `apt-get install` call, in configured order.

use tracing::{debug, info};

use crate::command_runner::{CommandRunner, ToolCommand};
use crate::error::Result;

/// dpkg status of a fully installed package
const INSTALLED_STATUS: &str = "install ok installed";

/// True if a `${Status}` field says the package is installed
pub fn is_installed_status(status: &str) -> bool {
    status.trim() == INSTALLED_STATUS
}

pub fn query_command(package: &str) -> ToolCommand {
    ToolCommand::new("dpkg-query")
        .args(["-W", "-f=${Status}", package])
        .captured()
}

pub fn install_command(packages: &[String]) -> ToolCommand {
    ToolCommand::new("apt-get")
        .args(["install", "-y"])
        .args(packages.iter().cloned())
        .privileged()
}

/// Query one package. Unknown packages make dpkg-query exit non-zero,
/// which counts as not installed.
pub fn is_installed(runner: &mut dyn CommandRunner, package: &str) -> Result<bool> {
    let output = runner.run(&query_command(package))?;
    Ok(output.success && is_installed_status(&output.stdout))
}

/// Missing packages, preserving the order of `packages`
pub fn missing_packages(
    runner: &mut dyn CommandRunner,
    packages: &[String],
) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for package in packages {
        if is_installed(runner, package)? {
            debug!("package {} already installed", package);
        } else {
            missing.push(package.clone());
        }
    }
    Ok(missing)
}

/// Install whatever is missing. Returns the packages that were installed.
pub fn ensure_packages(
    runner: &mut dyn CommandRunner,
    packages: &[String],
) -> Result<Vec<String>> {
    let missing = missing_packages(runner, packages)?;
    if missing.is_empty() {
        info!("All {} required packages are installed", packages.len());
        return Ok(missing);
    }

    info!("Installing {} missing package(s): {}", missing.len(), missing.join(" "));
    runner
        .run(&install_command(&missing))?
        .ensure_success("apt-get install")?;
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CommandOutput;
    use crate::testing::FakeRunner;

    fn packages(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn installed(names: &'static [&'static str]) -> FakeRunner {
        FakeRunner::new()
            .on(
                move |c| c.program == "dpkg-query" && names.contains(&c.args[2].as_str()),
                CommandOutput::ok("install ok installed"),
            )
            .on(
                |c| c.program == "dpkg-query",
                CommandOutput::failed(1, "dpkg-query: no packages found matching"),
            )
    }

    #[test]
    fn test_status_parsing() {
        assert!(is_installed_status("install ok installed"));
        assert!(is_installed_status("install ok installed\n"));
        assert!(!is_installed_status("deinstall ok config-files"));
        assert!(!is_installed_status("install ok half-configured"));
        assert!(!is_installed_status(""));
    }

    #[test]
    fn test_all_present_issues_no_install() {
        let mut runner = installed(&["git", "curl"]);
        let done = ensure_packages(&mut runner, &packages(&["git", "curl"])).unwrap();
        assert!(done.is_empty());
        assert_eq!(runner.count("apt-get", "install"), 0);
        assert_eq!(runner.calls.len(), 2);
    }

    #[test]
    fn test_only_missing_packages_installed_in_order() {
        let mut runner = installed(&["curl"]);
        let done =
            ensure_packages(&mut runner, &packages(&["git", "curl", "libssl-dev"])).unwrap();
        assert_eq!(done, packages(&["git", "libssl-dev"]));

        let install = runner.find("apt-get", "install").unwrap();
        assert_eq!(install.args, vec!["install", "-y", "git", "libssl-dev"]);
        assert!(install.privileged);
        assert_eq!(runner.count("apt-get", "install"), 1);
    }

    #[test]
    fn test_removed_but_configured_counts_as_missing() {
        let mut runner = FakeRunner::new().on(
            |c| c.program == "dpkg-query",
            CommandOutput::ok("deinstall ok config-files"),
        );
        let missing = missing_packages(&mut runner, &packages(&["git"])).unwrap();
        assert_eq!(missing, packages(&["git"]));
    }

    #[test]
    fn test_install_failure_aborts() {
        let mut runner = installed(&[]).on(
            |c| c.program == "apt-get",
            CommandOutput::failed(100, "E: Unable to locate package git"),
        );
        let err = ensure_packages(&mut runner, &packages(&["git"])).unwrap_err();
        assert!(err.to_string().contains("apt-get install failed (exit code 100)"));
    }
}
