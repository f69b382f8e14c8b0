use clap::Parser;
use std::path::PathBuf;

/// spotinstall - build spotifyd from source and install it as a service
///
/// With no arguments, runs the full provisioning sequence with the built-in
/// configuration. Steps that are already satisfied are skipped, so the
/// command can simply be re-run after a failure.
#[derive(Parser, Debug, Default)]
#[command(name = "spotinstall")]
#[command(about = "Build spotifyd from source and install it as a systemd service")]
#[command(version)]
pub struct Cli {
    /// JSON file overriding parts of the built-in configuration
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dry-run mode: log commands that would change the system instead of
    /// running them. Read-only checks still execute.
    #[arg(long)]
    pub dry_run: bool,

    /// Fast-forward an existing source checkout and rebuild if it changed
    #[arg(long)]
    pub update_source: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_runs_with_defaults() {
        let cli = Cli::try_parse_from(["spotinstall"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.dry_run);
        assert!(!cli.update_source);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "spotinstall",
            "--config",
            "/etc/spotinstall.json",
            "--dry-run",
            "--update-source",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/spotinstall.json")));
        assert!(cli.dry_run && cli.update_source && cli.verbose);
    }
}
