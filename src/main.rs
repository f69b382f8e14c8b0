//! spotinstall - Main entry point
//!
//! Loads the configuration, runs the pre-flight checks once, then hands the
//! run to the provisioner. Every failure ends in `abort`.

use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use spotinstall::cli::Cli;
use spotinstall::{
    ProvisionConfig, ProvisionError, ProvisionReport, ProvisionStage, Provisioner, RunOptions,
    StepFailure, SystemRunner, sanity,
};

/// Initialize logging; RUST_LOG overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    info!("spotinstall {} starting", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(report) => print_summary(&report, cli.dry_run),
        Err(failure) => abort(&failure),
    }
}

fn run(cli: &Cli) -> Result<ProvisionReport, StepFailure> {
    let config = load_config(cli.config.as_deref())
        .map_err(|e| StepFailure::new(ProvisionStage::NotStarted, e))?;

    let privilege = sanity::run_preflight_checks(cli.dry_run)
        .map_err(|e| StepFailure::new(ProvisionStage::NotStarted, e))?;

    let runner = SystemRunner::new(privilege).with_dry_run(cli.dry_run);
    let options = RunOptions {
        update_source: cli.update_source,
    };
    Provisioner::new(&config, runner, options).run()
}

fn load_config(path: Option<&Path>) -> Result<ProvisionConfig, ProvisionError> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            ProvisionConfig::load_from_file(path)
                .map_err(|e| ProvisionError::config(format!("{:#}", e)))?
        }
        None => ProvisionConfig::default(),
    };

    config
        .validate()
        .map_err(|e| ProvisionError::config(format!("{:#}", e)))?;
    debug!("configuration: {:?}", config);
    Ok(config)
}

fn print_summary(report: &ProvisionReport, dry_run: bool) {
    if dry_run {
        println!("✓ Dry run finished; no changes were made");
        return;
    }
    if !report.installed_packages.is_empty() {
        println!("  installed packages: {}", report.installed_packages.join(" "));
    }
    if report.toolchain_installed {
        println!("  installed Rust toolchain ({})", report.cargo);
    }
    if report.built {
        println!("  built spotifyd from source");
    }
    println!("  installed {} file(s)", report.files_installed);
    println!("✓ spotifyd is installed, enabled and running");
}

/// Single exit point for every failed run
fn abort(failure: &StepFailure) -> ! {
    eprintln!();
    eprintln!("✗ {}", failure);
    if let Some(hint) = failure.rerun_hint() {
        eprintln!("  {}", hint);
    }
    std::process::exit(failure.exit_code());
}
