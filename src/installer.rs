//! Installer module
//!
//! Drives one provisioning run: walks the stage machine from
//! `CheckingDependencies` to `Completed`, running each step through the
//! command runner and turning the first error into a [`StepFailure`].

use tracing::{debug, error, info};

use crate::command_runner::CommandRunner;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result, StepFailure};
use crate::install_state::{ProvisionContext, ProvisionStage};
use crate::manifest::InstallManifest;
use crate::steps::assets::{self, AssetVerifier, Sha256Verifier};
use crate::steps::{build, packages, service, source, toolchain};

/// Run-time switches that are not part of the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Fast-forward an existing checkout before building
    pub update_source: bool,
}

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Packages installed by this run (empty if all were present)
    pub installed_packages: Vec<String>,
    pub toolchain_installed: bool,
    /// cargo used for the build
    pub cargo: String,
    pub cloned: bool,
    pub source_updated: bool,
    pub built: bool,
    pub service_was_active: bool,
    pub files_installed: usize,
}

/// Runs the provisioning stages in order against a command runner
pub struct Provisioner<'a, R: CommandRunner> {
    config: &'a ProvisionConfig,
    runner: R,
    options: RunOptions,
    verifier: Box<dyn AssetVerifier>,
    context: ProvisionContext,
}

impl<'a, R: CommandRunner> Provisioner<'a, R> {
    pub fn new(config: &'a ProvisionConfig, runner: R, options: RunOptions) -> Self {
        Self {
            config,
            runner,
            options,
            verifier: Box::new(Sha256Verifier),
            context: ProvisionContext::new(),
        }
    }

    /// Replace the asset verifier
    pub fn with_verifier(mut self, verifier: impl AssetVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn context(&self) -> &ProvisionContext {
        &self.context
    }

    /// Run every stage. Stops at the first failure.
    pub fn run(&mut self) -> std::result::Result<ProvisionReport, StepFailure> {
        let config = self.config;
        let mut report = ProvisionReport::default();

        report.installed_packages = self.step(ProvisionStage::CheckingDependencies, |runner, _| {
            packages::ensure_packages(runner, &config.packages)
        })?;

        let toolchain = self.step(ProvisionStage::EnsuringToolchain, |runner, _| {
            toolchain::ensure_toolchain(&config.toolchain, runner)
        })?;
        report.toolchain_installed = toolchain.installed;
        report.cargo = toolchain.cargo;

        let update = self.options.update_source;
        let source_state = self.step(ProvisionStage::AcquiringSource, |runner, _| {
            source::acquire_source(&config.source, &config.paths.source_dir, update, runner)
        })?;
        report.cloned = source_state == source::SourceState::Cloned;
        report.source_updated = source_state == source::SourceState::Updated;

        let cargo = report.cargo.clone();
        report.built = self.step(ProvisionStage::Building, |runner, _| {
            build::ensure_built(
                &config.build,
                &cargo,
                &config.paths.source_dir,
                &config.build_output(),
                source_state.changed(),
                runner,
            )
        })?;

        self.step(ProvisionStage::FetchingAssets, |runner, verifier| {
            assets::fetch_assets(config, verifier, runner)
        })?;

        let unit = config.unit_name();
        report.service_was_active = self.step(ProvisionStage::StoppingService, |runner, _| {
            service::stop_if_active(&unit, runner)
        })?;

        report.files_installed = self.step(ProvisionStage::InstallingFiles, |runner, _| {
            service::install_files(InstallManifest::from_config(config), runner)
        })?;

        self.step(ProvisionStage::StartingService, |runner, _| {
            service::enable_and_start(&unit, runner)
        })?;

        self.context
            .transition_to(ProvisionStage::Completed)
            .map_err(|e| StepFailure::new(ProvisionStage::Completed, e.into()))?;
        info!("{}", ProvisionStage::Completed);
        Ok(report)
    }

    /// Enter `stage` and run `f`; on error mark the run failed.
    fn step<T>(
        &mut self,
        stage: ProvisionStage,
        f: impl FnOnce(&mut dyn CommandRunner, &dyn AssetVerifier) -> Result<T>,
    ) -> std::result::Result<T, StepFailure> {
        if let Err(e) = self.context.transition_to(stage) {
            return Err(self.abort(stage, e.into()));
        }
        info!("==> {}", stage);

        match f(&mut self.runner, self.verifier.as_ref()) {
            Ok(value) => Ok(value),
            Err(e) => Err(self.abort(stage, e)),
        }
    }

    fn abort(&mut self, stage: ProvisionStage, source: ProvisionError) -> StepFailure {
        debug!(stage = %stage, "step failed: {}", source);
        if let Err(e) = self.context.fail() {
            error!("could not record failure: {}", e);
        }
        StepFailure::new(stage, source)
    }
}
