//! Provisioning State Machine
//!
//! `ProvisionContext` owns the current stage of a run and only allows forward
//! transitions to the immediate next stage. Any non-terminal stage can fail.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! CheckingDependencies
//!     ↓
//! EnsuringToolchain
//!     ↓
//! AcquiringSource
//!     ↓
//! Building
//!     ↓
//! FetchingAssets
//!     ↓
//! StoppingService
//!     ↓
//! InstallingFiles
//!     ↓
//! StartingService
//!     ↓
//! Completed
//!
//! (Any stage can transition to Failed)
//! ```

use std::fmt;

use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Provisioning stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum ProvisionStage {
    /// Nothing has run yet (config loading and preflight happen here)
    NotStarted = 0,

    /// Install missing system packages
    CheckingDependencies = 1,

    /// Make sure cargo is available
    EnsuringToolchain = 2,

    /// Clone (or reuse) the daemon's source checkout
    AcquiringSource = 3,

    /// Release build of the daemon
    Building = 4,

    /// Download unit file, config file and event hook
    FetchingAssets = 5,

    /// Stop the running service, if any
    StoppingService = 6,

    /// Copy artifacts into their system locations
    InstallingFiles = 7,

    /// Enable and start the service
    StartingService = 8,

    /// Run completed successfully (terminal state)
    Completed = 9,

    /// Run aborted (terminal state)
    Failed = 255,
}

impl ProvisionStage {
    /// Returns the numeric order of this stage (0-9, 255 for Failed)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a terminal state (Completed or Failed)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the next stage in the sequence, or None if at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::CheckingDependencies),
            Self::CheckingDependencies => Some(Self::EnsuringToolchain),
            Self::EnsuringToolchain => Some(Self::AcquiringSource),
            Self::AcquiringSource => Some(Self::Building),
            Self::Building => Some(Self::FetchingAssets),
            Self::FetchingAssets => Some(Self::StoppingService),
            Self::StoppingService => Some(Self::InstallingFiles),
            Self::InstallingFiles => Some(Self::StartingService),
            Self::StartingService => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Preparing",
            Self::CheckingDependencies => "Checking dependencies",
            Self::EnsuringToolchain => "Ensuring Rust toolchain",
            Self::AcquiringSource => "Acquiring source",
            Self::Building => "Building",
            Self::FetchingAssets => "Fetching assets",
            Self::StoppingService => "Stopping service",
            Self::InstallingFiles => "Installing files",
            Self::StartingService => "Enabling and starting service",
            Self::Completed => "Provisioning complete",
            Self::Failed => "Provisioning failed",
        }
    }

    /// Returns all stages in order (excluding Failed)
    pub fn all_stages() -> Vec<Self> {
        Self::iter().filter(|s| *s != Self::Failed).collect()
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageTransitionError {
    /// Attempted to skip one or more stages
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    /// Attempted to go backwards
    #[error("Cannot go backwards from {from} to {to} (provisioning is forward-only)")]
    BackwardTransition {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    /// Attempted to transition from a terminal state
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: ProvisionStage },

    /// Attempted to transition to the same state
    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: ProvisionStage },
}

/// Context for tracking a single provisioning run.
///
/// # Example
///
/// ```
/// use spotinstall::install_state::{ProvisionContext, ProvisionStage};
///
/// let mut ctx = ProvisionContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), ProvisionStage::CheckingDependencies);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(ProvisionStage::Building).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    current: ProvisionStage,

    /// Stage at which failure occurred (if any)
    failed_at: Option<ProvisionStage>,

    /// (stage, unix timestamp) for every stage entered
    stage_history: Vec<(ProvisionStage, u64)>,
}

impl Default for ProvisionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self {
            current: ProvisionStage::NotStarted,
            failed_at: None,
            stage_history: Vec::with_capacity(ProvisionStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ProvisionStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<ProvisionStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == ProvisionStage::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == ProvisionStage::Failed
    }

    pub fn stage_history(&self) -> &[(ProvisionStage, u64)] {
        &self.stage_history
    }

    /// Advance to the next stage in sequence.
    pub fn advance(&mut self) -> Result<ProvisionStage, StageTransitionError> {
        let Some(next_stage) = self.current.next() else {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        };

        self.record_stage_transition(next_stage);
        self.current = next_stage;
        Ok(next_stage)
    }

    /// Transition to a specific stage, which must be the next one in sequence.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if current is a terminal state
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    pub fn transition_to(
        &mut self,
        target: ProvisionStage,
    ) -> Result<ProvisionStage, StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(StageTransitionError::AlreadyAtStage { stage: target });
        }

        // Failed is only reachable through fail()
        if target == ProvisionStage::Failed {
            return Err(StageTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(StageTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(StageTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record_stage_transition(target);
        self.current = target;
        Ok(target)
    }

    /// Mark the run as failed, remembering the stage that was running.
    pub fn fail(&mut self) -> Result<(), StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        }

        self.failed_at = Some(self.current);
        self.record_stage_transition(ProvisionStage::Failed);
        self.current = ProvisionStage::Failed;
        Ok(())
    }

    fn record_stage_transition(&mut self, stage: ProvisionStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.stage_history.push((stage, timestamp));
    }
}
