//! Install State Machine
//!
//! The single source of truth for how far the installation has progressed.
//! Transitions are validated so the pipeline cannot skip a stage or touch
//! the disk without confirmation.
//!
//! # Design Principles
//!
//! - **Validated Transitions**: Only forward transitions to the next stage are allowed
//! - **No Global State**: State is owned by `InstallerContext`
//! - **Fail Fast**: Invalid transitions return errors immediately
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! Preflight
//!     ↓
//! CollectingInput
//!     ↓
//! SelectingDisk
//!     ↓
//! PartitioningDisk      (destructive, needs confirmation)
//!     ↓
//! PreparingMirrors
//!     ↓
//! InstallingBaseSystem
//!     ↓
//! GeneratingFstab
//!     ↓
//! ConfiguringChroot
//!     ↓
//! SettingPasswords
//!     ↓
//! ConfiguringResume
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// Installation stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallStage {
    NotStarted = 0,

    /// Environment checks: UEFI, root, required binaries
    Preflight = 1,

    /// Config file values and prompts
    CollectingInput = 2,

    SelectingDisk = 3,

    /// Partition, format and mount.
    /// This is a DESTRUCTIVE stage - requires explicit confirmation
    PartitioningDisk = 4,

    /// reflector, pacman -Syy, keyring
    PreparingMirrors = 5,

    InstallingBaseSystem = 6,

    GeneratingFstab = 7,

    /// Generated script run via arch-chroot
    ConfiguringChroot = 8,

    SettingPasswords = 9,

    /// Hibernation resume from swap
    ConfiguringResume = 10,

    /// Installation completed successfully (terminal state)
    Completed = 11,

    /// Installation failed (terminal state)
    Failed = 255,
}

impl InstallStage {
    /// Numeric order of this stage (255 for Failed)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if this stage involves destructive disk operations
    #[inline]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::PartitioningDisk)
    }

    /// Returns the next stage in the sequence, or None if at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Preflight),
            Self::Preflight => Some(Self::CollectingInput),
            Self::CollectingInput => Some(Self::SelectingDisk),
            Self::SelectingDisk => Some(Self::PartitioningDisk),
            Self::PartitioningDisk => Some(Self::PreparingMirrors),
            Self::PreparingMirrors => Some(Self::InstallingBaseSystem),
            Self::InstallingBaseSystem => Some(Self::GeneratingFstab),
            Self::GeneratingFstab => Some(Self::ConfiguringChroot),
            Self::ConfiguringChroot => Some(Self::SettingPasswords),
            Self::SettingPasswords => Some(Self::ConfiguringResume),
            Self::ConfiguringResume => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Preflight => "Checking the live environment",
            Self::CollectingInput => "Collecting installation settings",
            Self::SelectingDisk => "Selecting the installation drive",
            Self::PartitioningDisk => "Partitioning disk",
            Self::PreparingMirrors => "Preparing mirrors and keyring",
            Self::InstallingBaseSystem => "Installing base system",
            Self::GeneratingFstab => "Generating fstab",
            Self::ConfiguringChroot => "Configuring system",
            Self::SettingPasswords => "Setting passwords",
            Self::ConfiguringResume => "Configuring resume from swap",
            Self::Completed => "Installation complete",
            Self::Failed => "Installation failed",
        }
    }

    /// Approximate progress percentage for this stage
    pub const fn progress_percent(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Preflight => 2,
            Self::CollectingInput => 5,
            Self::SelectingDisk => 10,
            Self::PartitioningDisk => 15,
            Self::PreparingMirrors => 25,
            Self::InstallingBaseSystem => 35,
            Self::GeneratingFstab => 60,
            Self::ConfiguringChroot => 65,
            Self::SettingPasswords => 90,
            Self::ConfiguringResume => 93,
            Self::Completed => 100,
            Self::Failed => 0,
        }
    }

    /// Returns all stages in order (excluding Failed)
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::Preflight,
            Self::CollectingInput,
            Self::SelectingDisk,
            Self::PartitioningDisk,
            Self::PreparingMirrors,
            Self::InstallingBaseSystem,
            Self::GeneratingFstab,
            Self::ConfiguringChroot,
            Self::SettingPasswords,
            Self::ConfiguringResume,
            Self::Completed,
        ]
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: InstallStage,
        to: InstallStage,
    },

    #[error("Cannot go backwards from {from} to {to} (installation is forward-only)")]
    BackwardTransition {
        from: InstallStage,
        to: InstallStage,
    },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Stage {stage} requires explicit confirmation (destructive operation)")]
    MissingConfirmation { stage: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

impl From<InstallTransitionError> for crate::error::InstallError {
    fn from(err: InstallTransitionError) -> Self {
        crate::error::InstallError::InstallTransition(err.to_string())
    }
}

/// Owns the current stage and validates every transition.
///
/// # Example
///
/// ```
/// use archhypr::install_state::{InstallerContext, InstallStage};
///
/// let mut ctx = InstallerContext::new();
/// ctx.transition_to(InstallStage::Preflight).unwrap();
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(InstallStage::PartitioningDisk).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InstallerContext {
    current: InstallStage,
    failed_at: Option<InstallStage>,
    /// (stage, unix timestamp) for every stage entered
    stage_history: Vec<(InstallStage, u64)>,
    destructive_confirmed: bool,
}

impl Default for InstallerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallerContext {
    pub fn new() -> Self {
        Self {
            current: InstallStage::NotStarted,
            failed_at: None,
            stage_history: Vec::with_capacity(InstallStage::all_stages().len()),
            destructive_confirmed: false,
        }
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    /// Stage at which failure occurred, if any
    #[inline]
    pub fn failed_at(&self) -> Option<InstallStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == InstallStage::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == InstallStage::Failed
    }

    pub fn stage_history(&self) -> &[(InstallStage, u64)] {
        &self.stage_history
    }

    /// Authorize the destructive stage. Cannot be revoked.
    pub fn confirm_destructive_operations(&mut self) {
        self.destructive_confirmed = true;
    }

    #[inline]
    pub fn is_destructive_confirmed(&self) -> bool {
        self.destructive_confirmed
    }

    /// Transition to `target`, which must be the next stage in sequence.
    ///
    /// # Errors
    ///
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    /// - `FromTerminalState` if current is a terminal state
    /// - `MissingConfirmation` if entering a destructive stage without confirmation
    pub fn transition_to(
        &mut self,
        target: InstallStage,
    ) -> Result<InstallStage, InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(InstallTransitionError::AlreadyAtStage { stage: target });
        }
        // Failed is only reachable through fail()
        if target == InstallStage::Failed {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        if target.order() < self.current.order() {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        if target.is_destructive() && !self.destructive_confirmed {
            return Err(InstallTransitionError::MissingConfirmation { stage: target });
        }

        self.record_stage_transition(target);
        self.current = target;
        info!("[{:>3}%] {}", target.progress_percent(), target);
        Ok(target)
    }

    /// Mark the installation as failed at the current stage.
    pub fn fail(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }

        error!("Installation failed during: {}", self.current);
        self.failed_at = Some(self.current);
        self.record_stage_transition(InstallStage::Failed);
        self.current = InstallStage::Failed;
        Ok(())
    }

    fn record_stage_transition(&mut self, stage: InstallStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.stage_history.push((stage, timestamp));
    }
}
