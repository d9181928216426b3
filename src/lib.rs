//! archhypr library
//!
//! Core of the Btrfs + Hyprland Arch Linux installer: input validation,
//! typed external commands, the storage plan, the generated chroot
//! configuration and the pipeline that ties them together.

pub mod cli;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod install_state;
pub mod installer;
pub mod logic;
pub mod process_guard;
pub mod prompt;
pub mod runner;
pub mod sanity;
pub mod shell;
pub mod target;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use config::InstallConfig;
pub use config_file::InstallationConfig;
pub use error::InstallError;
pub use install_state::{InstallStage, InstallTransitionError, InstallerContext};
pub use installer::{InstallOptions, InstallReport, Installer};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
pub use runner::{CommandRunner, RecordingRunner, SystemRunner};
pub use types::{GpuDriver, Secret};

// Hardware detection
pub use hardware::{CpuVendor, FirmwareMode, NetworkState};

// Storage engine
pub use engine::storage::{StorageOp, StoragePlan, calculate_storage_plan};
