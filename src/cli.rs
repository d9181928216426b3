use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::installer::DEFAULT_TARGET_ROOT;

/// archhypr - Btrfs + Hyprland Arch Linux installer
#[derive(Parser, Debug)]
#[command(name = "archhypr")]
#[command(about = "Installs Arch Linux with Btrfs snapshots and a Hyprland desktop")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be executed without making changes.
    ///
    /// Destructive commands (fdisk, mkfs, mount, pacstrap, ...) are logged
    /// and skipped. Disk listings still run so the preview is realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Do not require root (development only)
    #[arg(long, global = true)]
    pub skip_root_check: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the full installation (default)
    Install {
        /// JSON config file; defaults to ./default_config.json if present
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Installation drive (e.g., sda or nvme0n1)
        #[arg(short, long)]
        disk: Option<String>,

        /// Where the new system is mounted
        #[arg(long, default_value = DEFAULT_TARGET_ROOT)]
        target: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Partition a disk with the standard layout and stop
    Partition {
        /// Disk to partition (prompted for if omitted)
        disk: Option<String>,

        /// Swap partition size (e.g., 4G, 512M)
        #[arg(long)]
        swap_size: Option<String>,
    },
    /// Encrypt a USB drive with LUKS and create an LVM volume group on it
    LuksUsb {
        /// USB device (e.g., sdb); prompted for if omitted
        device: Option<String>,

        /// Device-mapper name for the unlocked volume
        #[arg(long, default_value = "cryptlvm")]
        mapper: String,

        /// Volume group name
        #[arg(long, default_value = "vg0")]
        volume_group: String,
    },
    /// Print the chroot configuration script a config file produces
    RenderScript {
        config: PathBuf,
    },
    /// Write a sample configuration file
    Template {
        #[arg(default_value = crate::config_file::DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// The subcommand to run; no subcommand means `install` with defaults
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Install {
            config: None,
            disk: None,
            target: PathBuf::from(DEFAULT_TARGET_ROOT),
        })
    }
}
