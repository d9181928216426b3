//! Storage Stack Engine
//!
//! Translates the chosen disk into an ordered sequence of atomic
//! [`StorageOp`] operations, then executes them through a
//! [`CommandRunner`].
//!
//! # Layout
//!
//! ```text
//! <disk>1  EFI System   256M        FAT32   /boot
//! <disk>2  Linux swap   4G (conf.)  swap
//! <disk>3  Linux fs     rest        Btrfs   @ @home @var @snapshots
//! ```
//!
//! # Design
//!
//! - **Pure planning**: [`calculate_storage_plan`] does no I/O
//! - **Typed output**: each `StorageOp` maps to one typed command
//! - **Ordered**: subvolumes are created on a temporary top-level mount,
//!   which is unmounted before `@` is mounted as the root

use crate::commands::disk::{
    BtrfsSubvolumeCreate, FdiskList, FdiskPartition, MakeDirs, MkSwap, MkfsBtrfs, MkfsFat, Mount,
    SwapOn, Umount,
};
use crate::commands::{SystemCommand, dev_path};
use crate::runner::{self, CommandRunner};
use crate::validation;
use anyhow::{Context, Result, bail};
use std::fmt;
use tracing::info;

/// Mount options shared by every Btrfs subvolume
pub const BTRFS_MOUNT_OPTIONS: &str = "noatime,compress=lzo,space_cache=v2";

/// Subvolumes and where they are mounted, relative to the target root
pub const SUBVOLUMES: &[(&str, &str)] = &[
    ("@", ""),
    ("@home", "home"),
    ("@var", "var"),
    ("@snapshots", ".snapshots"),
];

/// EFI System Partition size
pub const EFI_SIZE: &str = "256M";

/// fdisk partition type numbers in GPT mode
const TYPE_EFI: u8 = 1;
const TYPE_SWAP: u8 = 19;
const TYPE_LINUX: u8 = 20;

/// Keystrokes for `fdisk <disk>`: new GPT table, three partitions, set
/// types, print, write.
pub fn fdisk_script(swap_size: &str) -> String {
    let mut keys: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| keys.extend(items.iter().map(|s| s.to_string()));

    push(&["g"]);
    let efi = format!("+{}", EFI_SIZE);
    let swap = format!("+{}", swap_size);
    // n, number, default first sector, last sector ("" = rest of disk)
    push(&["n", "1", "", &efi]);
    push(&["n", "2", "", &swap]);
    push(&["n", "3", "", ""]);
    for (num, part_type) in [(1, TYPE_EFI), (2, TYPE_SWAP), (3, TYPE_LINUX)] {
        push(&["t", &num.to_string(), &part_type.to_string()]);
    }
    push(&["p", "w"]);

    let mut script = keys.join("\n");
    script.push('\n');
    script
}

/// Partition device path for a disk and partition number.
///
/// Disks whose name ends in a digit (`/dev/nvme0n1`, `/dev/loop0`) use a
/// `p` separator; others (`/dev/sda`) append the number directly.
pub fn partition_path(disk: &str, number: u32) -> String {
    if disk.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{}p{}", disk, number)
    } else {
        format!("{}{}", disk, number)
    }
}

/// The three partitions of the fixed layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLayout {
    pub disk: String,
    pub efi: String,
    pub swap: String,
    pub root: String,
}

impl DiskLayout {
    /// Layout for a disk given by kernel name (`sda`) or path (`/dev/sda`)
    pub fn for_disk(disk: &str) -> Self {
        let disk = dev_path(disk);
        Self {
            efi: partition_path(&disk, 1),
            swap: partition_path(&disk, 2),
            root: partition_path(&disk, 3),
            disk,
        }
    }
}

impl fmt::Display for DiskLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.efi, self.swap, self.root)
    }
}

/// A single atomic storage operation in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Write a new partition table with fdisk
    Partition { disk: String, script: String },
    /// Print the partition table (diagnostic, failures ignored)
    ShowPartitionTable { disk: String },
    FormatEfi { device: String },
    FormatSwap { device: String },
    EnableSwap { device: String },
    FormatBtrfs { device: String },
    Mount {
        device: String,
        mountpoint: String,
        options: Option<String>,
    },
    CreateSubvolume { path: String },
    Unmount { mountpoint: String },
    MakeDirs { paths: Vec<String> },
}

impl StorageOp {
    /// The command that performs this operation
    pub fn to_command(&self) -> Box<dyn SystemCommand> {
        match self {
            Self::Partition { disk, script } => Box::new(FdiskPartition {
                device: disk.clone(),
                script: script.clone(),
            }),
            Self::ShowPartitionTable { disk } => Box::new(FdiskList { device: disk.clone() }),
            Self::FormatEfi { device } => Box::new(MkfsFat { device: device.clone() }),
            Self::FormatSwap { device } => Box::new(MkSwap { device: device.clone() }),
            Self::EnableSwap { device } => Box::new(SwapOn { device: device.clone() }),
            Self::FormatBtrfs { device } => Box::new(MkfsBtrfs { device: device.clone() }),
            Self::Mount {
                device,
                mountpoint,
                options,
            } => Box::new(Mount {
                source: device.clone(),
                target: mountpoint.clone(),
                options: options.clone(),
            }),
            Self::CreateSubvolume { path } => Box::new(BtrfsSubvolumeCreate { path: path.clone() }),
            Self::Unmount { mountpoint } => Box::new(Umount {
                target: mountpoint.clone(),
            }),
            Self::MakeDirs { paths } => Box::new(MakeDirs { paths: paths.clone() }),
        }
    }
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partition { disk, .. } => write!(f, "Partition({}, GPT: EFI + swap + root)", disk),
            Self::ShowPartitionTable { disk } => write!(f, "ShowPartitionTable({})", disk),
            Self::FormatEfi { device } => write!(f, "FormatEfi({})", device),
            Self::FormatSwap { device } => write!(f, "FormatSwap({})", device),
            Self::EnableSwap { device } => write!(f, "EnableSwap({})", device),
            Self::FormatBtrfs { device } => write!(f, "FormatBtrfs({})", device),
            Self::Mount {
                device,
                mountpoint,
                options,
            } => write!(f, "Mount({} -> {}, opts={:?})", device, mountpoint, options),
            Self::CreateSubvolume { path } => write!(f, "CreateSubvolume({})", path),
            Self::Unmount { mountpoint } => write!(f, "Unmount({})", mountpoint),
            Self::MakeDirs { paths } => write!(f, "MakeDirs({})", paths.join(" ")),
        }
    }
}

/// A complete storage plan: an ordered list of operations.
#[derive(Debug, Clone)]
pub struct StoragePlan {
    pub layout: DiskLayout,
    pub ops: Vec<StorageOp>,
}

impl StoragePlan {
    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Storage Plan for {}", self.layout.disk),
            format!("  Partitions: {}", self.layout),
            format!("  Operations ({}):", self.ops.len()),
        ];
        for (i, op) in self.ops.iter().enumerate() {
            lines.push(format!("    {}. {}", i + 1, op));
        }
        lines.join("\n")
    }
}

fn join_root(root: &str, relative: &str) -> String {
    let root = root.trim_end_matches('/');
    if relative.is_empty() {
        if root.is_empty() { "/".to_string() } else { root.to_string() }
    } else {
        format!("{}/{}", root, relative)
    }
}

fn subvol_options(subvolume: &str) -> String {
    format!("{},subvol={}", BTRFS_MOUNT_OPTIONS, subvolume)
}

fn check_inputs(disk: &str, swap_size: &str) -> Result<()> {
    validation::check_disk_name(validation::bare_disk_name(disk)).with_context(|| format!("Invalid disk '{}'", disk))?;
    validation::check_swap_size(swap_size)
        .with_context(|| format!("Invalid swap size '{}'", swap_size))?;
    Ok(())
}

/// Plan that only writes the partition table and shows the result.
pub fn calculate_partition_plan(disk: &str, swap_size: &str) -> Result<StoragePlan> {
    check_inputs(disk, swap_size)?;
    let layout = DiskLayout::for_disk(disk);
    let ops = vec![
        StorageOp::Partition {
            disk: layout.disk.clone(),
            script: fdisk_script(swap_size),
        },
        StorageOp::ShowPartitionTable {
            disk: layout.disk.clone(),
        },
    ];
    Ok(StoragePlan { layout, ops })
}

/// Full plan: partition, format, create subvolumes and mount everything
/// under `root`.
///
/// # Errors
///
/// Returns an error if the disk name or swap size is malformed. Nothing is
/// executed.
pub fn calculate_storage_plan(disk: &str, swap_size: &str, root: &str) -> Result<StoragePlan> {
    if root.trim().is_empty() {
        bail!("No target root given for the storage plan");
    }

    let mut plan = calculate_partition_plan(disk, swap_size)?;
    let layout = plan.layout.clone();
    let ops = &mut plan.ops;

    ops.push(StorageOp::FormatEfi {
        device: layout.efi.clone(),
    });
    ops.push(StorageOp::FormatSwap {
        device: layout.swap.clone(),
    });
    ops.push(StorageOp::EnableSwap {
        device: layout.swap.clone(),
    });
    ops.push(StorageOp::FormatBtrfs {
        device: layout.root.clone(),
    });

    // Top-level volume, only long enough to create the subvolumes
    let top = join_root(root, "");
    ops.push(StorageOp::Mount {
        device: layout.root.clone(),
        mountpoint: top.clone(),
        options: None,
    });
    for (subvolume, _) in SUBVOLUMES {
        ops.push(StorageOp::CreateSubvolume {
            path: join_root(root, subvolume),
        });
    }
    ops.push(StorageOp::Unmount {
        mountpoint: top.clone(),
    });

    ops.push(StorageOp::Mount {
        device: layout.root.clone(),
        mountpoint: top,
        options: Some(subvol_options("@")),
    });
    ops.push(StorageOp::MakeDirs {
        paths: ["boot", "var", "home", ".snapshots"]
            .iter()
            .map(|dir| join_root(root, dir))
            .collect(),
    });
    for (subvolume, mountpoint) in SUBVOLUMES.iter().filter(|(_, m)| !m.is_empty()) {
        ops.push(StorageOp::Mount {
            device: layout.root.clone(),
            mountpoint: join_root(root, mountpoint),
            options: Some(subvol_options(subvolume)),
        });
    }
    ops.push(StorageOp::Mount {
        device: layout.efi.clone(),
        mountpoint: join_root(root, "boot"),
        options: None,
    });

    Ok(plan)
}

/// Execute a plan in order, stopping at the first failure.
pub fn apply_storage_plan(plan: &StoragePlan, runner: &mut dyn CommandRunner) -> Result<()> {
    info!("{}", plan.summary());

    for op in &plan.ops {
        let command = op.to_command();
        match op {
            StorageOp::Partition { disk, .. } => {
                println!("\nPartitioning {}...", disk);
                runner::run_checked(runner, command.as_ref())
                    .with_context(|| format!("Partitioning {} failed", disk))?;
            }
            StorageOp::ShowPartitionTable { .. } => {
                println!("\nResulting partition table:");
                runner::run_unchecked(runner, command.as_ref())?;
                println!("\nUsing partitions: {}", plan.layout);
            }
            _ => {
                runner::run_checked(runner, command.as_ref())
                    .with_context(|| format!("Storage step failed: {}", op))?;
            }
        }
    }

    info!("Storage plan complete for {}", plan.layout.disk);
    Ok(())
}
