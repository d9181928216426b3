//! Block device commands: listing, partitioning, formatting, mounting.

use super::SystemCommand;

/// `lsblk -o NAME,SIZE,TYPE,MOUNTPOINT`
#[derive(Debug, Clone, Default)]
pub struct ListBlockDevices;

impl SystemCommand for ListBlockDevices {
    fn program(&self) -> &'static str {
        "lsblk"
    }

    fn args(&self) -> Vec<String> {
        vec!["-o".to_string(), "NAME,SIZE,TYPE,MOUNTPOINT".to_string()]
    }
}

/// `fdisk -l <device>`
#[derive(Debug, Clone)]
pub struct FdiskList {
    pub device: String,
}

impl SystemCommand for FdiskList {
    fn program(&self) -> &'static str {
        "fdisk"
    }

    fn args(&self) -> Vec<String> {
        vec!["-l".to_string(), self.device.clone()]
    }
}

/// `fdisk <device>` driven by a keystroke script on stdin
#[derive(Debug, Clone)]
pub struct FdiskPartition {
    pub device: String,
    pub script: String,
}

impl SystemCommand for FdiskPartition {
    fn program(&self) -> &'static str {
        "fdisk"
    }

    fn args(&self) -> Vec<String> {
        vec![self.device.clone()]
    }

    fn stdin(&self) -> Option<String> {
        Some(self.script.clone())
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mkfs.fat -F32 <device>`
#[derive(Debug, Clone)]
pub struct MkfsFat {
    pub device: String,
}

impl SystemCommand for MkfsFat {
    fn program(&self) -> &'static str {
        "mkfs.fat"
    }

    fn args(&self) -> Vec<String> {
        vec!["-F32".to_string(), self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mkswap <device>`
#[derive(Debug, Clone)]
pub struct MkSwap {
    pub device: String,
}

impl SystemCommand for MkSwap {
    fn program(&self) -> &'static str {
        "mkswap"
    }

    fn args(&self) -> Vec<String> {
        vec![self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `swapon <device>`
#[derive(Debug, Clone)]
pub struct SwapOn {
    pub device: String,
}

impl SystemCommand for SwapOn {
    fn program(&self) -> &'static str {
        "swapon"
    }

    fn args(&self) -> Vec<String> {
        vec![self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mkfs.btrfs -f <device>`
#[derive(Debug, Clone)]
pub struct MkfsBtrfs {
    pub device: String,
}

impl SystemCommand for MkfsBtrfs {
    fn program(&self) -> &'static str {
        "mkfs.btrfs"
    }

    fn args(&self) -> Vec<String> {
        vec!["-f".to_string(), self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mount [-o <options>] <source> <target>`
#[derive(Debug, Clone)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub options: Option<String>,
}

impl SystemCommand for Mount {
    fn program(&self) -> &'static str {
        "mount"
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(4);
        if let Some(options) = &self.options {
            args.push("-o".to_string());
            args.push(options.clone());
        }
        args.push(self.source.clone());
        args.push(self.target.clone());
        args
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `umount <target>`
#[derive(Debug, Clone)]
pub struct Umount {
    pub target: String,
}

impl SystemCommand for Umount {
    fn program(&self) -> &'static str {
        "umount"
    }

    fn args(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `btrfs subvolume create <path>`
#[derive(Debug, Clone)]
pub struct BtrfsSubvolumeCreate {
    pub path: String,
}

impl SystemCommand for BtrfsSubvolumeCreate {
    fn program(&self) -> &'static str {
        "btrfs"
    }

    fn args(&self) -> Vec<String> {
        vec![
            "subvolume".to_string(),
            "create".to_string(),
            self.path.clone(),
        ]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mkdir -p <paths...>`
#[derive(Debug, Clone)]
pub struct MakeDirs {
    pub paths: Vec<String>,
}

impl SystemCommand for MakeDirs {
    fn program(&self) -> &'static str {
        "mkdir"
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string()];
        args.extend(self.paths.iter().cloned());
        args
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `blkid -s UUID -o value <device>`
///
/// Read-only, but the device only has a UUID after formatting, so it is
/// skipped in dry runs.
#[derive(Debug, Clone)]
pub struct BlkidUuid {
    pub device: String,
}

impl SystemCommand for BlkidUuid {
    fn program(&self) -> &'static str {
        "blkid"
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-s".to_string(),
            "UUID".to_string(),
            "-o".to_string(),
            "value".to_string(),
            self.device.clone(),
        ]
    }

    fn runs_in_dry_run(&self) -> bool {
        false
    }
}
