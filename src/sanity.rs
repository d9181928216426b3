//! Pre-flight sanity checks for the runtime environment
//!
//! This module verifies the live system before anything is asked or touched:
//! - The machine booted through UEFI
//! - Every external program the pipeline runs is on PATH
//! - Running with root privileges (EUID 0)
//!
//! A failed check becomes [`InstallError::Preflight`] carrying a report that
//! names the fix for each problem.

use crate::error::{InstallError, Result};
use crate::hardware::{self, FirmwareMode};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Every program the install pipeline executes
pub const REQUIRED_BINARIES: &[&str] = &[
    "reflector",
    "pacman",
    "pacman-key",
    "lsblk",
    "fdisk",
    "mkfs.fat",
    "mkswap",
    "swapon",
    "mkfs.btrfs",
    "mount",
    "btrfs",
    "umount",
    "mkdir",
    "pacstrap",
    "genfstab",
    "arch-chroot",
    "ln",
    "hwclock",
    "sed",
    "locale-gen",
    "chpasswd",
    "systemctl",
    "useradd",
    "grub-install",
    "grub-mkconfig",
    "blkid",
];

/// Steps printed when the machine booted in legacy mode
pub const BIOS_REMEDIATION: &str = "\
This installer requires UEFI boot mode.
Your system appears to be booted in BIOS/Legacy mode.
Please ensure your system is booted in UEFI mode and try again.
You may need to:
1. Enter your BIOS/UEFI settings during boot
2. Enable UEFI boot mode
3. Disable CSM (Compatibility Support Module) if present
4. Save and reboot";

/// Result of environment verification
#[derive(Debug, Clone)]
pub struct SanityCheckResult {
    pub firmware: FirmwareMode,
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.firmware.is_uefi() && self.missing_binaries.is_empty() && self.is_root
    }
}

/// Knobs for [`run_preflight_checks`]
#[derive(Debug, Clone)]
pub struct PreflightOptions {
    /// Downgrade missing binaries and root to warnings
    pub dry_run: bool,
    pub skip_root_check: bool,
    pub efi_path: PathBuf,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_root_check: false,
            efi_path: PathBuf::from(hardware::EFI_SYSFS_PATH),
        }
    }
}

/// First executable called `name` in the directories of `search_path`
pub fn find_in_path(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    which::which_in(name, Some(search_path), "/").ok()
}

/// Check if a binary is available in PATH
pub fn binary_exists(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Set ARCHHYPR_SKIP_ROOT_CHECK=1 to skip the root check
pub fn should_skip_root_check() -> bool {
    env::var("ARCHHYPR_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Perform all checks against the live system
pub fn verify_environment(efi_path: &Path) -> SanityCheckResult {
    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|binary| !binary_exists(binary))
        .map(|binary| (*binary).to_string())
        .collect();

    SanityCheckResult {
        firmware: hardware::detect_firmware_mode_at(efi_path),
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

/// Map binary names to their Arch Linux package names
pub fn get_package_for_binary(binary: &str) -> &'static str {
    match binary {
        "reflector" => "reflector",
        "pacman" | "pacman-key" => "pacman",
        "lsblk" | "fdisk" | "mkswap" | "swapon" | "mount" | "umount" | "hwclock" | "blkid" => {
            "util-linux"
        }
        "mkfs.fat" => "dosfstools",
        "mkfs.btrfs" | "btrfs" => "btrfs-progs",
        "mkdir" | "ln" => "coreutils",
        "pacstrap" | "genfstab" | "arch-chroot" => "arch-install-scripts",
        "sed" => "sed",
        "locale-gen" => "glibc",
        "chpasswd" | "useradd" => "shadow",
        "systemctl" => "systemd",
        "grub-install" | "grub-mkconfig" => "grub",
        _ => "unknown",
    }
}

/// Human-readable explanation of every failed check
pub fn failure_report(result: &SanityCheckResult) -> String {
    let mut lines = Vec::new();

    if !result.firmware.is_uefi() {
        lines.push(BIOS_REMEDIATION.to_string());
        lines.push(String::new());
    }

    if !result.is_root {
        lines.push("Root privileges required.".to_string());
        lines.push(
            "This installer must be run as root to partition disks and install packages."
                .to_string(),
        );
        lines.push("  Solution: sudo archhypr".to_string());
        lines.push(String::new());
    }

    if !result.missing_binaries.is_empty() {
        lines.push("Missing required binaries:".to_string());
        for binary in &result.missing_binaries {
            lines.push(format!(
                "  - {} (install: pacman -S {})",
                binary,
                get_package_for_binary(binary)
            ));
        }
        let mut packages: Vec<&str> = result
            .missing_binaries
            .iter()
            .map(|b| get_package_for_binary(b))
            .collect();
        packages.sort_unstable();
        packages.dedup();
        lines.push(format!("  Solution: pacman -S {}", packages.join(" ")));
    }

    lines.join("\n").trim_end().to_string()
}

/// Apply options to a raw result and decide whether the run may proceed.
pub fn evaluate(mut result: SanityCheckResult, options: &PreflightOptions) -> Result<SanityCheckResult> {
    if !result.is_root && (options.skip_root_check || should_skip_root_check()) {
        warn!("Root check skipped (ARCHHYPR_SKIP_ROOT_CHECK=1 or --skip-root-check)");
        result.is_root = true;
    }

    if options.dry_run {
        if !result.is_root {
            warn!("Not running as root; continuing because this is a dry run");
            result.is_root = true;
        }
        if !result.missing_binaries.is_empty() {
            warn!(
                "Missing binaries ignored in dry run: {}",
                result.missing_binaries.join(", ")
            );
            result.missing_binaries.clear();
        }
    }

    if !result.is_ok() {
        return Err(InstallError::preflight(format!(
            "\n{}",
            failure_report(&result)
        )));
    }

    Ok(result)
}

/// Main entry point: verify the environment, failing with a report when a
/// check does not pass.
pub fn run_preflight_checks(options: &PreflightOptions) -> Result<SanityCheckResult> {
    debug!("Running pre-flight sanity checks...");
    let result = evaluate(verify_environment(&options.efi_path), options)?;
    info!("Pre-flight checks passed");
    Ok(result)
}

/// Lighter check for the standalone disk tools: root plus the given
/// binaries. Firmware does not matter for them.
pub fn require_tools(binaries: &[&str], options: &PreflightOptions) -> Result<()> {
    let result = SanityCheckResult {
        firmware: FirmwareMode::Uefi,
        missing_binaries: binaries
            .iter()
            .filter(|binary| !binary_exists(binary))
            .map(|binary| (*binary).to_string())
            .collect(),
        is_root: is_running_as_root(),
    };
    evaluate(result, options).map(|_| ())
}
