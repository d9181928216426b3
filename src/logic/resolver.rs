//! Package & Service Resolver
//!
//! Names every package, service and group the installed system gets.
//!
//! # Resolution Rules
//!
//! | Input         | Resolved To |
//! |---------------|-------------|
//! | (always)      | [`BASE_PACKAGES`] via pacstrap |
//! | (always)      | [`DESKTOP_PACKAGES`] inside the chroot |
//! | CPU vendor    | `intel-ucode` / `amd-ucode` / nothing |
//! | `gpu`         | [`GpuDriver::packages`] |
//! | (always)      | [`SERVICES`] enabled with systemctl |

use crate::hardware::CpuVendor;
use crate::types::GpuDriver;

// ============================================================================
// Package Lists
// ============================================================================

/// Installed into the target by `pacstrap`.
pub const BASE_PACKAGES: &[&str] = &[
    "base",
    "linux",
    "linux-firmware",
    "nano",
    "neovim",
    "sof-firmware",
    "base-devel",
    "grub",
    "grub-btrfs",
    "efibootmgr",
    "networkmanager",
    "snapper",
];

/// Hyprland desktop and everyday tools, installed from inside the chroot.
pub const DESKTOP_PACKAGES: &[&str] = &[
    "mtools",
    "cmake",
    "docker",
    "yt-dlp",
    "python",
    "fastfetch",
    "whois",
    "zsh",
    "git",
    "dosfstools",
    "man",
    "less",
    "xclip",
    "linux-headers",
    "reflector",
    "hyprland",
    "sddm",
    "kitty",
    "kate",
    "p7zip",
    "firefox",
    "btop",
    "vlc",
    "smplayer",
    "unrar",
    "pipewire",
    "pipewire-alsa",
    "dolphin",
    "pipewire-pulse",
];

/// systemd units enabled in the target, in this order.
pub const SERVICES: &[&str] = &[
    "sddm",
    "NetworkManager",
    "snapper-timeline.timer",
    "snapper-cleanup.timer",
    "grub-btrfsd.service",
    "docker",
];

/// Supplementary groups for the new user.
pub const USER_GROUPS: &[&str] = &["wheel", "storage", "power", "audio", "video", "docker"];

// ============================================================================
// Resolution
// ============================================================================

/// Packages for `pacstrap`.
pub fn pacstrap_packages() -> Vec<String> {
    BASE_PACKAGES.iter().map(|s| s.to_string()).collect()
}

/// Microcode for the detected CPU; logs a warning when the vendor is unknown.
pub fn microcode_package(cpu: CpuVendor) -> Option<&'static str> {
    let package = cpu.microcode_package();
    if package.is_none() {
        tracing::warn!("Unknown CPU vendor, no microcode package will be installed");
    }
    package
}

/// Package groups installed inside the chroot, one `pacman -S` each.
///
/// Order: desktop set, microcode (if any), GPU driver set.
pub fn chroot_package_groups(gpu: GpuDriver, microcode: Option<&str>) -> Vec<Vec<String>> {
    let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let mut groups = vec![owned(DESKTOP_PACKAGES)];
    if let Some(ucode) = microcode {
        groups.push(vec![ucode.to_string()]);
    }
    groups.push(owned(gpu.packages()));
    groups
}

/// `wheel,storage,...` for `useradd -G`
pub fn user_groups_arg() -> String {
    USER_GROUPS.join(",")
}
