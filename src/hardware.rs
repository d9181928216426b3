//! Hardware environment detection
//!
//! Detects firmware mode (UEFI vs BIOS), network connectivity and the CPU
//! vendor using plain filesystem reads and a TCP probe. Nothing here shells
//! out.
//!
//! Each probe has an `_at` variant taking the path to read so tests can point
//! it at a scratch tree instead of the live `/sys` and `/proc`.

use std::fmt;
use std::fs;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The kernel exposes this directory only when booted through UEFI
pub const EFI_SYSFS_PATH: &str = "/sys/firmware/efi";

pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Host and port dialled by the connectivity probe
pub const CONNECTIVITY_HOST: &str = "archlinux.org:443";

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Detected firmware mode of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareMode {
    /// UEFI firmware: GPT with an EFI system partition
    Uefi,
    /// Legacy BIOS or CSM boot
    Bios,
}

impl FirmwareMode {
    /// Returns true if the system booted in UEFI mode.
    pub fn is_uefi(self) -> bool {
        matches!(self, Self::Uefi)
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uefi => write!(f, "UEFI"),
            Self::Bios => write!(f, "BIOS"),
        }
    }
}

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// TCP connection to archlinux.org:443 succeeded
    Online,
    /// TCP connection failed or timed out
    Offline,
}

impl NetworkState {
    /// Returns true if network connectivity is available.
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "Online"),
            Self::Offline => write!(f, "Offline"),
        }
    }
}

/// CPU vendor, used to pick a microcode package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
    Unknown,
}

impl CpuVendor {
    /// Read the `vendor_id` line of `/proc/cpuinfo` content.
    pub fn from_cpuinfo(cpuinfo: &str) -> Self {
        let vendor = cpuinfo.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == "vendor_id").then(|| value.trim())
        });
        match vendor {
            Some("GenuineIntel") => Self::Intel,
            Some("AuthenticAMD") => Self::Amd,
            _ => Self::Unknown,
        }
    }

    /// Microcode package for this vendor, if there is one
    pub fn microcode_package(self) -> Option<&'static str> {
        match self {
            Self::Intel => Some("intel-ucode"),
            Self::Amd => Some("amd-ucode"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intel => write!(f, "Intel"),
            Self::Amd => write!(f, "AMD"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Firmware mode from the presence of the EFI sysfs directory.
pub fn detect_firmware_mode_at(efi_path: &Path) -> FirmwareMode {
    if efi_path.exists() {
        info!("UEFI firmware detected ({} exists)", efi_path.display());
        FirmwareMode::Uefi
    } else {
        info!("BIOS firmware detected ({} not found)", efi_path.display());
        FirmwareMode::Bios
    }
}

/// Connectivity via a TCP connection to archlinux.org.
pub fn detect_internet() -> NetworkState {
    detect_internet_at(CONNECTIVITY_HOST)
}

/// Resolve `host` (`name:port`) and try each address in turn.
pub fn detect_internet_at(host: &str) -> NetworkState {
    let addrs: Vec<SocketAddr> = match host.to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            warn!("Cannot resolve {}: {}", host, e);
            return NetworkState::Offline;
        }
    };

    for addr in &addrs {
        match TcpStream::connect_timeout(addr, CONNECTIVITY_TIMEOUT) {
            Ok(_stream) => {
                info!("Network connectivity confirmed (TCP to {})", host);
                return NetworkState::Online;
            }
            Err(e) => debug!("Connection to {} ({}) failed: {}", host, addr, e),
        }
    }
    warn!("Network connectivity check failed: no address of {} answered", host);
    NetworkState::Offline
}

/// CPU vendor from a cpuinfo file. Unreadable files give `Unknown`.
pub fn detect_cpu_vendor_at(cpuinfo_path: &Path) -> CpuVendor {
    match fs::read_to_string(cpuinfo_path) {
        Ok(content) => CpuVendor::from_cpuinfo(&content),
        Err(e) => {
            warn!("Cannot read {}: {}", cpuinfo_path.display(), e);
            CpuVendor::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_mode_display() {
        assert_eq!(FirmwareMode::Uefi.to_string(), "UEFI");
        assert_eq!(FirmwareMode::Bios.to_string(), "BIOS");
        assert!(FirmwareMode::Uefi.is_uefi());
        assert!(!FirmwareMode::Bios.is_uefi());
    }

    #[test]
    fn test_network_state_predicates() {
        assert!(NetworkState::Online.is_online());
        assert!(!NetworkState::Offline.is_online());
    }

    #[test]
    fn test_detect_firmware_mode_at() {
        let dir = tempfile::tempdir().unwrap();
        let efi = dir.path().join("efi");
        assert_eq!(detect_firmware_mode_at(&efi), FirmwareMode::Bios);
        fs::create_dir(&efi).unwrap();
        assert_eq!(detect_firmware_mode_at(&efi), FirmwareMode::Uefi);
    }

    #[test]
    fn test_cpu_vendor_from_cpuinfo() {
        let intel = "processor\t: 0\nvendor_id\t: GenuineIntel\ncpu family\t: 6\n";
        let amd = "processor\t: 0\nvendor_id\t: AuthenticAMD\n";
        let arm = "processor\t: 0\nBogoMIPS\t: 48.00\n";
        assert_eq!(CpuVendor::from_cpuinfo(intel), CpuVendor::Intel);
        assert_eq!(CpuVendor::from_cpuinfo(amd), CpuVendor::Amd);
        assert_eq!(CpuVendor::from_cpuinfo(arm), CpuVendor::Unknown);
        assert_eq!(CpuVendor::from_cpuinfo(""), CpuVendor::Unknown);
    }

    #[test]
    fn test_microcode_package() {
        assert_eq!(CpuVendor::Intel.microcode_package(), Some("intel-ucode"));
        assert_eq!(CpuVendor::Amd.microcode_package(), Some("amd-ucode"));
        assert_eq!(CpuVendor::Unknown.microcode_package(), None);
    }

    #[test]
    fn test_detect_cpu_vendor_at_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_cpu_vendor_at(&dir.path().join("cpuinfo")), CpuVendor::Unknown);

        let path = dir.path().join("cpuinfo");
        fs::write(&path, "vendor_id : AuthenticAMD\n").unwrap();
        assert_eq!(detect_cpu_vendor_at(&path), CpuVendor::Amd);
    }

    #[test]
    fn test_detect_internet_at_listening_socket() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        assert_eq!(detect_internet_at(&host), NetworkState::Online);
    }

    #[test]
    fn test_detect_internet_at_closed_port_is_offline() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert_eq!(detect_internet_at(&format!("127.0.0.1:{}", port)), NetworkState::Offline);
        assert_eq!(detect_internet_at("not a host"), NetworkState::Offline);
    }
}
