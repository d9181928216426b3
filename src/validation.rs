//! Input predicates
//!
//! Plain `is_valid_*` functions answer yes/no. The `check_*` wrappers turn a
//! rejection into an [`InstallError::Validation`] carrying the hint shown to
//! the user when they are re-prompted.

use crate::error::{InstallError, Result};
use crate::types::GpuDriver;
use std::path::Path;

/// Where the live system keeps the tz database
pub const ZONEINFO_ROOT: &str = "/usr/share/zoneinfo";

pub const USERNAME_HINT: &str =
    "Invalid username. Use lowercase letters, digits, '-', '_', start with a letter or '_', max 32 chars.";
pub const HOSTNAME_HINT: &str =
    "Invalid hostname label. Use letters, digits, optional '-', 1-63 chars, cannot start/end with '-'.";
pub const COUNTRY_HINT: &str = "Invalid country. Use letters and spaces only (e.g., Iran, United States).";
pub const TIMEZONE_HINT: &str =
    "Timezone not found in /usr/share/zoneinfo. Please try again (e.g., Europe/Berlin, Asia/Tehran).";
pub const DISK_HINT: &str = "The drive name was incorrect, try again.";
pub const GPU_HINT: &str = "Invalid choice. Please enter a number between 0 and 4.";
pub const SWAP_SIZE_HINT: &str = "Invalid swap size. Use a whole number followed by M or G (e.g., 4G).";
pub const VOLUME_NAME_HINT: &str =
    "Invalid name. Use letters, digits, '_', '+', '.', '-', 1-64 chars, cannot start with '-'.";

/// Linux account name: `[a-z_][a-z0-9_-]*`, at most 32 characters.
pub fn is_valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if name.len() > 32 {
        return false;
    }
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Single RFC 1123 label.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    if name.starts_with('-') || name.ends_with('-') {
        return false;
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Country name as understood by reflector: letters and spaces.
pub fn is_valid_country(country: &str) -> bool {
    !country.trim().is_empty()
        && country.len() <= 64
        && country.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
}

/// Syntactic check of a tz database name.
///
/// Rejects anything that could escape the zoneinfo directory.
pub fn is_valid_timezone_name(tz: &str) -> bool {
    if tz.is_empty() || tz.len() > 128 || tz.starts_with('/') || tz.ends_with('/') {
        return false;
    }
    if !tz
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '/'))
    {
        return false;
    }
    tz.split('/')
        .all(|part| !part.is_empty() && part != "." && part != "..")
}

/// True when `tz` names a zone file under `zoneinfo_root`.
pub fn timezone_exists(zoneinfo_root: &Path, tz: &str) -> bool {
    if !is_valid_timezone_name(tz) {
        return false;
    }
    zoneinfo_root.join(tz).is_file()
}

/// Kernel name of a disk given either bare (`sda`) or as `/dev/sda`
pub fn bare_disk_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("/dev/").unwrap_or(name)
}

/// Installation target: `sd[a-z]` or `nvme<N>n<M>`.
pub fn is_valid_disk_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() == 3 && name.starts_with("sd") && bytes[2].is_ascii_lowercase() {
        return true;
    }
    let Some(rest) = name.strip_prefix("nvme") else {
        return false;
    };
    let Some((controller, namespace)) = rest.split_once('n') else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(controller) && all_digits(namespace)
}

/// fdisk size suffix: `<digits>M` or `<digits>G`, greater than zero.
pub fn is_valid_swap_size(size: &str) -> bool {
    let Some(number) = size.strip_suffix(['M', 'G']) else {
        return false;
    };
    !number.is_empty()
        && number.bytes().all(|b| b.is_ascii_digit())
        && number.bytes().any(|b| b != b'0')
}

/// Device-mapper or LVM volume group name.
pub fn is_valid_volume_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && !name.starts_with('-')
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'))
}

pub fn is_valid_password(password: &str) -> bool {
    !password.is_empty()
}

pub fn check_username(name: &str) -> Result<()> {
    if is_valid_username(name) {
        Ok(())
    } else {
        Err(InstallError::validation(USERNAME_HINT))
    }
}

pub fn check_hostname(name: &str) -> Result<()> {
    if is_valid_hostname(name) {
        Ok(())
    } else {
        Err(InstallError::validation(HOSTNAME_HINT))
    }
}

pub fn check_country(country: &str) -> Result<()> {
    if is_valid_country(country) {
        Ok(())
    } else {
        Err(InstallError::validation(COUNTRY_HINT))
    }
}

pub fn check_timezone(zoneinfo_root: &Path, tz: &str) -> Result<()> {
    if timezone_exists(zoneinfo_root, tz) {
        Ok(())
    } else {
        Err(InstallError::validation(TIMEZONE_HINT))
    }
}

pub fn check_disk_name(name: &str) -> Result<()> {
    if is_valid_disk_name(name) {
        Ok(())
    } else {
        Err(InstallError::validation(DISK_HINT))
    }
}

pub fn check_gpu_choice(value: &str) -> Result<GpuDriver> {
    GpuDriver::from_choice(value).ok_or_else(|| InstallError::validation(GPU_HINT))
}

pub fn check_swap_size(size: &str) -> Result<()> {
    if is_valid_swap_size(size) {
        Ok(())
    } else {
        Err(InstallError::validation(SWAP_SIZE_HINT))
    }
}
