//! Logic modules: what gets installed and configured in the new system.
//!
//! # Modules
//!
//! - `resolver`: package, service and group names
//! - `chroot_script`: the script run inside `arch-chroot`
//! - `accounts`: password hashing and `chpasswd -e`
//! - `resume`: hibernation resume from the swap partition

pub mod accounts;
pub mod chroot_script;
pub mod resolver;
pub mod resume;
