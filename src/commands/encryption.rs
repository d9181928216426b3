//! LUKS and LVM commands for preparing an encrypted USB volume.
//!
//! cryptsetup asks for the passphrase itself, so these run attached to the
//! terminal and the installer never sees the passphrase.

use super::SystemCommand;

/// `cryptsetup luksFormat <device>`
#[derive(Debug, Clone)]
pub struct LuksFormat {
    pub device: String,
}

impl SystemCommand for LuksFormat {
    fn program(&self) -> &'static str {
        "cryptsetup"
    }

    fn args(&self) -> Vec<String> {
        vec!["luksFormat".to_string(), self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// `cryptsetup luksOpen <device> <name>`
#[derive(Debug, Clone)]
pub struct LuksOpen {
    pub device: String,
    pub name: String,
}

impl SystemCommand for LuksOpen {
    fn program(&self) -> &'static str {
        "cryptsetup"
    }

    fn args(&self) -> Vec<String> {
        vec![
            "luksOpen".to_string(),
            self.device.clone(),
            self.name.clone(),
        ]
    }

    fn is_destructive(&self) -> bool {
        true
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// `pvcreate <device>`
#[derive(Debug, Clone)]
pub struct PvCreate {
    pub device: String,
}

impl SystemCommand for PvCreate {
    fn program(&self) -> &'static str {
        "pvcreate"
    }

    fn args(&self) -> Vec<String> {
        vec![self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `vgcreate <name> <device>`
#[derive(Debug, Clone)]
pub struct VgCreate {
    pub name: String,
    pub device: String,
}

impl SystemCommand for VgCreate {
    fn program(&self) -> &'static str {
        "vgcreate"
    }

    fn args(&self) -> Vec<String> {
        vec![self.name.clone(), self.device.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}
