//! Typed configuration values
//!
//! The installer only has flat values. The GPU driver choice is the one
//! value with behaviour attached (its package set), so it gets an enum.

use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Graphics driver selection, numbered as on the interactive menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum GpuDriver {
    /// Open-source Mesa with nouveau
    #[strum(serialize = "mesa")]
    Mesa,
    /// NVIDIA open kernel modules
    #[strum(serialize = "nvidia-open")]
    NvidiaOpen,
    /// NVIDIA proprietary modules
    #[strum(serialize = "nvidia")]
    NvidiaProprietary,
    #[strum(serialize = "intel")]
    Intel,
    /// Guest without a dedicated driver
    #[strum(serialize = "virtualbox")]
    VirtualBox,
}

impl GpuDriver {
    /// Menu number for this driver (0-4)
    pub const fn choice(self) -> u8 {
        match self {
            Self::Mesa => 0,
            Self::NvidiaOpen => 1,
            Self::NvidiaProprietary => 2,
            Self::Intel => 3,
            Self::VirtualBox => 4,
        }
    }

    /// Parse a menu answer or config value.
    ///
    /// Accepts the menu digit (`"0"`..`"4"`) or the driver name.
    pub fn from_choice(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(driver) = Self::iter().find(|d| d.choice().to_string() == value) {
            return Some(driver);
        }
        value.to_ascii_lowercase().parse().ok()
    }

    /// Menu label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mesa => "mesa (open-source)",
            Self::NvidiaOpen => "new open nvidia (nvidia-open-dkms)",
            Self::NvidiaProprietary => "proprietary Nvidia (nvidia-dkms)",
            Self::Intel => "intel",
            Self::VirtualBox => "VirtualBox",
        }
    }

    /// Packages installed inside the chroot for this driver
    pub const fn packages(self) -> &'static [&'static str] {
        match self {
            Self::Mesa => &[
                "libva-mesa-driver",
                "vulkan-nouveau",
                "xf86-video-nouveau",
                "xorg-server",
                "xorg-xinit",
                "mesa-utils",
                "mesa",
            ],
            Self::NvidiaOpen => &[
                "dkms",
                "libva-nvidia-driver",
                "nvidia-open-dkms",
                "xorg-server",
                "xorg-xinit",
            ],
            Self::NvidiaProprietary => &[
                "dkms",
                "libva-nvidia-driver",
                "nvidia-dkms",
                "xorg-server",
                "xorg-xinit",
            ],
            Self::Intel => &[
                "intel-media-driver",
                "libva-intel-driver",
                "mesa",
                "vulkan-intel",
                "xorg-server",
                "xorg-xinit",
            ],
            Self::VirtualBox => &["mesa", "xorg-server", "xorg-xinit"],
        }
    }

    /// The full selection menu, one line per driver, ready to print
    pub fn menu() -> String {
        let mut menu = String::from("Select the graphics driver.\n");
        for driver in Self::iter() {
            menu.push_str(&format!("{} -> {}\n", driver.choice(), driver.label()));
        }
        menu
    }
}

/// A string that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}
