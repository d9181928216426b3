//! Mirrors, keyring and package installation.

use super::SystemCommand;

pub const MIRRORLIST_PATH: &str = "/etc/pacman.d/mirrorlist";

/// `reflector -c <country> --sort rate --save /etc/pacman.d/mirrorlist`
#[derive(Debug, Clone)]
pub struct Reflector {
    pub country: String,
}

impl SystemCommand for Reflector {
    fn program(&self) -> &'static str {
        "reflector"
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.country.clone(),
            "--sort".to_string(),
            "rate".to_string(),
            "--save".to_string(),
            MIRRORLIST_PATH.to_string(),
        ]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `pacman -Syy`
#[derive(Debug, Clone, Default)]
pub struct PacmanRefresh;

impl SystemCommand for PacmanRefresh {
    fn program(&self) -> &'static str {
        "pacman"
    }

    fn args(&self) -> Vec<String> {
        vec!["-Syy".to_string()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `pacman-key --init` or `pacman-key --populate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacmanKey {
    Init,
    Populate,
}

impl SystemCommand for PacmanKey {
    fn program(&self) -> &'static str {
        "pacman-key"
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::Init => vec!["--init".to_string()],
            Self::Populate => vec!["--populate".to_string()],
        }
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `pacstrap <root> <packages...>`
#[derive(Debug, Clone)]
pub struct Pacstrap {
    pub root: String,
    pub packages: Vec<String>,
}

impl SystemCommand for Pacstrap {
    fn program(&self) -> &'static str {
        "pacstrap"
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.packages.len() + 1);
        args.push(self.root.clone());
        args.extend(self.packages.iter().cloned());
        args
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `genfstab -U <root>`
///
/// Only meaningful once the target is mounted, so dry runs skip it.
#[derive(Debug, Clone)]
pub struct Genfstab {
    pub root: String,
}

impl SystemCommand for Genfstab {
    fn program(&self) -> &'static str {
        "genfstab"
    }

    fn args(&self) -> Vec<String> {
        vec!["-U".to_string(), self.root.clone()]
    }

    fn runs_in_dry_run(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflector_keeps_country_as_one_argument() {
        let cmd = Reflector {
            country: "United States".into(),
        };
        assert_eq!(
            cmd.args(),
            vec!["-c", "United States", "--sort", "rate", "--save", MIRRORLIST_PATH]
        );
        assert!(cmd.is_destructive());
    }

    #[test]
    fn test_keyring_commands() {
        assert_eq!(PacmanRefresh.describe(), "pacman -Syy");
        assert_eq!(PacmanKey::Init.describe(), "pacman-key --init");
        assert_eq!(PacmanKey::Populate.describe(), "pacman-key --populate");
    }

    #[test]
    fn test_pacstrap_root_first() {
        let cmd = Pacstrap {
            root: "/mnt".into(),
            packages: vec!["base".into(), "linux".into()],
        };
        assert_eq!(cmd.args(), vec!["/mnt", "base", "linux"]);
    }

    #[test]
    fn test_genfstab() {
        let cmd = Genfstab { root: "/mnt".into() };
        assert_eq!(cmd.describe(), "genfstab -U /mnt");
        assert!(!cmd.is_destructive());
        assert!(!cmd.runs_in_dry_run());
    }
}
