//! Typed external commands.
//!
//! Every program the installer runs is described by a struct implementing
//! [`SystemCommand`]. The struct is the single source of truth for the
//! argument vector, so a flag typo is a compile error rather than a failed
//! install, and nothing is ever passed through a shell.
//!
//! Commands are executed by a [`crate::runner::CommandRunner`].

pub mod chroot;
pub mod disk;
pub mod encryption;
pub mod pacman;

use crate::shell::display_command;

/// Contract between a typed command and the runner.
///
/// # Contract
///
/// - `program()` is looked up on PATH; it is never a shell snippet.
/// - `args()` is passed verbatim as argv.
/// - `stdin()` is written to the child's standard input and never logged.
pub trait SystemCommand {
    fn program(&self) -> &'static str;

    fn args(&self) -> Vec<String>;

    /// Text fed to standard input
    fn stdin(&self) -> Option<String> {
        None
    }

    /// Changes disks, mounts or system configuration
    fn is_destructive(&self) -> bool {
        false
    }

    /// Needs the terminal (passphrase prompts)
    fn is_interactive(&self) -> bool {
        false
    }

    /// Whether a dry run still executes this command.
    ///
    /// Read-only commands run; anything destructive is only logged.
    fn runs_in_dry_run(&self) -> bool {
        !self.is_destructive()
    }

    /// Shell-quoted command line for logs
    fn describe(&self) -> String {
        display_command(self.program(), &self.args())
    }
}

/// Absolute device path for a kernel block device name.
pub fn dev_path(name: &str) -> String {
    if name.starts_with("/dev/") {
        name.to_string()
    } else {
        format!("/dev/{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl SystemCommand for Probe {
        fn program(&self) -> &'static str {
            "echo"
        }

        fn args(&self) -> Vec<String> {
            vec!["two words".to_string()]
        }
    }

    #[test]
    fn test_defaults() {
        assert!(!Probe.is_destructive());
        assert!(!Probe.is_interactive());
        assert!(Probe.runs_in_dry_run());
        assert_eq!(Probe.stdin(), None);
        assert_eq!(
            shlex::split(&Probe.describe()).unwrap(),
            vec!["echo", "two words"]
        );
    }

    #[test]
    fn test_dev_path() {
        assert_eq!(dev_path("sda"), "/dev/sda");
        assert_eq!(dev_path("/dev/nvme0n1"), "/dev/nvme0n1");
        assert_eq!(dev_path("mapper/cryptlvm"), "/dev/mapper/cryptlvm");
    }
}
