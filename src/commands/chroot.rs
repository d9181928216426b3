//! Commands run inside the installed system, plus the final reboot.

use super::SystemCommand;

/// `arch-chroot <root> <command...>`
#[derive(Debug, Clone)]
pub struct ArchChroot {
    pub root: String,
    pub command: Vec<String>,
}

impl ArchChroot {
    pub fn new(root: &str, command: &[&str]) -> Self {
        Self {
            root: root.to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SystemCommand for ArchChroot {
    fn program(&self) -> &'static str {
        "arch-chroot"
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.command.len() + 1);
        args.push(self.root.clone());
        args.extend(self.command.iter().cloned());
        args
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `arch-chroot <root> chpasswd -e` with `user:hash` lines on stdin.
///
/// Hashes travel through the pipe only; they never appear in argv or logs.
#[derive(Clone)]
pub struct ChrootChpasswd {
    pub root: String,
    /// `(account, crypt hash)` pairs
    pub entries: Vec<(String, String)>,
}

impl std::fmt::Debug for ChrootChpasswd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let accounts: Vec<&str> = self.entries.iter().map(|(user, _)| user.as_str()).collect();
        f.debug_struct("ChrootChpasswd")
            .field("root", &self.root)
            .field("accounts", &accounts)
            .finish()
    }
}

impl SystemCommand for ChrootChpasswd {
    fn program(&self) -> &'static str {
        "arch-chroot"
    }

    fn args(&self) -> Vec<String> {
        vec![self.root.clone(), "chpasswd".to_string(), "-e".to_string()]
    }

    fn stdin(&self) -> Option<String> {
        let mut input = String::new();
        for (user, hash) in &self.entries {
            input.push_str(user);
            input.push(':');
            input.push_str(hash);
            input.push('\n');
        }
        Some(input)
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `reboot`
#[derive(Debug, Clone, Default)]
pub struct Reboot;

impl SystemCommand for Reboot {
    fn program(&self) -> &'static str {
        "reboot"
    }

    fn args(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_destructive(&self) -> bool {
        true
    }
}
