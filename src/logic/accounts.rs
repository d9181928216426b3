//! Account passwords.
//!
//! Plaintext passwords are hashed in memory with SHA-512 crypt and only the
//! hash is handed to `chpasswd -e`, on its standard input.

use crate::commands::chroot::ChrootChpasswd;
use crate::config::InstallConfig;
use crate::error::{InstallError, Result};
use crate::runner::{self, CommandRunner};
use crate::types::Secret;
use tracing::info;

/// `$6$<salt>$<hash>` for a password.
pub fn hash_password(password: &Secret) -> Result<String> {
    if password.is_empty() {
        return Err(InstallError::password("Password cannot be empty"));
    }
    pwhash::sha512_crypt::hash(password.expose())
        .map_err(|e| InstallError::password(format!("Failed to hash password: {}", e)))
}

/// Set the root password, then the user's, inside the target.
pub fn set_passwords(runner: &mut dyn CommandRunner, root: &str, config: &InstallConfig) -> Result<()> {
    let accounts = [
        ("root", &config.root_password),
        (config.username.as_str(), &config.user_password),
    ];

    for (account, password) in accounts {
        let hash = hash_password(password)?;
        let command = ChrootChpasswd {
            root: root.to_string(),
            entries: vec![(account.to_string(), hash)],
        };
        runner::run_checked(runner, &command)?;
        info!("Password set for {}", account);
    }
    Ok(())
}
