//! File access inside the mounted target system.
//!
//! Paths are given relative to the target root (`etc/fstab`, `chroot.sh`).
//! In a dry run writes and removals are logged and skipped, and reads of
//! files that do not exist yet return `None`.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TargetRoot {
    root: PathBuf,
    dry_run: bool,
}

impl TargetRoot {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            dry_run,
        }
    }

    /// Root as a string argument for `pacstrap`, `genfstab` and `arch-chroot`
    pub fn root_arg(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    /// Absolute path of `relative` inside the target
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// Create or replace a file with exactly `mode` permissions.
    pub fn write_file(&self, relative: &str, content: &str, mode: u32) -> Result<()> {
        let path = self.path(relative);
        if self.dry_run {
            info!(
                "[dry-run] would write {} ({} bytes, mode {:o})",
                path.display(),
                content.len(),
                mode
            );
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // An existing file keeps its old mode through open(); set it explicitly
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to chmod {}", path.display()))?;

        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// Read a file, or `None` if it does not exist.
    pub fn read_to_string(&self, relative: &str) -> Result<Option<String>> {
        let path = self.path(relative);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Delete a file. A file that is already gone is not an error.
    pub fn remove_file(&self, relative: &str) -> Result<()> {
        let path = self.path(relative);
        if self.dry_run {
            info!("[dry-run] would remove {}", path.display());
            return Ok(());
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
