//! Resume from hibernation on the swap partition.
//!
//! The swap UUID is read with `blkid` on the live system, the two config
//! files are edited in Rust through [`TargetRoot`], and only the rebuild
//! steps run inside the chroot.

use crate::commands::chroot::ArchChroot;
use crate::commands::disk::BlkidUuid;
use crate::runner::{self, CommandRunner, OutputMode};
use crate::target::TargetRoot;
use anyhow::{Context, Result};
use tracing::{info, warn};

pub const GRUB_DEFAULTS_PATH: &str = "etc/default/grub";
pub const MKINITCPIO_CONF_PATH: &str = "etc/mkinitcpio.conf";

const CMDLINE_KEY: &str = "GRUB_CMDLINE_LINUX=";
const HOOKS_KEY: &str = "HOOKS=";

/// Result of [`configure_resume`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Configured { uuid: String },
    /// No swap UUID could be read
    Skipped,
}

fn join_lines(lines: Vec<String>, trailing_newline: bool) -> String {
    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

/// Kernel parameters of a `GRUB_CMDLINE_LINUX` value as the shell sees it.
///
/// Falls back to plain whitespace splitting when the quoting is unbalanced.
fn cmdline_params(value: &str) -> Vec<String> {
    let cmdline = match shlex::split(value) {
        Some(words) => words.join(" "),
        None => value.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
    };

    // Double quotes group spaces inside one kernel parameter
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in cmdline.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    params.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        params.push(current);
    }
    params
}

/// `GRUB_CMDLINE_LINUX="..."` with the characters special inside double
/// quotes escaped.
fn render_cmdline(params: &[String]) -> String {
    let mut value = String::new();
    for c in params.join(" ").chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            value.push('\\');
        }
        value.push(c);
    }
    format!("{}\"{}\"", CMDLINE_KEY, value)
}

/// Add or replace `resume=UUID=<uuid>` in `GRUB_CMDLINE_LINUX`.
///
/// When the file has no such line, one is appended.
pub fn update_grub_cmdline(content: &str, uuid: &str) -> String {
    let param = format!("resume=UUID={}", uuid);
    let mut found = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let Some(value) = line.strip_prefix(CMDLINE_KEY) else {
                return line.to_string();
            };
            found = true;
            let mut params: Vec<String> = cmdline_params(value)
                .into_iter()
                .filter(|p| !p.starts_with("resume="))
                .collect();
            params.push(param.clone());
            render_cmdline(&params)
        })
        .collect();

    if !found {
        lines.push(render_cmdline(&[param]));
    }
    join_lines(lines, true)
}

/// Ensure `btrfs` and `resume` appear in the mkinitcpio `HOOKS` array,
/// ahead of `filesystems`.
///
/// Returns `None` when there is no `HOOKS=(...)` line to edit.
pub fn ensure_resume_hooks(content: &str) -> Option<String> {
    let mut found = false;

    let lines: Vec<String> = content
        .lines()
        .map(|line| {
            let Some(rest) = line.strip_prefix(HOOKS_KEY) else {
                return line.to_string();
            };
            let Some(body) = rest.strip_prefix('(') else {
                return line.to_string();
            };
            let Some(close) = body.find(')') else {
                return line.to_string();
            };
            found = true;

            let (inner, tail) = body.split_at(close);
            let mut hooks: Vec<&str> = inner.split_whitespace().collect();
            for hook in ["btrfs", "resume"] {
                if hooks.contains(&hook) {
                    continue;
                }
                match hooks.iter().position(|h| *h == "filesystems") {
                    Some(pos) => hooks.insert(pos, hook),
                    None => hooks.push(hook),
                }
            }
            // tail starts with ')'
            format!("{}({}{}", HOOKS_KEY, hooks.join(" "), tail)
        })
        .collect();

    found.then(|| join_lines(lines, content.ends_with('\n')))
}

/// Read the UUID of `swap_device`, or `None` if blkid has nothing.
fn swap_uuid(runner: &mut dyn CommandRunner, swap_device: &str) -> Result<Option<String>> {
    let command = BlkidUuid {
        device: swap_device.to_string(),
    };
    let output = runner.run(&command, OutputMode::Capture)?;
    if !output.success {
        warn!("blkid could not read {} (exit {:?})", swap_device, output.exit_code);
        return Ok(None);
    }
    let uuid = output.stdout.lines().next().unwrap_or_default().trim();
    Ok((!uuid.is_empty()).then(|| uuid.to_string()))
}

/// Configure kernel resume from `swap_device` in the mounted target.
pub fn configure_resume(
    runner: &mut dyn CommandRunner,
    target: &TargetRoot,
    swap_device: &str,
) -> Result<ResumeOutcome> {
    let Some(uuid) = swap_uuid(runner, swap_device)? else {
        println!("No swap UUID detected; skipping resume configuration.");
        return Ok(ResumeOutcome::Skipped);
    };
    println!("Detected swap UUID: {}", uuid);

    let grub = target.read_to_string(GRUB_DEFAULTS_PATH)?.unwrap_or_default();
    target
        .write_file(GRUB_DEFAULTS_PATH, &update_grub_cmdline(&grub, &uuid), 0o644)
        .context("Failed to update GRUB kernel command line")?;

    match target.read_to_string(MKINITCPIO_CONF_PATH)? {
        Some(conf) => match ensure_resume_hooks(&conf) {
            Some(updated) => target
                .write_file(MKINITCPIO_CONF_PATH, &updated, 0o644)
                .context("Failed to update mkinitcpio hooks")?,
            None => warn!("No HOOKS line in {}; leaving it unchanged", MKINITCPIO_CONF_PATH),
        },
        None => warn!("{} not found; leaving hooks unchanged", MKINITCPIO_CONF_PATH),
    }

    let root = target.root_arg();
    runner::run_checked(runner, &ArchChroot::new(&root, &["mkinitcpio", "-P"]))?;
    runner::run_checked(
        runner,
        &ArchChroot::new(&root, &["grub-mkconfig", "-o", "/boot/grub/grub.cfg"]),
    )?;

    info!("Resume configured for swap UUID {}", uuid);
    Ok(ResumeOutcome::Configured { uuid })
}
