//! Resolved installation inputs
//!
//! [`resolve`] merges the optional file values with interactive answers.
//! Each value comes from the file when it is present and valid; otherwise the
//! user is asked until they give a valid answer.

use std::path::Path;
use tracing::{debug, warn};

use crate::config_file::{self, InstallationConfig};
use crate::error::Result;
use crate::prompt::{self, Prompter};
use crate::types::{GpuDriver, Secret};
use crate::validation;

/// Swap partition size when none is configured
pub const DEFAULT_SWAP_SIZE: &str = "4G";

/// Everything the pipeline needs to know about the new system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    pub country: String,
    pub username: String,
    pub hostname: String,
    pub user_password: Secret,
    pub root_password: Secret,
    pub timezone: String,
    pub gpu: GpuDriver,
    pub swap_size: String,
}

impl InstallConfig {
    /// Convert a fully valid file config without prompting.
    ///
    /// Callers run [`InstallationConfig::validate`] first; any value that
    /// still fails here is reported as an error.
    pub fn from_validated(raw: &InstallationConfig, zoneinfo_root: &Path) -> anyhow::Result<Self> {
        raw.validate(zoneinfo_root)?;
        let text = |value: &Option<String>| config_file::trimmed(value).unwrap_or_default().to_string();
        let password = |value: &Option<String>| {
            Secret::new(config_file::password_value(value).unwrap_or_default())
        };
        Ok(Self {
            country: text(&raw.country),
            username: text(&raw.username),
            hostname: text(&raw.host_name),
            user_password: password(&raw.user_pass),
            root_password: password(&raw.root_pass),
            timezone: text(&raw.timezone),
            gpu: validation::check_gpu_choice(&text(&raw.gpu))?,
            swap_size: config_file::trimmed(&raw.swap_size)
                .unwrap_or(DEFAULT_SWAP_SIZE)
                .to_string(),
        })
    }
}

/// Use the file value if it passes `accept`, else prompt until valid.
fn from_file_or_prompt(
    prompter: &mut dyn Prompter,
    key: &str,
    value: &Option<String>,
    accept: impl Fn(&str) -> bool,
    prompt_text: &str,
    hint: &str,
) -> Result<String> {
    if let Some(value) = config_file::trimmed(value) {
        if accept(value) {
            debug!("Using {} from config file", key);
            return Ok(value.to_string());
        }
        warn!("Invalid {} in config file: {}", key, hint);
    }
    prompt::prompt_until(prompter, prompt_text, hint, accept)
}

/// Resolve every input, prompting for whatever the file does not supply.
pub fn resolve(
    raw: &InstallationConfig,
    prompter: &mut dyn Prompter,
    zoneinfo_root: &Path,
) -> Result<InstallConfig> {
    let country = from_file_or_prompt(
        prompter,
        "country",
        &raw.country,
        validation::is_valid_country,
        "Enter your country (example->Iran): ",
        validation::COUNTRY_HINT,
    )?;

    let username = from_file_or_prompt(
        prompter,
        "username",
        &raw.username,
        validation::is_valid_username,
        "Enter your username: ",
        validation::USERNAME_HINT,
    )?;

    let hostname = from_file_or_prompt(
        prompter,
        "host_name",
        &raw.host_name,
        validation::is_valid_hostname,
        "Enter your hostname: ",
        validation::HOSTNAME_HINT,
    )?;

    let user_password = match config_file::password_value(&raw.user_pass) {
        Some(password) => Secret::new(password),
        None => prompt::prompt_password(prompter, "user")?,
    };

    let root_password = match config_file::password_value(&raw.root_pass) {
        Some(password) => Secret::new(password),
        None => prompt::prompt_password(prompter, "root")?,
    };

    let timezone = from_file_or_prompt(
        prompter,
        "timezone",
        &raw.timezone,
        |tz| validation::timezone_exists(zoneinfo_root, tz),
        "Enter your timezone (e.g., Asia/Tehran): ",
        validation::TIMEZONE_HINT,
    )?;

    let gpu = match config_file::trimmed(&raw.gpu).map(GpuDriver::from_choice) {
        Some(Some(driver)) => driver,
        Some(None) => {
            warn!("Invalid gpu in config file: {}", validation::GPU_HINT);
            prompt::prompt_gpu(prompter)?
        }
        None => prompt::prompt_gpu(prompter)?,
    };

    let swap_size = match config_file::trimmed(&raw.swap_size) {
        Some(size) if validation::is_valid_swap_size(size) => size.to_string(),
        Some(size) => {
            warn!(
                "Invalid swap_size {:?} in config file, using {}",
                size, DEFAULT_SWAP_SIZE
            );
            DEFAULT_SWAP_SIZE.to_string()
        }
        None => DEFAULT_SWAP_SIZE.to_string(),
    };

    Ok(InstallConfig {
        country,
        username,
        hostname,
        user_password,
        root_password,
        timezone,
        gpu,
        swap_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::prompt::ScriptedPrompter;
    use std::fs;

    fn zoneinfo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Europe")).unwrap();
        fs::write(dir.path().join("Europe/Berlin"), b"TZif").unwrap();
        dir
    }

    fn full_file() -> InstallationConfig {
        InstallationConfig {
            country: Some("Germany".to_string()),
            username: Some("alice".to_string()),
            host_name: Some("archbox".to_string()),
            user_pass: Some("userpw".to_string()),
            root_pass: Some("rootpw".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            gpu: Some("1".to_string()),
            disk: None,
            swap_size: Some("8G".to_string()),
        }
    }

    #[test]
    fn test_complete_file_needs_no_prompts() {
        let tz = zoneinfo();
        let mut p = ScriptedPrompter::default();
        let config = resolve(&full_file(), &mut p, tz.path()).unwrap();

        assert_eq!(config.country, "Germany");
        assert_eq!(config.username, "alice");
        assert_eq!(config.hostname, "archbox");
        assert_eq!(config.user_password.expose(), "userpw");
        assert_eq!(config.root_password.expose(), "rootpw");
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.gpu, GpuDriver::NvidiaOpen);
        assert_eq!(config.swap_size, "8G");
        assert!(p.transcript.is_empty());
    }

    #[test]
    fn test_empty_file_prompts_for_everything() {
        let tz = zoneinfo();
        let mut p = ScriptedPrompter::new([
            "Iran",
            "bob",
            "host1",
            "upw",
            "upw",
            "rpw",
            "rpw",
            "Europe/Berlin",
            "4",
        ]);
        let config = resolve(&InstallationConfig::default(), &mut p, tz.path()).unwrap();

        assert_eq!(config.country, "Iran");
        assert_eq!(config.username, "bob");
        assert_eq!(config.hostname, "host1");
        assert_eq!(config.user_password.expose(), "upw");
        assert_eq!(config.root_password.expose(), "rpw");
        assert_eq!(config.gpu, GpuDriver::VirtualBox);
        assert_eq!(config.swap_size, DEFAULT_SWAP_SIZE);
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn test_invalid_file_values_are_reprompted() {
        let tz = zoneinfo();
        let raw = InstallationConfig {
            username: Some("Bad User".to_string()),
            timezone: Some("Nowhere/City".to_string()),
            gpu: Some("7".to_string()),
            ..full_file()
        };
        let mut p = ScriptedPrompter::new(["1bad", "carol", "Europe/Berlin", "2"]);
        let config = resolve(&raw, &mut p, tz.path()).unwrap();

        assert_eq!(config.username, "carol");
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.gpu, GpuDriver::NvidiaProprietary);
        assert!(p.saw(validation::USERNAME_HINT));
    }

    #[test]
    fn test_placeholder_passwords_are_prompted() {
        let tz = zoneinfo();
        let raw = InstallationConfig {
            user_pass: Some("CHANGE_ME".to_string()),
            root_pass: Some("  ".to_string()),
            ..full_file()
        };
        let mut p = ScriptedPrompter::new(["u", "u", "r", "r"]);
        let config = resolve(&raw, &mut p, tz.path()).unwrap();
        assert_eq!(config.user_password.expose(), "u");
        assert_eq!(config.root_password.expose(), "r");
        assert!(p.saw("Enter user password: "));
        assert!(p.saw("Enter root password: "));
    }

    #[test]
    fn test_invalid_swap_size_falls_back_to_default() {
        let tz = zoneinfo();
        let raw = InstallationConfig {
            swap_size: Some("huge".to_string()),
            ..full_file()
        };
        let mut p = ScriptedPrompter::default();
        assert_eq!(resolve(&raw, &mut p, tz.path()).unwrap().swap_size, "4G");
    }

    #[test]
    fn test_eof_during_prompt_is_reported() {
        let tz = zoneinfo();
        let mut p = ScriptedPrompter::new(["Iran"]);
        let err = resolve(&InstallationConfig::default(), &mut p, tz.path()).unwrap_err();
        assert!(matches!(err, InstallError::InputClosed));
    }

    #[test]
    fn test_from_validated() {
        let tz = zoneinfo();
        let config = InstallConfig::from_validated(&full_file(), tz.path()).unwrap();
        assert_eq!(config.gpu, GpuDriver::NvidiaOpen);

        let incomplete = InstallationConfig {
            username: None,
            ..full_file()
        };
        assert!(InstallConfig::from_validated(&incomplete, tz.path()).is_err());
    }
}
