//! Configuration file handling for saving and loading installation configs.
//!
//! Every key is optional: anything missing or invalid is asked for
//! interactively later (see [`crate::config::resolve`]). Values may be
//! written as JSON strings or numbers, so `"gpu": 2` and `"gpu": "2"` are
//! the same thing.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::validation;

/// Config looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "default_config.json";

/// Password value meaning "ask me"
pub const PASSWORD_PLACEHOLDER: &str = "CHANGE_ME";

/// Installation configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationConfig {
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub user_pass: Option<String>,
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub root_pass: Option<String>,
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Menu number `0`-`4` or driver name
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
    /// Target disk without `/dev/`, e.g. `sda` or `nvme0n1`
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    /// Swap partition size, e.g. `4G`
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub swap_size: Option<String>,
}

/// Accept a string, number or bool and keep its text form. `null` is absent.
fn stringish<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

impl InstallationConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json + "\n")
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Find and load the config to use for an install.
    ///
    /// An explicit path wins. Without one, `default_config.json` in `search_dir`
    /// is used if it exists. A file that cannot be read or parsed is reported
    /// and treated as empty, so every value gets prompted for instead.
    pub fn locate(explicit: Option<&Path>, search_dir: &Path) -> Self {
        let path: PathBuf = match explicit {
            Some(path) => {
                if !path.exists() {
                    warn!(
                        "--config path not found: {}. Falling back to interactive prompts.",
                        path.display()
                    );
                    return Self::default();
                }
                path.to_path_buf()
            }
            None => {
                let candidate = search_dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    return Self::default();
                }
                candidate
            }
        };

        match Self::load_from_file(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Failed to read JSON config {}: {:#}. Falling back to interactive prompts.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// A filled-in example with placeholder passwords
    pub fn template() -> Self {
        Self {
            country: Some("United States".to_string()),
            username: Some("archuser".to_string()),
            host_name: Some("archlinux".to_string()),
            user_pass: Some(PASSWORD_PLACEHOLDER.to_string()),
            root_pass: Some(PASSWORD_PLACEHOLDER.to_string()),
            timezone: Some("UTC".to_string()),
            gpu: Some("0".to_string()),
            disk: None,
            swap_size: Some("4G".to_string()),
        }
    }

    /// Check that every required value is present and valid.
    ///
    /// Unlike resolution, nothing is prompted for: the first problem is
    /// returned as an error. `disk` and `swap_size` are optional but must be
    /// valid when given.
    pub fn validate(&self, zoneinfo_root: &Path) -> Result<()> {
        let country = required(&self.country, "country")?;
        if !validation::is_valid_country(country) {
            anyhow::bail!("country: {}", validation::COUNTRY_HINT);
        }

        let username = required(&self.username, "username")?;
        if !validation::is_valid_username(username) {
            anyhow::bail!("username: {}", validation::USERNAME_HINT);
        }

        let hostname = required(&self.host_name, "host_name")?;
        if !validation::is_valid_hostname(hostname) {
            anyhow::bail!("host_name: {}", validation::HOSTNAME_HINT);
        }

        if password_value(&self.user_pass).is_none() {
            anyhow::bail!("user_pass must be set to a real password");
        }
        if password_value(&self.root_pass).is_none() {
            anyhow::bail!("root_pass must be set to a real password");
        }

        let timezone = required(&self.timezone, "timezone")?;
        if !validation::timezone_exists(zoneinfo_root, timezone) {
            anyhow::bail!("timezone: {}", validation::TIMEZONE_HINT);
        }

        let gpu = required(&self.gpu, "gpu")?;
        validation::check_gpu_choice(gpu).context("gpu")?;

        if let Some(disk) = trimmed(&self.disk) {
            validation::check_disk_name(validation::bare_disk_name(disk)).context("disk")?;
        }
        if let Some(size) = trimmed(&self.swap_size) {
            validation::check_swap_size(size).context("swap_size")?;
        }

        Ok(())
    }
}

/// Trimmed value, or `None` when absent or blank
pub fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Password as given, or `None` when absent, blank or the placeholder
pub fn password_value(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|s| !s.trim().is_empty() && s.trim() != PASSWORD_PLACEHOLDER)
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    trimmed(value).with_context(|| format!("{} must be specified", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn zoneinfo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Asia")).unwrap();
        fs::write(dir.path().join("Asia/Tehran"), b"TZif").unwrap();
        fs::write(dir.path().join("UTC"), b"TZif").unwrap();
        dir
    }

    fn create_test_config() -> InstallationConfig {
        InstallationConfig {
            country: Some("Iran".to_string()),
            username: Some("alice".to_string()),
            host_name: Some("archbox".to_string()),
            user_pass: Some("userpass".to_string()),
            root_pass: Some("rootpass".to_string()),
            timezone: Some("Asia/Tehran".to_string()),
            gpu: Some("3".to_string()),
            disk: Some("sda".to_string()),
            swap_size: None,
        }
    }

    fn write_json(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_load_accepts_numbers_and_missing_keys() {
        let file = write_json(r#"{"gpu": 2, "username": "bob", "timezone": null}"#);
        let config = InstallationConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.gpu.as_deref(), Some("2"));
        assert_eq!(config.username.as_deref(), Some("bob"));
        assert_eq!(config.timezone, None);
        assert_eq!(config.country, None);
    }

    #[test]
    fn test_load_ignores_unknown_keys() {
        let file = write_json(r#"{"country": "Iran", "theme": "dark"}"#);
        let config = InstallationConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.country.as_deref(), Some("Iran"));
    }

    #[test]
    fn test_load_rejects_nested_values() {
        let file = write_json(r#"{"username": ["a", "b"]}"#);
        assert!(InstallationConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let file = write_json("{ invalid json }");
        assert!(InstallationConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = InstallationConfig::load_from_file(Path::new("/nonexistent/path"));
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_save_load() {
        let original = create_test_config();
        let temp_file = NamedTempFile::new().unwrap();
        original.save_to_file(temp_file.path()).unwrap();

        let content = fs::read_to_string(temp_file.path()).unwrap();
        assert!(!content.contains("swap_size"), "absent keys are not written");

        let loaded = InstallationConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_locate_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), r#"{"username": "fromdefault"}"#).unwrap();
        let explicit = write_json(r#"{"username": "explicit"}"#);

        let config = InstallationConfig::locate(Some(explicit.path()), dir.path());
        assert_eq!(config.username.as_deref(), Some("explicit"));

        let config = InstallationConfig::locate(None, dir.path());
        assert_eq!(config.username.as_deref(), Some("fromdefault"));
    }

    #[test]
    fn test_locate_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(InstallationConfig::locate(None, dir.path()), InstallationConfig::default());

        let missing = dir.path().join("missing.json");
        assert_eq!(
            InstallationConfig::locate(Some(&missing), dir.path()),
            InstallationConfig::default()
        );

        let broken = write_json("not json");
        assert_eq!(
            InstallationConfig::locate(Some(broken.path()), dir.path()),
            InstallationConfig::default()
        );
    }

    #[test]
    fn test_validation_valid_config() {
        let tz = zoneinfo();
        assert!(create_test_config().validate(tz.path()).is_ok());
    }

    #[test]
    fn test_validation_reports_missing_field() {
        let tz = zoneinfo();
        let mut config = create_test_config();
        config.host_name = Some("   ".to_string());
        let err = config.validate(tz.path()).unwrap_err();
        assert!(err.to_string().contains("host_name must be specified"));
    }

    #[test]
    fn test_validation_rejects_placeholder_password() {
        let tz = zoneinfo();
        let mut config = create_test_config();
        config.root_pass = Some(PASSWORD_PLACEHOLDER.to_string());
        let err = config.validate(tz.path()).unwrap_err();
        assert!(err.to_string().contains("root_pass"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let tz = zoneinfo();

        let mut config = create_test_config();
        config.timezone = Some("Mars/Olympus".to_string());
        assert!(config.validate(tz.path()).is_err());

        let mut config = create_test_config();
        config.gpu = Some("9".to_string());
        assert!(config.validate(tz.path()).is_err());

        let mut config = create_test_config();
        config.disk = Some("sda1".to_string());
        assert!(config.validate(tz.path()).is_err());

        let mut config = create_test_config();
        config.swap_size = Some("lots".to_string());
        assert!(config.validate(tz.path()).is_err());
    }

    #[test]
    fn test_validation_accepts_dev_prefixed_disk() {
        let tz = zoneinfo();
        let mut config = create_test_config();
        config.disk = Some("/dev/sda".to_string());
        assert!(config.validate(tz.path()).is_ok());

        config.disk = Some("/dev/nvme0n1".to_string());
        assert!(config.validate(tz.path()).is_ok());

        config.disk = Some("/dev/sda1".to_string());
        assert!(config.validate(tz.path()).is_err());
    }

    #[test]
    fn test_template_needs_passwords() {
        let tz = zoneinfo();
        let template = InstallationConfig::template();
        assert_eq!(password_value(&template.user_pass), None);
        assert!(template.validate(tz.path()).is_err());

        let filled = InstallationConfig {
            user_pass: Some("a".to_string()),
            root_pass: Some("b".to_string()),
            ..template
        };
        assert!(filled.validate(tz.path()).is_ok());
    }

    #[test]
    fn test_password_value_keeps_inner_text() {
        assert_eq!(password_value(&Some(" pw ".to_string())), Some(" pw "));
        assert_eq!(password_value(&Some("".to_string())), None);
        assert_eq!(password_value(&None), None);
    }
}
