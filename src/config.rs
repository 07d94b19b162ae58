//! Configuration loader and validator for the check-in service.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub facility: Facility,
    pub checkin: Checkin,
    pub sms: Sms,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub bind_addr: String,
    pub data_dir: String,
}

/// Facility identity and local-time policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Facility {
    pub id: String,
    pub utc_offset_hours: i8,
    pub qr_issuance: QrIssuance,
}

/// How long a printed QR code stays valid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QrIssuance {
    Daily,
    Weekly,
}

/// Scan deduplication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkin {
    pub cooldown_seconds: u64,
    pub sweep_interval_seconds: u64,
}

/// SMS gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sms {
    pub enabled: bool,
    pub api_url: String,
    pub api_token: String,
    pub sender: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.bind_addr.trim().is_empty() {
        return Err(ConfigError::Invalid("app.bind_addr must be non-empty"));
    }
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.facility.id.trim().is_empty() {
        return Err(ConfigError::Invalid("facility.id must be non-empty"));
    }
    if !(-12..=14).contains(&cfg.facility.utc_offset_hours) {
        return Err(ConfigError::Invalid(
            "facility.utc_offset_hours must be between -12 and 14",
        ));
    }

    if cfg.checkin.cooldown_seconds == 0 {
        return Err(ConfigError::Invalid("checkin.cooldown_seconds must be > 0"));
    }
    if cfg.checkin.sweep_interval_seconds == 0 {
        return Err(ConfigError::Invalid(
            "checkin.sweep_interval_seconds must be > 0",
        ));
    }

    if cfg.sms.enabled {
        if cfg.sms.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("sms.api_url must be non-empty"));
        }
        if cfg.sms.api_token.trim().is_empty() {
            return Err(ConfigError::Invalid("sms.api_token must be non-empty"));
        }
        if cfg.sms.sender.trim().is_empty() {
            return Err(ConfigError::Invalid("sms.sender must be non-empty"));
        }
    }

    Ok(())
}

/// Example YAML configuration, also used as the unit-test fixture.
pub fn example() -> &'static str {
    r#"app:
  bind_addr: "127.0.0.1:3001"
  data_dir: "./data"

facility:
  id: "sunrise-kindergarten"
  utc_offset_hours: 3
  qr_issuance: daily

checkin:
  cooldown_seconds: 300
  sweep_interval_seconds: 60

sms:
  enabled: true
  api_url: "https://sms.example.com/v1/messages"
  api_token: "YOUR_SMS_API_TOKEN"
  sender: "+15550100"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.facility.qr_issuance, QrIssuance::Daily);
    }

    #[test]
    fn invalid_facility_id() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.facility.id = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("facility.id")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_offset() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.facility.utc_offset_hours = 15;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.facility.utc_offset_hours = -13;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_cooldown() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.checkin.cooldown_seconds = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("cooldown_seconds")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn sms_fields_checked_only_when_enabled() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sms.api_token = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sms.enabled = false;
        cfg.sms.api_token = "".into();
        validate(&cfg).unwrap();
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.facility.id, "sunrise-kindergarten");
        assert_eq!(cfg.checkin.cooldown_seconds, 300);
    }
}
