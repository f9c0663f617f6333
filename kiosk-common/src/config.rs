//! Configuration loading and config file resolution
//!
//! Kiosk settings come from a TOML file. The file location follows the
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/kiosk/config.toml`, `/etc/kiosk/config.toml`)
//!
//! A missing config file is not an error: the kiosk logs a warning and starts
//! with compiled defaults. Individual values may be overridden afterwards by
//! the binary's CLI/environment arguments.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default remote check-in service base URL
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:3000";
/// Default inactivity window before the timeout prompt (ms)
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Default delay before the finish page resets the session (ms)
pub const DEFAULT_FINISH_TIMEOUT_MS: u64 = 30_000;
/// Default length of the timeout countdown (seconds)
pub const DEFAULT_COUNTDOWN_SECS: u64 = 30;

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter level when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Kiosk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Base URL of the remote check-in service
    pub service_url: String,
    /// Inactivity window before the session is considered idle (ms)
    pub timeout_ms: u64,
    /// Delay before a completed session resets itself (ms)
    pub finish_timeout_ms: u64,
    /// Countdown shown once the session has timed out (seconds)
    pub countdown_secs: u64,
    /// Election window start (RFC 3339); unset means open
    pub election_start: Option<DateTime<Utc>>,
    /// Election window end (RFC 3339); unset means open
    pub election_end: Option<DateTime<Utc>>,
    /// Settings database path; platform default when unset
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            finish_timeout_ms: DEFAULT_FINISH_TIMEOUT_MS,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            election_start: None,
            election_end: None,
            database_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl KioskConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KioskConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the resolution priority order
    ///
    /// An explicitly requested file (CLI or env) must exist and parse.
    /// When no file was requested and none is found, defaults are used.
    pub fn load(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Self> {
        if let Some(path) = cli_arg {
            info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(env_var_name) {
            info!("Loading config from {} ({})", path, env_var_name);
            return Self::from_file(Path::new(&path));
        }

        match default_config_file() {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges and the election window ordering
    pub fn validate(&self) -> Result<()> {
        if self.service_url.trim().is_empty() {
            return Err(Error::Config("service_url must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".to_string()));
        }
        if self.countdown_secs == 0 {
            return Err(Error::Config("countdown_secs must be positive".to_string()));
        }
        if let (Some(start), Some(end)) = (self.election_start, self.election_end) {
            if start >= end {
                return Err(Error::Config(format!(
                    "election_start ({}) must be before election_end ({})",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// Whether `now` is past the election start (open when unset)
    pub fn is_after_start(&self, now: DateTime<Utc>) -> bool {
        self.election_start.map_or(true, |start| now > start)
    }

    /// Whether `now` is before the election end (open when unset)
    pub fn is_before_end(&self, now: DateTime<Utc>) -> bool {
        self.election_end.map_or(true, |end| now < end)
    }

    /// Sessions are only accepted inside the election window
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_after_start(now) && self.is_before_end(now)
    }

    /// Settings database path, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Locate the platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("kiosk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/kiosk/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default settings database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("kiosk").join("kiosk.db"))
        .unwrap_or_else(|| PathBuf::from("./kiosk_data/kiosk.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = KioskConfig::default();
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.finish_timeout_ms, 30_000);
        assert_eq!(config.countdown_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KioskConfig::from_toml_str(
            r#"
            service_url = "http://checkin.local:8080"
            timeout_ms = 45000
            "#,
        )
        .unwrap();
        assert_eq!(config.service_url, "http://checkin.local:8080");
        assert_eq!(config.timeout_ms, 45_000);
        assert_eq!(config.finish_timeout_ms, DEFAULT_FINISH_TIMEOUT_MS);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_inverted_election_window_rejected() {
        let result = KioskConfig::from_toml_str(
            r#"
            election_start = "2024-11-05T18:00:00Z"
            election_end = "2024-11-05T08:00:00Z"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_election_window() {
        let config = KioskConfig {
            election_start: Some(Utc.with_ymd_and_hms(2024, 11, 5, 8, 0, 0).unwrap()),
            election_end: Some(Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 0).unwrap()),
            ..KioskConfig::default()
        };

        let before = Utc.with_ymd_and_hms(2024, 11, 5, 7, 59, 0).unwrap();
        let during = Utc.with_ymd_and_hms(2024, 11, 5, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 1).unwrap();

        assert!(!config.is_active(before));
        assert!(config.is_active(during));
        assert!(!config.is_active(after));
        assert!(config.is_after_start(after));
        assert!(!config.is_before_end(after));
    }

    #[test]
    fn test_open_window_is_always_active() {
        let config = KioskConfig::default();
        assert!(config.is_active(Utc::now()));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = KioskConfig {
            timeout_ms: 0,
            ..KioskConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
