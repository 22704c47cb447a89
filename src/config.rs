//! Configuration for the Vigil monitoring agent.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the policy file driving feature reconciliation
    pub policy_path: PathBuf,

    /// Root directory for day-keyed report artifacts
    pub report_root: PathBuf,

    /// Path for agent state (device identity, logs)
    pub data_path: PathBuf,

    /// Debounce window for policy file change notifications, in milliseconds
    pub debounce_ms: u64,

    /// Local time of the end-of-day run, as "HH:MM"
    pub end_of_day: String,

    /// Weekday on which the end-of-day run is skipped
    #[serde(with = "weekday_serde")]
    pub rest_day: Weekday,

    /// Upper bound for the shutdown-triggered pipeline, in seconds
    pub shutdown_timeout_secs: u64,

    /// Cloud upload sink (disabled when absent)
    pub upload: Option<UploadConfig>,

    /// Email sink (disabled when absent)
    pub email: Option<EmailConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigil-agent");

        Self {
            policy_path: data_dir.join("policy.json"),
            report_root: data_dir.join("reports"),
            data_path: data_dir,
            debounce_ms: 500,
            end_of_day: "23:59".to_string(),
            rest_day: Weekday::Sun,
            shutdown_timeout_secs: 30,
            upload: None,
            email: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigil-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.report_root).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        if let Some(parent) = self.policy_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Parse the configured end-of-day time into (hour, minute).
    ///
    /// Falls back to 23:59 if the configured string is malformed.
    pub fn end_of_day_hm(&self) -> (u32, u32) {
        let mut parts = self.end_of_day.splitn(2, ':');
        let hour = parts.next().and_then(|s| s.parse().ok());
        let minute = parts.next().and_then(|s| s.parse().ok());
        match (hour, minute) {
            (Some(h), Some(m)) if h < 24 && m < 60 => (h, m),
            _ => (23, 59),
        }
    }
}

/// Cloud upload sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Endpoint receiving the multipart report upload
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_upload_timeout() -> u64 {
    120
}

/// Email sink configuration.
///
/// Credentials are stored by an external configuration surface; this agent
/// only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub from_addr: String,
    pub password: String,
    pub to_addr: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    "Daily Report From Vigil".to_string()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Weekday as a lowercase string.
mod weekday_serde {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&day.to_string().to_lowercase())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Weekday, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid weekday: {s}")))
    }
}
