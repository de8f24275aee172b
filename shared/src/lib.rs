pub mod locations;
pub mod store;
pub mod ttp;

use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_VAR_PREFIX: &str = "SLOT_WATCHER_";
pub const SETTINGS_FILE: &str = "Settings.toml";
pub const STATE_FILE_NAME: &str = "notified_appointments.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Comma-separated `id:name:targetDate` triples.
    pub locations: String,
    pub state_file: PathBuf,
    pub availability: AvailabilityConfig,
    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations: String::new(),
            state_file: default_state_file(),
            availability: AvailabilityConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvailabilityConfig {
    pub base_url: String,
    pub booking_url: String,
    pub timeout_secs: u64,
    pub limit: u32,
    pub courtesy_delay_secs: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            base_url: ttp::DEFAULT_BASE_URL.to_string(),
            booking_url: ttp::BOOKING_URL.to_string(),
            timeout_secs: 10,
            limit: 5,
            courtesy_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise. Unset means "implicit TLS on port 465".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            secure: None,
            username: None,
            password: None,
            from: None,
            recipients: None,
        }
    }
}

impl SmtpConfig {
    pub fn use_implicit_tls(&self) -> bool {
        self.secure.unwrap_or(self.port == 465)
    }

    /// Configured recipients, falling back to the username when none are set.
    pub fn recipient_list(&self) -> Vec<String> {
        let listed = self
            .recipients
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();

        if listed.is_empty() {
            self.username.iter().cloned().collect()
        } else {
            listed
        }
    }
}

/// The state file lives next to the executable, or in the working directory if that
/// location cannot be resolved.
pub fn default_state_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(STATE_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE_NAME))
}

pub fn load_config() -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(SETTINGS_FILE))
        .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
        .extract::<Config>()?)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
    }

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum LocationParseError {
        #[error("location entry {entry:?} must have 3 colon-delimited fields, but found {found}")]
        FieldCount { entry: String, found: usize },
    }

    #[derive(Debug, Error)]
    pub enum FetchError {
        #[error(transparent)]
        Reqwest(#[from] reqwest::Error),
        #[error("invalid availability endpoint {url}: {reason}")]
        InvalidUrl { url: String, reason: String },
    }

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("state file I/O error: {0}")]
        Io(#[from] std::io::Error),
        #[error("state file JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }
}
