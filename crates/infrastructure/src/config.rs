//! Client configuration.
//!
//! Values come from `CM_*` environment variables with defaults suitable for
//! a local development server.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1/";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment variable holding the API base URL.
pub const API_URL_VAR: &str = "CM_API_URL";

/// Environment variable holding the data directory.
pub const DATA_DIR_VAR: &str = "CM_DATA_DIR";

/// Environment variable holding the request timeout in milliseconds.
pub const TIMEOUT_MS_VAR: &str = "CM_TIMEOUT_MS";

const APP_DIR: &str = "construction-manager";
const STORAGE_FILE: &str = "storage.json";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The API URL could not be parsed.
    #[error("invalid API URL {value:?}: {message}")]
    InvalidUrl {
        /// Offending value
        value: String,
        /// Parser message
        message: String,
    },

    /// The timeout is not a positive number of milliseconds.
    #[error("invalid timeout {0:?}: expected milliseconds greater than zero")]
    InvalidTimeout(String),

    /// No data directory was given and the platform has none.
    #[error("no data directory available; set {DATA_DIR_VAR}")]
    NoDataDir,
}

/// Settings for talking to the API and storing session data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, always ending in `/`
    pub api_url: Url,
    /// Directory holding the durable storage file
    pub data_dir: PathBuf,
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl ClientConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid or no data directory can be
    /// determined.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(
            lookup(API_URL_VAR)
                .as_deref()
                .unwrap_or(DEFAULT_API_URL),
        )?;

        let data_dir = match lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let timeout = match lookup(TIMEOUT_MS_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => Duration::from_millis(DEFAULT_TIMEOUT_MS),
        };

        Ok(Self {
            api_url,
            data_dir,
            timeout,
            user_agent: format!("construction-manager/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Replaces the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn with_api_url(mut self, value: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_api_url(value)?;
        Ok(self)
    }

    /// Replaces the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Path of the durable storage file.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }
}

fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidUrl {
        value: value.to_string(),
        message,
    };

    let mut url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
