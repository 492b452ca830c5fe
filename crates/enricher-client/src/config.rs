//! Scoring service connection settings.

use crate::error::ConfigError;
use reqwest::Url;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the service base URL.
pub const ENDPOINT_ENV: &str = "ANOMALYENDPOINT";

/// Environment variable holding the subscription key.
pub const API_KEY_ENV: &str = "OCP_APIM_SUB";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the scoring service. Built once at startup.
#[derive(Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub api_key: String,
    /// Upper bound for one whole detect call, connect to last byte.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Missing(ENDPOINT_ENV));
        }
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                value: endpoint.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing(API_KEY_ENV));
        }

        Ok(Self {
            endpoint,
            api_key,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read [`ENDPOINT_ENV`] and [`API_KEY_ENV`] through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_ENV).ok_or(ConfigError::Missing(ENDPOINT_ENV))?;
        let api_key = lookup(API_KEY_ENV).ok_or(ConfigError::Missing(API_KEY_ENV))?;
        Self::new(&endpoint, api_key)
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
