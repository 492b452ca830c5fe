//! Configuration for enricherd

use crate::error::ServiceError;
use enricher_client::ClientConfig;
use enricher_core::{
    DetectionParameters, InputFormat, OutputFormat, PipelineSettings, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Prefix of environment variables that override file settings,
/// e.g. `ENRICHER_DETECTION__SENSITIVITY=80`.
pub const ENV_PREFIX: &str = "ENRICHER";

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Layout of incoming request bodies
    #[serde(default)]
    pub input: InputFormat,

    #[serde(default)]
    pub detection: DetectionConfig,

    /// Layout of responses
    #[serde(default)]
    pub output: OutputFormat,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Inbound request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Detection defaults applied to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_max_anomaly_ratio")]
    pub max_anomaly_ratio: f64,

    #[serde(default = "default_sensitivity")]
    pub sensitivity: i32,

    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Honour `maxAnomalyRatio`, `sensitivity` and `granularity` query parameters
    #[serde(default)]
    pub allow_overrides: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectionParameters::default();
        Self {
            max_anomaly_ratio: params.max_anomaly_ratio,
            sensitivity: params.sensitivity,
            granularity: params.granularity,
            allow_overrides: false,
        }
    }
}

impl DetectionConfig {
    pub fn parameters(&self) -> DetectionParameters {
        DetectionParameters {
            max_anomaly_ratio: self.max_anomaly_ratio,
            sensitivity: self.sensitivity,
            granularity: self.granularity.clone(),
        }
    }
}

/// Scoring service settings.
///
/// The endpoint and subscription key are never read from here; they come
/// from `ANOMALYENDPOINT` and `OCP_APIM_SUB`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Outbound call timeout in seconds
    #[serde(default = "default_scoring_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scoring_timeout(),
        }
    }
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Credentials from the process environment plus the configured timeout.
    pub fn client_config(&self) -> Result<ClientConfig, ServiceError> {
        self.client_config_from(|name| std::env::var(name).ok())
    }

    /// Same as [`client_config`](Self::client_config) with variables read
    /// through `lookup`.
    pub fn client_config_from<F>(&self, lookup: F) -> Result<ClientConfig, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(ClientConfig::from_lookup(lookup)?.with_timeout(self.timeout()))
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7071))
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_anomaly_ratio() -> f64 {
    DetectionParameters::default().max_anomaly_ratio
}

fn default_sensitivity() -> i32 {
    DetectionParameters::default().sensitivity
}

fn default_granularity() -> String {
    DetectionParameters::default().granularity
}

fn default_scoring_timeout() -> u64 {
    30
}

impl ServiceConfig {
    /// Load configuration: defaults, then the file at `path`, then
    /// `ENRICHER_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&ServiceConfig::default())?);

        // An explicitly named file has to exist
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            input: self.input.clone(),
            detection: self.detection.parameters(),
            output: self.output.clone(),
        }
    }

    /// Checks the settings the pipeline does not own.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.server.request_timeout_secs == 0 {
            return Err(ValidationError::parameter(
                "server.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.max_body_size == 0 {
            return Err(ValidationError::parameter(
                "server.max_body_size",
                "must be greater than zero",
            ));
        }
        if self.scoring.timeout_secs == 0 {
            return Err(ValidationError::parameter(
                "scoring.timeout_secs",
                "must be greater than zero",
            ));
        }
        // A slow scoring call has to surface as 504 before the inbound 408 fires
        if self.scoring.timeout_secs >= self.server.request_timeout_secs {
            return Err(ValidationError::parameter(
                "scoring.timeout_secs",
                format!(
                    "{}s must be shorter than server.request_timeout_secs ({}s)",
                    self.scoring.timeout_secs, self.server.request_timeout_secs
                ),
            ));
        }
        self.pipeline_settings().validate()
    }
}
