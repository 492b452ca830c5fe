//! HTTP client for the Anomaly Detector entire-series API.

use crate::config::ClientConfig;
use crate::error::ConfigError;
use async_trait::async_trait;
use enricher_core::{ClientError, DetectionRequest, DetectionResult, ScoringBackend};
use reqwest::{Client, Url};
use tracing::{debug, warn};

/// Path appended to the configured endpoint.
pub const DETECT_PATH: &str = "anomalydetector/v1.0/timeseries/entire/detect";

pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Scores a whole series in one `POST`. No retries.
pub struct AnomalyDetectorClient {
    client: Client,
    detect_url: Url,
    api_key: String,
}

impl AnomalyDetectorClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let detect_url = detect_url(&config.endpoint)?;

        Ok(Self {
            client,
            detect_url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn detect_url(&self) -> &Url {
        &self.detect_url
    }
}

/// `{endpoint}/anomalydetector/...`, tolerating a trailing slash on the endpoint.
fn detect_url(endpoint: &Url) -> Result<Url, ConfigError> {
    let joined = format!("{}/{}", endpoint.as_str().trim_end_matches('/'), DETECT_PATH);
    Url::parse(&joined).map_err(|e| ConfigError::InvalidEndpoint {
        value: joined,
        reason: e.to_string(),
    })
}

#[async_trait]
impl ScoringBackend for AnomalyDetectorClient {
    fn name(&self) -> &'static str {
        "anomaly-detector"
    }

    async fn detect(&self, request: &DetectionRequest) -> Result<DetectionResult, ClientError> {
        debug!(url = %self.detect_url, points = request.len(), "calling scoring service");

        let response = self
            .client
            .post(self.detect_url.clone())
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                debug!(error = %e, "failed to read error body");
                format!("<unreadable body: {}>", e)
            });
            warn!(status = status.as_u16(), "scoring service rejected request");
            return Err(ClientError::Service {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let result: DetectionResult = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
        result
            .check_len(request.len())
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

        debug!(period = result.period, "scoring service answered");
        Ok(result)
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::Transport {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
