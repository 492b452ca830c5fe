//! HTTP routes

use crate::config::{ServerConfig, ServiceConfig};
use crate::error::{ApiError, ApiResult, ServiceError};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use enricher_client::AnomalyDetectorClient;
use enricher_core::{DetectionParameters, EnrichmentPipeline, ScoringBackend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span};
use uuid::Uuid;

pub const ENRICH_ROUTE: &str = "/api/anomalydetection";

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EnrichmentPipeline>,

    /// Whether query parameters may replace the configured detection parameters
    pub allow_overrides: bool,
}

impl AppState {
    pub fn new(pipeline: EnrichmentPipeline, allow_overrides: bool) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            allow_overrides,
        }
    }

    /// Build the pipeline around `backend`, validating every setting first.
    pub fn with_backend(
        config: &ServiceConfig,
        backend: Arc<dyn ScoringBackend>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let pipeline = EnrichmentPipeline::new(config.pipeline_settings(), backend)?;
        Ok(Self::new(pipeline, config.detection.allow_overrides))
    }

    /// Wire the real scoring client from the environment.
    pub fn bootstrap(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Self::bootstrap_with(config, |name| std::env::var(name).ok())
    }

    /// Wire the real scoring client with credentials read through `lookup`.
    pub fn bootstrap_with<F>(config: &ServiceConfig, lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_config = config.scoring.client_config_from(lookup)?;
        info!(
            endpoint = %client_config.endpoint,
            timeout_secs = client_config.timeout.as_secs(),
            "scoring client configured"
        );
        let client = AnomalyDetectorClient::new(&client_config)?;
        Self::with_backend(config, Arc::new(client))
    }
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(ENRICH_ROUTE, post(enrich))
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(&REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

/// Keep a caller-supplied `x-request-id` or mint one, and echo it back.
async fn request_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty())
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    if let Some(id) = &id {
        request.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
    }
    let mut response = next.run(request).await;
    if let Some(id) = id {
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
    }
    response
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "enricher-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Per-request replacements for the configured detection parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionOverrides {
    max_anomaly_ratio: Option<f64>,
    sensitivity: Option<i32>,
    granularity: Option<String>,
}

impl DetectionOverrides {
    fn is_empty(&self) -> bool {
        self.max_anomaly_ratio.is_none() && self.sensitivity.is_none() && self.granularity.is_none()
    }

    fn apply(self, defaults: &DetectionParameters) -> DetectionParameters {
        DetectionParameters {
            max_anomaly_ratio: self.max_anomaly_ratio.unwrap_or(defaults.max_anomaly_ratio),
            sensitivity: self.sensitivity.unwrap_or(defaults.sensitivity),
            granularity: self
                .granularity
                .unwrap_or_else(|| defaults.granularity.clone()),
        }
    }
}

async fn enrich(
    State(state): State<AppState>,
    overrides: Result<Query<DetectionOverrides>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    info!(bytes = body.len(), "enrichment request received");

    let pipeline = &state.pipeline;
    let output = if state.allow_overrides {
        let Query(overrides) = overrides.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        if overrides.is_empty() {
            pipeline.run(&body).await?
        } else {
            let params = overrides.apply(&pipeline.settings().detection);
            debug!(?params, "using request detection parameters");
            pipeline.run_with(&body, &params).await?
        }
    } else {
        if matches!(&overrides, Ok(Query(o)) if !o.is_empty()) {
            debug!("detection overrides are disabled; ignoring query parameters");
        }
        pipeline.run(&body).await?
    };

    Ok(([(header::CONTENT_TYPE, output.content_type)], output.body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use enricher_client::{ConfigError, API_KEY_ENV, ENDPOINT_ENV};
    use enricher_core::{
        ClientError, DetectionRequest, DetectionResult, Envelope, Granularity, OutputMode,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    const SCENARIO_A: &str = "date;value\n01.01.2023;10.0\n01.02.2023;12.0\n01.03.2023;9.0";

    struct CountingBackend {
        calls: AtomicUsize,
        last: Mutex<Option<DetectionRequest>>,
        reply: Result<DetectionResult, ClientError>,
    }

    impl CountingBackend {
        fn replying(reply: Result<DetectionResult, ClientError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_granularity(&self) -> Option<Granularity> {
            self.last.lock().unwrap().as_ref().map(|r| r.granularity)
        }
    }

    #[async_trait]
    impl ScoringBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn detect(&self, request: &DetectionRequest) -> Result<DetectionResult, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            self.reply.clone()
        }
    }

    fn detection(n: usize, anomalies: &[usize]) -> DetectionResult {
        let flags: Vec<bool> = (0..n).map(|i| anomalies.contains(&i)).collect();
        DetectionResult {
            expected_values: vec![10.0; n],
            is_anomaly: flags.clone(),
            is_negative_anomaly: vec![false; n],
            is_positive_anomaly: flags,
            lower_margins: vec![0.5; n],
            upper_margins: vec![0.5; n],
            period: 0,
        }
    }

    fn app_with(config: ServiceConfig, backend: Arc<CountingBackend>) -> Router {
        let state = AppState::with_backend(&config, backend).unwrap();
        build_router(state, &config.server)
    }

    fn app(backend: Arc<CountingBackend>) -> Router {
        app_with(ServiceConfig::default(), backend)
    }

    fn post(uri: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn flat_enrichment_returns_csv() {
        let backend = CountingBackend::replying(Ok(detection(3, &[1])));
        let response = app(backend.clone())
            .oneshot(post(ENRICH_ROUTE, SCENARIO_A))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        assert!(response.headers().contains_key(&REQUEST_ID_HEADER));
        assert_eq!(backend.calls(), 1);

        let body = body_text(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(
            lines[0],
            "date;value;expectedValues;isAnomaly;isNegativeAnomaly;isPositiveAnomaly;lowerMargins;upperMargins"
        );
        assert_eq!(lines[2], "01.02.2023;12.0;10.0;true;false;true;0.5;0.5");
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn envelope_mode_returns_json() {
        let backend = CountingBackend::replying(Ok(detection(3, &[1])));
        let mut config = ServiceConfig::default();
        config.output.mode = OutputMode::Envelope;

        let response = app_with(config, backend)
            .oneshot(post(ENRICH_ROUTE, SCENARIO_A))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let envelope: Envelope = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(envelope.anomaly_detected);
        assert_eq!(envelope.anomaly_periods, vec!["01.02.2023".to_string()]);
    }

    #[tokio::test]
    async fn empty_body_is_rejected_without_scoring() {
        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let response = app(backend.clone())
            .oneshot(post(ENRICH_ROUTE, ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.calls(), 0);
        assert_eq!(body_text(response).await, "input contains no data rows");
    }

    #[tokio::test]
    async fn missing_column_is_rejected_without_scoring() {
        let backend = CountingBackend::replying(Ok(detection(1, &[])));
        let response = app(backend.clone())
            .oneshot(post(ENRICH_ROUTE, "day;value\n01.01.2023;1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.calls(), 0);
        assert!(body_text(response).await.contains("date"));
    }

    #[tokio::test]
    async fn upstream_failures_map_to_gateway_statuses() {
        let cases = [
            (
                Err(ClientError::Service {
                    status: 500,
                    body: "boom".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Err(ClientError::Transport {
                    timed_out: true,
                    message: "deadline elapsed".to_string(),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                Err(ClientError::MalformedResponse("expected value".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            // Two verdicts for three rows
            (Ok(detection(2, &[])), StatusCode::BAD_GATEWAY),
        ];

        for (reply, expected) in cases {
            let backend = CountingBackend::replying(reply);
            let response = app(backend.clone())
                .oneshot(post(ENRICH_ROUTE, SCENARIO_A))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
            assert_eq!(backend.calls(), 1);
        }
    }

    #[tokio::test]
    async fn overrides_are_applied_when_enabled() {
        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let mut config = ServiceConfig::default();
        config.detection.allow_overrides = true;

        let response = app_with(config, backend.clone())
            .oneshot(post(
                &format!("{}?granularity=weekly&sensitivity=80", ENRICH_ROUTE),
                SCENARIO_A,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.last_granularity(), Some(Granularity::Weekly));
        let sent = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.sensitivity, 80);
        assert_eq!(sent.max_anomaly_ratio, 0.25);
    }

    #[tokio::test]
    async fn invalid_override_is_rejected_without_scoring() {
        let mut config = ServiceConfig::default();
        config.detection.allow_overrides = true;

        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let response = app_with(config.clone(), backend.clone())
            .oneshot(post(
                &format!("{}?granularity=fortnightly", ENRICH_ROUTE),
                SCENARIO_A,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("fortnightly"));
        assert_eq!(backend.calls(), 0);

        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let response = app_with(config, backend.clone())
            .oneshot(post(&format!("{}?sensitivity=high", ENRICH_ROUTE), SCENARIO_A))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn overrides_are_ignored_when_disabled() {
        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let response = app(backend.clone())
            .oneshot(post(
                &format!("{}?granularity=fortnightly", ENRICH_ROUTE),
                SCENARIO_A,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.last_granularity(), Some(Granularity::Monthly));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let mut config = ServiceConfig::default();
        config.server.max_body_size = 16;

        let response = app_with(config, backend.clone())
            .oneshot(post(ENRICH_ROUTE, SCENARIO_A))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let backend = CountingBackend::replying(Ok(detection(3, &[])));
        let mut request = post(ENRICH_ROUTE, SCENARIO_A);
        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));

        let response = app(backend).oneshot(request).await.unwrap();
        assert_eq!(response.headers()[&REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let backend = CountingBackend::replying(Ok(detection(0, &[])));
        let response = app(backend)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "enricher-service");
    }

    fn credentials(endpoint: Option<&str>, key: Option<&str>) -> impl Fn(&str) -> Option<String> {
        let endpoint = endpoint.map(str::to_string);
        let key = key.map(str::to_string);
        move |name: &str| match name {
            ENDPOINT_ENV => endpoint.clone(),
            API_KEY_ENV => key.clone(),
            _ => None,
        }
    }

    #[test]
    fn bootstrap_requires_endpoint() {
        let config = ServiceConfig::default();
        let result = AppState::bootstrap_with(&config, credentials(None, Some("key")));
        assert!(matches!(
            result,
            Err(ServiceError::Scoring(ConfigError::Missing(ENDPOINT_ENV)))
        ));
    }

    #[test]
    fn bootstrap_requires_subscription_key() {
        let config = ServiceConfig::default();
        let result =
            AppState::bootstrap_with(&config, credentials(Some("https://detector.test/"), None));
        assert!(matches!(
            result,
            Err(ServiceError::Scoring(ConfigError::Missing(API_KEY_ENV)))
        ));
    }

    #[test]
    fn bootstrap_rejects_malformed_endpoint() {
        let config = ServiceConfig::default();
        let result =
            AppState::bootstrap_with(&config, credentials(Some("not a url"), Some("key")));
        assert!(matches!(
            result,
            Err(ServiceError::Scoring(ConfigError::InvalidEndpoint { .. }))
        ));
    }

    #[test]
    fn bootstrap_with_credentials_checks_settings() {
        let lookup = || credentials(Some("https://detector.test/"), Some("key"));
        assert!(AppState::bootstrap_with(&ServiceConfig::default(), lookup()).is_ok());

        let mut config = ServiceConfig::default();
        config.scoring.timeout_secs = config.server.request_timeout_secs;
        assert!(matches!(
            AppState::bootstrap_with(&config, lookup()),
            Err(ServiceError::Settings(_))
        ));
    }
}
