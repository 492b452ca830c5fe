//! Error types for enricherd

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use enricher_core::{ErrorClass, PipelineError, ValidationError};
use thiserror::Error;
use tracing::{debug, warn};

/// Startup and lifecycle failures. Any of these stops the process.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Settings(#[from] ValidationError),

    #[error("scoring client: {0}")]
    Scoring(#[from] enricher_client::ConfigError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request failures, rendered as `text/plain` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) => status_for(err.class()),
        }
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Input | ErrorClass::Validation => StatusCode::BAD_REQUEST,
        ErrorClass::Upstream | ErrorClass::Contract => StatusCode::BAD_GATEWAY,
        ErrorClass::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "enrichment failed");
        } else {
            debug!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, message).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
