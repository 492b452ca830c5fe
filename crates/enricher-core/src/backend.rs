//! Seam between the pipeline and whatever scores a series.

use crate::error::ClientError;
use crate::request::DetectionRequest;
use crate::result::DetectionResult;
use async_trait::async_trait;

/// A remote (or stubbed) anomaly scorer.
///
/// Implementations perform exactly one call per `detect` and never retry.
/// A returned result must have arrays as long as `request.series`.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn detect(&self, request: &DetectionRequest) -> Result<DetectionResult, ClientError>;
}
