//! Parse → build → score → merge → render, for one request at a time.

use crate::backend::ScoringBackend;
use crate::error::{PipelineError, ValidationError};
use crate::merge::merge;
use crate::parser::{parse, InputFormat};
use crate::render::{render, OutputFormat, RenderedOutput};
use crate::request::{build, DetectionParameters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Deployment-level settings of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub input: InputFormat,

    #[serde(default)]
    pub detection: DetectionParameters,

    #[serde(default)]
    pub output: OutputFormat,
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.input.validate()?;
        self.detection.validate()?;
        self.output.validate()
    }
}

/// The enrichment pipeline.
///
/// Holds only immutable settings and the backend handle; every run creates
/// and drops its own values, so one instance can serve concurrent requests.
pub struct EnrichmentPipeline {
    settings: PipelineSettings,
    backend: Arc<dyn ScoringBackend>,
}

impl EnrichmentPipeline {
    /// Settings are validated here so a bad deployment fails before serving.
    pub fn new(
        settings: PipelineSettings,
        backend: Arc<dyn ScoringBackend>,
    ) -> Result<Self, ValidationError> {
        settings.validate()?;
        Ok(Self { settings, backend })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run with the deployment's detection parameters.
    pub async fn run(&self, raw: &[u8]) -> Result<RenderedOutput, PipelineError> {
        self.run_with(raw, &self.settings.detection).await
    }

    /// Run with explicit detection parameters.
    #[instrument(skip_all, fields(bytes = raw.len(), backend = self.backend.name()))]
    pub async fn run_with(
        &self,
        raw: &[u8],
        params: &DetectionParameters,
    ) -> Result<RenderedOutput, PipelineError> {
        let series = parse(raw, &self.settings.input)?;
        let request = build(&series, params)?;
        debug!(payload = ?request, "submitting series for scoring");

        let result = self.backend.detect(&request).await?;
        let enriched = merge(series, result)?;

        info!(
            points = enriched.len(),
            anomalies = enriched.summary().anomalous_timestamps.len(),
            period = enriched.period(),
            "series enriched"
        );

        Ok(render(&enriched, &self.settings.output)?)
    }
}
