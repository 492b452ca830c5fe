//! Time series anomaly enrichment core.
//!
//! Turns a delimited time series into an anomaly detection request, hands it
//! to a [`ScoringBackend`], and merges the per-point verdicts back onto the
//! original rows:
//!
//! ```text
//! bytes ─► parser ─► request ─► ScoringBackend ─► merge ─► render ─► bytes
//! ```
//!
//! Nothing here keeps state between runs. Transport, credentials, and the
//! HTTP client live in the service and client crates.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod request;
pub mod result;
pub mod series;

pub use backend::ScoringBackend;
pub use error::{
    ClientError, ErrorClass, MergeError, ParseError, PipelineError, SerializeError,
    ValidationError,
};
pub use merge::{merge, AnomalySummary, EnrichedRecord, EnrichedSeries};
pub use parser::{parse, InputFormat};
pub use pipeline::{EnrichmentPipeline, PipelineSettings};
pub use render::{
    render, render_envelope, render_flat, Envelope, OutputFormat, OutputMode, RenderedOutput,
    DETECTION_COLUMNS,
};
pub use request::{
    build, DetectionParameters, DetectionRequest, Granularity, ValidatedParameters, WirePoint,
    WIRE_TIMESTAMP_FORMAT,
};
pub use result::DetectionResult;
pub use series::{SeriesRow, SeriesSchema, TimePoint, TimeSeries, TimestampFormat};
