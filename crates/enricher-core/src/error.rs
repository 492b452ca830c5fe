use thiserror::Error;

/// Failures turning a request body into a [`crate::TimeSeries`].
///
/// Row numbers are 1-based and count data rows only (the header is not a row).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("request body is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("input contains no data rows")]
    EmptyInput,

    #[error("delimiter '{0}' is not a single-byte character")]
    Delimiter(char),

    #[error(
        "missing required column(s): {}; header has: {}",
        .missing.join(", "),
        .found.join(", ")
    )]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("row {row}: timestamp '{value}' in column '{column}' does not match format {format}")]
    TimestampFormat {
        row: usize,
        column: String,
        value: String,
        format: String,
    },

    #[error("row {row}: value '{value}' in column '{column}' is not a finite number")]
    ValueFormat {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: {message}")]
    Malformed { row: usize, message: String },
}

/// Detection parameters or pipeline settings outside their allowed domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid granularity '{value}'; expected one of: {}", .allowed.join(", "))]
    InvalidGranularity {
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

impl ValidationError {
    pub fn parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Failures talking to the scoring service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("scoring service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("scoring service unreachable: {message}")]
    Transport { timed_out: bool, message: String },

    #[error("malformed scoring response: {0}")]
    MalformedResponse(String),
}

/// Detection arrays that do not line up with the submitted series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("detection field '{field}' has {actual} entries but the series has {expected} points")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("delimiter '{0}' is not a single-byte character")]
    Delimiter(char),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output buffer error: {0}")]
    Buffer(String),
}

/// Coarse failure class used by transports to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller sent something unusable.
    Input,
    /// Detection parameters are out of range.
    Validation,
    /// The scoring service failed or could not be reached.
    Upstream,
    /// The scoring service did not answer in time.
    UpstreamTimeout,
    /// The scoring service answered with something that breaks its contract.
    Contract,
    /// Local failure after a successful merge.
    Internal,
}

/// Any failure of a single pipeline run. Exactly one is produced per failed request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Input(_) => ErrorClass::Input,
            PipelineError::Validation(_) => ErrorClass::Validation,
            PipelineError::Client(ClientError::Transport {
                timed_out: true, ..
            }) => ErrorClass::UpstreamTimeout,
            PipelineError::Client(ClientError::MalformedResponse(_)) => ErrorClass::Contract,
            PipelineError::Client(_) => ErrorClass::Upstream,
            PipelineError::Merge(_) => ErrorClass::Contract,
            PipelineError::Serialize(_) => ErrorClass::Internal,
        }
    }
}
