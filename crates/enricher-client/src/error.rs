use thiserror::Error;

/// Problems found while setting up the client. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid scoring endpoint '{value}': {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
