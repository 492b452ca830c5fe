//! Enricher HTTP service
//!
//! Exposes the enrichment pipeline as `POST /api/anomalydetection`:
//! the request body is a delimited time series, the response is the same
//! table with the detection columns appended (or a JSON envelope around it).

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::{DetectionConfig, ScoringConfig, ServerConfig, ServiceConfig};
pub use error::{ApiError, ServiceError};
pub use routes::{build_router, AppState, ENRICH_ROUTE, REQUEST_ID_HEADER};
pub use server::Server;
