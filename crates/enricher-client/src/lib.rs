//! Anomaly Detector REST client.
//!
//! Implements [`enricher_core::ScoringBackend`] over `reqwest`, posting the
//! whole series to `{endpoint}/anomalydetector/v1.0/timeseries/entire/detect`
//! with the `Ocp-Apim-Subscription-Key` header.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;

pub use client::{AnomalyDetectorClient, DETECT_PATH, SUBSCRIPTION_KEY_HEADER};
pub use config::{ClientConfig, API_KEY_ENV, DEFAULT_TIMEOUT, ENDPOINT_ENV};
pub use error::ConfigError;
