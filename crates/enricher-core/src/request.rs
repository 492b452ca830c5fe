//! Detection parameters and the scoring service request payload.

use crate::error::ValidationError;
use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp layout the scoring service expects.
pub const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Nominal sampling interval of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Granularity {
    pub const ALL: [Granularity; 7] = [
        Granularity::Secondly,
        Granularity::Minutely,
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
        Granularity::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Secondly => "secondly",
            Granularity::Minutely => "minutely",
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        }
    }

    pub fn allowed() -> Vec<&'static str> {
        Self::ALL.iter().map(Granularity::as_str).collect()
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidGranularity {
                value: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable detection parameters as configured or requested.
///
/// Values are kept unvalidated here so that out-of-range input can be
/// reported precisely; [`DetectionParameters::validate`] checks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParameters {
    #[serde(default = "default_max_anomaly_ratio")]
    pub max_anomaly_ratio: f64,

    #[serde(default = "default_sensitivity")]
    pub sensitivity: i32,

    #[serde(default = "default_granularity")]
    pub granularity: String,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            max_anomaly_ratio: default_max_anomaly_ratio(),
            sensitivity: default_sensitivity(),
            granularity: default_granularity(),
        }
    }
}

fn default_max_anomaly_ratio() -> f64 {
    0.25
}

fn default_sensitivity() -> i32 {
    95
}

fn default_granularity() -> String {
    Granularity::Monthly.as_str().to_string()
}

/// Parameters that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedParameters {
    pub max_anomaly_ratio: f64,
    pub sensitivity: u8,
    pub granularity: Granularity,
}

impl DetectionParameters {
    /// Check granularity first, then the anomaly ratio, then sensitivity.
    pub fn validate(&self) -> Result<ValidatedParameters, ValidationError> {
        let granularity: Granularity = self.granularity.parse()?;

        if !(self.max_anomaly_ratio > 0.0 && self.max_anomaly_ratio <= 1.0) {
            return Err(ValidationError::parameter(
                "maxAnomalyRatio",
                format!("{} is outside (0, 1]", self.max_anomaly_ratio),
            ));
        }

        let sensitivity = u8::try_from(self.sensitivity)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or_else(|| {
                ValidationError::parameter(
                    "sensitivity",
                    format!("{} is outside [0, 100]", self.sensitivity),
                )
            })?;

        Ok(ValidatedParameters {
            max_anomaly_ratio: self.max_anomaly_ratio,
            sensitivity,
            granularity,
        })
    }
}

/// One point as sent to the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub timestamp: String,
    pub value: f64,
}

/// Body of the entire-series detect call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub series: Vec<WirePoint>,
    pub max_anomaly_ratio: f64,
    pub sensitivity: u8,
    pub granularity: Granularity,
}

impl DetectionRequest {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Validate `params` and render `series` into the scoring request.
///
/// Timestamps are always re-rendered in [`WIRE_TIMESTAMP_FORMAT`],
/// whatever their input layout was.
pub fn build(
    series: &TimeSeries,
    params: &DetectionParameters,
) -> Result<DetectionRequest, ValidationError> {
    let params = params.validate()?;

    let series = series
        .points()
        .map(|point| WirePoint {
            timestamp: point.timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string(),
            value: point.value,
        })
        .collect();

    Ok(DetectionRequest {
        series,
        max_anomaly_ratio: params.max_anomaly_ratio,
        sensitivity: params.sensitivity,
        granularity: params.granularity,
    })
}
