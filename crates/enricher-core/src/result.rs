//! Scoring service response.

use crate::error::MergeError;
use serde::{Deserialize, Serialize};

/// Per-point arrays returned by the entire-series detect call, aligned by
/// index with the submitted series, plus the detected period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub expected_values: Vec<f64>,
    pub is_anomaly: Vec<bool>,
    pub is_negative_anomaly: Vec<bool>,
    pub is_positive_anomaly: Vec<bool>,
    pub lower_margins: Vec<f64>,
    pub upper_margins: Vec<f64>,
    pub period: i64,
}

impl DetectionResult {
    /// Array lengths keyed by their wire names.
    pub fn field_lengths(&self) -> [(&'static str, usize); 6] {
        [
            ("expectedValues", self.expected_values.len()),
            ("isAnomaly", self.is_anomaly.len()),
            ("isNegativeAnomaly", self.is_negative_anomaly.len()),
            ("isPositiveAnomaly", self.is_positive_anomaly.len()),
            ("lowerMargins", self.lower_margins.len()),
            ("upperMargins", self.upper_margins.len()),
        ]
    }

    /// Fails on the first array whose length is not `expected`.
    pub fn check_len(&self, expected: usize) -> Result<(), MergeError> {
        match self
            .field_lengths()
            .into_iter()
            .find(|(_, actual)| *actual != expected)
        {
            Some((field, actual)) => Err(MergeError::LengthMismatch {
                field,
                expected,
                actual,
            }),
            None => Ok(()),
        }
    }
}
