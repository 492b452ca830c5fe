//! Index-wise merge of a series with its detection result.

use crate::error::MergeError;
use crate::result::DetectionResult;
use crate::series::{SeriesSchema, TimePoint, TimeSeries, TimestampFormat};

/// A series row with its detection fields attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub point: TimePoint,
    /// The input row's fields, in header order.
    pub fields: Vec<String>,
    pub raw_timestamp: String,
    pub expected_value: f64,
    pub is_anomaly: bool,
    pub is_negative_anomaly: bool,
    pub is_positive_anomaly: bool,
    pub lower_margin: f64,
    pub upper_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnomalySummary {
    pub any_anomaly: bool,
    /// Raw input timestamps of anomalous points, in series order.
    pub anomalous_timestamps: Vec<String>,
}

/// Merged output of one request. Built once and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSeries {
    schema: SeriesSchema,
    format: TimestampFormat,
    records: Vec<EnrichedRecord>,
    period: i64,
    summary: AnomalySummary,
}

impl EnrichedSeries {
    pub fn schema(&self) -> &SeriesSchema {
        &self.schema
    }

    pub fn format(&self) -> &TimestampFormat {
        &self.format
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn period(&self) -> i64 {
        self.period
    }

    pub fn summary(&self) -> &AnomalySummary {
        &self.summary
    }
}

/// Pair `series[i]` with element `i` of every detection array.
///
/// All six arrays must have exactly `series.len()` entries; nothing is
/// truncated, padded, reordered or dropped.
pub fn merge(series: TimeSeries, result: DetectionResult) -> Result<EnrichedSeries, MergeError> {
    result.check_len(series.len())?;

    let format = series.format().clone();
    let (schema, rows) = series.into_parts();
    let timestamp_index = schema.timestamp_index();

    let DetectionResult {
        expected_values,
        is_anomaly,
        is_negative_anomaly,
        is_positive_anomaly,
        lower_margins,
        upper_margins,
        period,
    } = result;

    let records: Vec<EnrichedRecord> = rows
        .into_iter()
        .zip(expected_values)
        .zip(is_anomaly)
        .zip(is_negative_anomaly)
        .zip(is_positive_anomaly)
        .zip(lower_margins)
        .zip(upper_margins)
        .map(
            |((((((row, expected_value), is_anomaly), is_negative), is_positive), lower), upper)| {
                EnrichedRecord {
                    point: row.point,
                    raw_timestamp: row.fields.get(timestamp_index).cloned().unwrap_or_default(),
                    fields: row.fields,
                    expected_value,
                    is_anomaly,
                    is_negative_anomaly: is_negative,
                    is_positive_anomaly: is_positive,
                    lower_margin: lower,
                    upper_margin: upper,
                }
            },
        )
        .collect();

    let anomalous_timestamps: Vec<String> = records
        .iter()
        .filter(|record| record.is_anomaly)
        .map(|record| record.raw_timestamp.clone())
        .collect();

    let summary = AnomalySummary {
        any_anomaly: records.iter().any(|record| record.is_anomaly),
        anomalous_timestamps,
    };

    Ok(EnrichedSeries {
        schema,
        format,
        records,
        period,
        summary,
    })
}
