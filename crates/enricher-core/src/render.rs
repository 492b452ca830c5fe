//! Rendering of an [`EnrichedSeries`] as a delimited table or a JSON envelope.

use crate::error::{SerializeError, ValidationError};
use crate::merge::EnrichedSeries;
use crate::series::format_number;
use serde::{Deserialize, Serialize};

/// Names of the per-point detection columns appended to every row.
pub const DETECTION_COLUMNS: [&str; 6] = [
    "expectedValues",
    "isAnomaly",
    "isNegativeAnomaly",
    "isPositiveAnomaly",
    "lowerMargins",
    "upperMargins",
];

pub const PERIOD_COLUMN: &str = "period";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Delimited table, one row per record
    #[default]
    Flat,
    /// JSON object with summary fields and the table embedded as a string
    Envelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    #[serde(default)]
    pub mode: OutputMode,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Repeat the detected period on every row as an extra column.
    #[serde(default)]
    pub include_period: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            mode: OutputMode::Flat,
            delimiter: default_delimiter(),
            include_period: false,
        }
    }
}

fn default_delimiter() -> char {
    ';'
}

impl OutputFormat {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.delimiter.is_ascii() {
            return Err(ValidationError::parameter(
                "output.delimiter",
                format!("'{}' is not a single-byte character", self.delimiter),
            ));
        }
        Ok(())
    }
}

/// Summary plus the flat table, as returned in envelope mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub anomaly_detected: bool,
    pub anomaly_periods: Vec<String>,
    pub enriched_data: String,
}

/// A response body and its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub content_type: &'static str,
    pub body: String,
}

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Render every input column followed by the detection columns.
///
/// Input fields, timestamps included, are written back exactly as received.
pub fn render_flat(series: &EnrichedSeries, format: &OutputFormat) -> Result<String, SerializeError> {
    let delimiter = u8::try_from(format.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(SerializeError::Delimiter(format.delimiter))?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let mut header: Vec<&str> = series.schema().columns().iter().map(String::as_str).collect();
    header.extend(DETECTION_COLUMNS);
    if format.include_period {
        header.push(PERIOD_COLUMN);
    }
    writer.write_record(&header)?;

    let period = series.period().to_string();
    for record in series.records() {
        let mut row = record.fields.clone();
        row.push(format_number(record.expected_value));
        row.push(record.is_anomaly.to_string());
        row.push(record.is_negative_anomaly.to_string());
        row.push(record.is_positive_anomaly.to_string());
        row.push(format_number(record.lower_margin));
        row.push(format_number(record.upper_margin));
        if format.include_period {
            row.push(period.clone());
        }
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SerializeError::Buffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SerializeError::Buffer(e.to_string()))
}

pub fn render_envelope(
    series: &EnrichedSeries,
    format: &OutputFormat,
) -> Result<Envelope, SerializeError> {
    let summary = series.summary();
    Ok(Envelope {
        anomaly_detected: summary.any_anomaly,
        anomaly_periods: summary.anomalous_timestamps.clone(),
        enriched_data: render_flat(series, format)?,
    })
}

/// Render according to `format.mode`.
pub fn render(series: &EnrichedSeries, format: &OutputFormat) -> Result<RenderedOutput, SerializeError> {
    match format.mode {
        OutputMode::Flat => Ok(RenderedOutput {
            content_type: CSV_CONTENT_TYPE,
            body: render_flat(series, format)?,
        }),
        OutputMode::Envelope => Ok(RenderedOutput {
            content_type: JSON_CONTENT_TYPE,
            body: serde_json::to_string(&render_envelope(series, format)?)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::parser::{parse, InputFormat};
    use crate::result::DetectionResult;
    use crate::series::TimestampFormat;

    fn enriched(anomalies: [bool; 3]) -> EnrichedSeries {
        let input = InputFormat {
            delimiter: ',',
            timestamp_column: "month".into(),
            value_column: "value".into(),
            timestamp_format: TimestampFormat::MonthYear,
        };
        let series = parse(b"month,value\nJan-23,10\nFeb-23,30.5\nMar-23,9\n", &input).unwrap();
        let result = DetectionResult {
            expected_values: vec![10.0, 11.25, 9.0],
            is_anomaly: anomalies.to_vec(),
            is_negative_anomaly: vec![false; 3],
            is_positive_anomaly: anomalies.to_vec(),
            lower_margins: vec![0.1, 0.1, 0.1],
            upper_margins: vec![0.1, 0.1, 0.1],
            period: 12,
        };
        merge(series, result).unwrap()
    }

    #[test]
    fn test_flat_table() {
        let table = render_flat(&enriched([false, true, false]), &OutputFormat::default()).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "month;value;expectedValues;isAnomaly;isNegativeAnomaly;isPositiveAnomaly;lowerMargins;upperMargins"
        );
        assert_eq!(lines[1], "Jan-23;10;10.0;false;false;false;0.1;0.1");
        assert_eq!(lines[2], "Feb-23;30.5;11.25;true;false;true;0.1;0.1");
    }

    #[test]
    fn test_flat_table_with_period() {
        let format = OutputFormat {
            delimiter: '\t',
            include_period: true,
            ..Default::default()
        };
        let table = render_flat(&enriched([false; 3]), &format).unwrap();
        let first = table.lines().next().unwrap();
        assert!(first.ends_with("\tupperMargins\tperiod"));
        assert!(table.lines().nth(1).unwrap().ends_with("\t12"));
    }

    #[test]
    fn test_envelope_without_anomalies() {
        let format = OutputFormat {
            mode: OutputMode::Envelope,
            ..Default::default()
        };
        let rendered = render(&enriched([false; 3]), &format).unwrap();
        assert_eq!(rendered.content_type, JSON_CONTENT_TYPE);

        let envelope: Envelope = serde_json::from_str(&rendered.body).unwrap();
        assert!(!envelope.anomaly_detected);
        assert!(envelope.anomaly_periods.is_empty());
        assert!(envelope.enriched_data.starts_with("month;value;expectedValues"));
    }

    #[test]
    fn test_envelope_uses_input_timestamps() {
        let format = OutputFormat {
            mode: OutputMode::Envelope,
            ..Default::default()
        };
        let rendered = render(&enriched([true, false, true]), &format).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered.body).unwrap();

        assert_eq!(value["anomalyDetected"], true);
        assert_eq!(value["anomalyPeriods"], serde_json::json!(["Jan-23", "Mar-23"]));
        let data = value["enrichedData"].as_str().unwrap();
        assert!(data.contains("\nMar-23;9;"));
        assert!(!data.contains("2023-03-01"));
    }

    #[test]
    fn test_flat_content_type() {
        let rendered = render(&enriched([false; 3]), &OutputFormat::default()).unwrap();
        assert_eq!(rendered.content_type, CSV_CONTENT_TYPE);
    }

    #[test]
    fn test_wide_delimiter_rejected() {
        let format = OutputFormat {
            delimiter: 'é',
            ..Default::default()
        };
        assert!(format.validate().is_err());
        assert!(matches!(
            render_flat(&enriched([false; 3]), &format),
            Err(SerializeError::Delimiter('é'))
        ));
    }
}
