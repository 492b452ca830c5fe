//! Delimited text → [`TimeSeries`].

use crate::error::{ParseError, ValidationError};
use crate::series::{SeriesRow, SeriesSchema, TimePoint, TimeSeries, TimestampFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How request bodies are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFormat {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    #[serde(default = "default_value_column")]
    pub value_column: String,

    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: TimestampFormat,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            timestamp_column: default_timestamp_column(),
            value_column: default_value_column(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_delimiter() -> char {
    ';'
}

fn default_timestamp_column() -> String {
    "date".to_string()
}

fn default_value_column() -> String {
    "value".to_string()
}

fn default_timestamp_format() -> TimestampFormat {
    TimestampFormat::DayMonthYear
}

impl InputFormat {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.delimiter.is_ascii() {
            return Err(ValidationError::parameter(
                "input.delimiter",
                format!("'{}' is not a single-byte character", self.delimiter),
            ));
        }
        if self.timestamp_column.is_empty() || self.value_column.is_empty() {
            return Err(ValidationError::parameter(
                "input columns",
                "timestamp and value column names must not be empty",
            ));
        }
        if self.timestamp_column == self.value_column {
            return Err(ValidationError::parameter(
                "input columns",
                format!(
                    "timestamp and value column are both '{}'",
                    self.timestamp_column
                ),
            ));
        }
        Ok(())
    }
}

/// Parse `raw` into a time series.
///
/// The first record is the header. Rows keep their input order and every
/// row must parse; the first bad row aborts with its row number.
pub fn parse(raw: &[u8], format: &InputFormat) -> Result<TimeSeries, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|e| ParseError::Encoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let delimiter =
        u8::try_from(format.delimiter).map_err(|_| ParseError::Delimiter(format.delimiter))?;
    if !delimiter.is_ascii() {
        return Err(ParseError::Delimiter(format.delimiter));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Malformed {
            row: 0,
            message: format!("unreadable header: {}", e),
        })?
        .iter()
        .map(str::to_string)
        .collect();
    let schema = SeriesSchema::resolve(columns, &format.timestamp_column, &format.value_column)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| ParseError::Malformed {
            row,
            message: e.to_string(),
        })?;
        rows.push(parse_row(row, &record, &schema, &format.timestamp_format)?);
    }

    if rows.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    debug!(
        rows = rows.len(),
        columns = schema.columns().len(),
        format = %format.timestamp_format,
        "parsed time series"
    );

    Ok(TimeSeries::new(
        schema,
        format.timestamp_format.clone(),
        rows,
    ))
}

fn parse_row(
    row: usize,
    record: &csv::StringRecord,
    schema: &SeriesSchema,
    timestamp_format: &TimestampFormat,
) -> Result<SeriesRow, ParseError> {
    let fields: Vec<String> = record.iter().map(str::to_string).collect();
    let raw_timestamp = field(&fields, schema.timestamp_index(), row)?;
    let raw_value = field(&fields, schema.value_index(), row)?;

    let timestamp =
        timestamp_format
            .parse(raw_timestamp)
            .ok_or_else(|| ParseError::TimestampFormat {
                row,
                column: schema.timestamp_column().to_string(),
                value: raw_timestamp.to_string(),
                format: timestamp_format.to_string(),
            })?;

    let value = raw_value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::ValueFormat {
            row,
            column: schema.value_column().to_string(),
            value: raw_value.to_string(),
        })?;

    Ok(SeriesRow {
        point: TimePoint::new(timestamp, value),
        fields,
    })
}

fn field(fields: &[String], index: usize, row: usize) -> Result<&str, ParseError> {
    fields
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| ParseError::Malformed {
            row,
            message: format!("expected at least {} fields, found {}", index + 1, fields.len()),
        })
}
