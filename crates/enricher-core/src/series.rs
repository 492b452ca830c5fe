//! Canonical time series representation.
//!
//! A [`TimeSeries`] keeps every parsed row twice: once as a typed
//! [`TimePoint`] used for scoring, and once as the raw field list so the
//! enriched output can repeat the caller's columns exactly as they were sent.

use crate::error::{ParseError, ValidationError};
use crate::request::WIRE_TIMESTAMP_FORMAT;
use chrono::format::{Fixed, Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;

/// A single observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Textual timestamp layout of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimestampFormat {
    /// `DD.MM.YYYY`, e.g. `01.02.2023`
    DayMonthYear,
    /// `Mon-YY`, e.g. `Jan-23`; the day is taken as the 1st
    MonthYear,
    /// RFC 3339 / ISO 8601 date or date-time
    Iso8601,
    /// Any chrono `strftime` pattern. Values with a UTC offset (`%z`,
    /// `%:z`, `%+`, ...) are converted to UTC.
    Pattern(String),
}

impl TimestampFormat {
    pub fn name(&self) -> &str {
        match self {
            TimestampFormat::DayMonthYear => "DD.MM.YYYY",
            TimestampFormat::MonthYear => "Mon-YY",
            TimestampFormat::Iso8601 => "ISO8601",
            TimestampFormat::Pattern(pattern) => pattern,
        }
    }

    /// Parse a raw field. Surrounding whitespace is ignored.
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        match self {
            TimestampFormat::DayMonthYear => midnight(NaiveDate::parse_from_str(raw, "%d.%m.%Y")),
            TimestampFormat::MonthYear => {
                midnight(NaiveDate::parse_from_str(&format!("01-{}", raw), "%d-%b-%y"))
            }
            TimestampFormat::Iso8601 => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.naive_utc())
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .or_else(|| midnight(NaiveDate::parse_from_str(raw, "%Y-%m-%d"))),
            TimestampFormat::Pattern(pattern) if carries_offset(pattern) => {
                DateTime::parse_from_str(raw, pattern)
                    .ok()
                    .map(|dt| dt.naive_utc())
            }
            TimestampFormat::Pattern(pattern) => NaiveDateTime::parse_from_str(raw, pattern)
                .ok()
                .or_else(|| midnight(NaiveDate::parse_from_str(raw, pattern))),
        }
    }

    /// Render a timestamp back into this layout.
    pub fn render(&self, timestamp: &NaiveDateTime) -> String {
        match self {
            TimestampFormat::DayMonthYear => timestamp.format("%d.%m.%Y").to_string(),
            TimestampFormat::MonthYear => timestamp.format("%b-%y").to_string(),
            TimestampFormat::Iso8601 => timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string(),
            // Rendered as UTC so offset specifiers print `+0000`. A pattern
            // built without from_str may still fail to print.
            TimestampFormat::Pattern(pattern) => {
                let mut out = String::new();
                match write!(out, "{}", timestamp.and_utc().format(pattern)) {
                    Ok(()) => out,
                    Err(_) => timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string(),
                }
            }
        }
    }
}

/// Whether `pattern` parses a UTC offset.
fn carries_offset(pattern: &str) -> bool {
    StrftimeItems::new(pattern).any(|item| {
        matches!(
            item,
            Item::Fixed(
                Fixed::TimezoneOffset
                    | Fixed::TimezoneOffsetColon
                    | Fixed::TimezoneOffsetDoubleColon
                    | Fixed::TimezoneOffsetTripleColon
                    | Fixed::TimezoneOffsetColonZ
                    | Fixed::TimezoneOffsetZ
                    | Fixed::RFC2822
                    | Fixed::RFC3339
            )
        )
    })
}

/// Specifier that `pattern` cannot both parse and print, if any.
fn unsupported_specifier(pattern: &str) -> Option<&'static str> {
    // %#z parses but cannot be printed
    let permissive = StrftimeItems::new("%#z").next();
    StrftimeItems::new(pattern).find_map(|item| match item {
        Item::Error => Some("invalid specifier"),
        Item::Fixed(Fixed::TimezoneName) => Some("%Z (zone names cannot be parsed)"),
        ref other if permissive.as_ref() == Some(other) => Some("%#z (cannot be printed)"),
        _ => None,
    })
}

fn midnight(date: chrono::ParseResult<NaiveDate>) -> Option<NaiveDateTime> {
    date.ok().and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl FromStr for TimestampFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DD.MM.YYYY" | "%d.%m.%Y" => Ok(TimestampFormat::DayMonthYear),
            "Mon-YY" | "%b-%y" => Ok(TimestampFormat::MonthYear),
            "ISO8601" | "iso8601" => Ok(TimestampFormat::Iso8601),
            pattern if pattern.contains('%') => {
                if let Some(reason) = unsupported_specifier(pattern) {
                    return Err(ValidationError::parameter(
                        "timestamp_format",
                        format!("'{}' is not a usable strftime pattern: {}", pattern, reason),
                    ));
                }
                Ok(TimestampFormat::Pattern(pattern.to_string()))
            }
            other => Err(ValidationError::parameter(
                "timestamp_format",
                format!(
                    "unknown format '{}'; expected DD.MM.YYYY, Mon-YY, ISO8601 or a strftime pattern",
                    other
                ),
            )),
        }
    }
}

impl TryFrom<String> for TimestampFormat {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimestampFormat> for String {
    fn from(value: TimestampFormat) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header of the input table and where the two required columns sit in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSchema {
    columns: Vec<String>,
    timestamp_index: usize,
    value_index: usize,
}

impl SeriesSchema {
    /// Locate the required columns in `columns` by exact, case-sensitive name.
    pub fn resolve(
        columns: Vec<String>,
        timestamp_column: &str,
        value_column: &str,
    ) -> Result<Self, ParseError> {
        let timestamp_index = columns.iter().position(|c| c == timestamp_column);
        let value_index = columns.iter().position(|c| c == value_column);

        match (timestamp_index, value_index) {
            (Some(timestamp_index), Some(value_index)) => Ok(Self {
                columns,
                timestamp_index,
                value_index,
            }),
            _ => {
                let missing = [(timestamp_index, timestamp_column), (value_index, value_column)]
                    .into_iter()
                    .filter(|(index, _)| index.is_none())
                    .map(|(_, name)| name.to_string())
                    .collect();
                Err(ParseError::Schema {
                    missing,
                    found: columns,
                })
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timestamp_index(&self) -> usize {
        self.timestamp_index
    }

    pub fn value_index(&self) -> usize {
        self.value_index
    }

    pub fn timestamp_column(&self) -> &str {
        &self.columns[self.timestamp_index]
    }

    pub fn value_column(&self) -> &str {
        &self.columns[self.value_index]
    }
}

/// One parsed input row.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub point: TimePoint,
    /// All fields of the row as received, in header order.
    pub fields: Vec<String>,
}

/// Ordered, non-empty sequence of observations. Order is the input order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    schema: SeriesSchema,
    format: TimestampFormat,
    rows: Vec<SeriesRow>,
}

impl TimeSeries {
    pub(crate) fn new(schema: SeriesSchema, format: TimestampFormat, rows: Vec<SeriesRow>) -> Self {
        Self {
            schema,
            format,
            rows,
        }
    }

    /// Build a two-column series from typed points, rendering each timestamp
    /// with `format`.
    pub fn from_points(
        timestamp_column: &str,
        value_column: &str,
        format: TimestampFormat,
        points: impl IntoIterator<Item = TimePoint>,
    ) -> Result<Self, ParseError> {
        let schema = SeriesSchema::resolve(
            vec![timestamp_column.to_string(), value_column.to_string()],
            timestamp_column,
            value_column,
        )?;
        let rows: Vec<SeriesRow> = points
            .into_iter()
            .map(|point| SeriesRow {
                fields: vec![format.render(&point.timestamp), format_number(point.value)],
                point,
            })
            .collect();

        if rows.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        Ok(Self::new(schema, format, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn schema(&self) -> &SeriesSchema {
        &self.schema
    }

    pub fn format(&self) -> &TimestampFormat {
        &self.format
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn points(&self) -> impl Iterator<Item = &TimePoint> + '_ {
        self.rows.iter().map(|row| &row.point)
    }

    /// The timestamp of row `index` exactly as it appeared in the input.
    pub fn raw_timestamp(&self, index: usize) -> Option<&str> {
        self.rows
            .get(index)
            .and_then(|row| row.fields.get(self.schema.timestamp_index))
            .map(String::as_str)
    }

    pub(crate) fn into_parts(self) -> (SeriesSchema, Vec<SeriesRow>) {
        (self.schema, self.rows)
    }
}

/// Render a float so that whole numbers keep a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
