//! Raw request fields → canonical Filter

use super::window::{self, Granularity, WindowError};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::fmt;

/// Single-element repeated value meaning "all values" on the wire
pub const ALL_VALUES_SENTINEL: &str = "-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

impl WindowUnit {
    /// Hours per unit. Months are approximated as 30 days, not calendar months.
    pub fn hours(&self) -> i64 {
        match self {
            WindowUnit::Hours => 1,
            WindowUnit::Days => 24,
            WindowUnit::Weeks => 24 * 7,
            WindowUnit::Months => 24 * 30,
        }
    }
}

impl TryFrom<i32> for WindowUnit {
    type Error = FilterError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(WindowUnit::Hours),
            1 => Ok(WindowUnit::Days),
            2 => Ok(WindowUnit::Weeks),
            3 => Ok(WindowUnit::Months),
            other => Err(FilterError::UnknownWindowUnit(other)),
        }
    }
}

/// Canonical filter for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    /// Empty means unfiltered
    pub exchanges: Vec<String>,
    /// Empty means unfiltered
    pub markets: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Window size in hours
    pub window_size: i64,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    TimestampOutOfRange(i64),
    UnknownWindowUnit(i32),
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Window(WindowError),
}

impl From<WindowError> for FilterError {
    fn from(err: WindowError) -> Self {
        FilterError::Window(err)
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::TimestampOutOfRange(ms) => {
                write!(f, "timestamp out of range: {}ms", ms)
            }
            FilterError::UnknownWindowUnit(raw) => write!(f, "unknown window unit: {}", raw),
            FilterError::EmptyRange { start, end } => write!(
                f,
                "end time must be after start time (start={}, end={})",
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            FilterError::Window(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FilterError {}

/// Epoch milliseconds → UTC instant truncated to the hour
pub fn parse_time(millis: i64) -> Result<DateTime<Utc>, FilterError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or(FilterError::TimestampOutOfRange(millis))
}

/// `["-1"]` → `[]`; anything else passes through unchanged
pub fn parse_repeated_value(values: Vec<String>) -> Vec<String> {
    if values.len() == 1 && values[0] == ALL_VALUES_SENTINEL {
        return Vec::new();
    }

    values
}

pub fn normalize(
    exchanges: Vec<String>,
    markets: Vec<String>,
    start_millis: i64,
    end_millis: i64,
    window_value: i32,
    window_unit: i32,
) -> Result<Filter, FilterError> {
    let start_time = parse_time(start_millis)?;
    let end_time = parse_time(end_millis)?;

    if end_time <= start_time {
        return Err(FilterError::EmptyRange {
            start: start_time,
            end: end_time,
        });
    }

    let unit = WindowUnit::try_from(window_unit)?;
    let window_size = i64::from(window_value) * unit.hours();

    window::validate(window_size, start_time, end_time)?;

    Ok(Filter {
        exchanges: parse_repeated_value(exchanges),
        markets: parse_repeated_value(markets),
        start_time,
        end_time,
        window_size,
        granularity: window::granularity_for(start_time, end_time),
    })
}
