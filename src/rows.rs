//! Typed result rows decoded from storage rows

use crate::storage::{Row, Value};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    ColumnCount {
        expected: usize,
        found: usize,
    },
    Type {
        column: usize,
        expected: &'static str,
        found: &'static str,
    },
    Timestamp(i64),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::ColumnCount { expected, found } => {
                write!(f, "expected {} columns, found {}", expected, found)
            }
            DecodeError::Type {
                column,
                expected,
                found,
            } => write!(f, "column {}: expected {}, found {}", column, expected, found),
            DecodeError::Timestamp(ts) => write!(f, "timestamp out of range: {}", ts),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one storage row into a typed record
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, DecodeError>;
}

fn expect_columns(row: &Row, expected: usize) -> Result<(), DecodeError> {
    if row.len() != expected {
        return Err(DecodeError::ColumnCount {
            expected,
            found: row.len(),
        });
    }
    Ok(())
}

fn type_error(column: usize, expected: &'static str, found: Option<&Value>) -> DecodeError {
    DecodeError::Type {
        column,
        expected,
        found: found.map_or("missing", Value::type_name),
    }
}

fn text(row: &Row, column: usize) -> Result<String, DecodeError> {
    match row.get(column) {
        Some(Value::Text(s)) => Ok(s.clone()),
        other => Err(type_error(column, "text", other)),
    }
}

fn integer(row: &Row, column: usize) -> Result<i64, DecodeError> {
    match row.get(column) {
        Some(Value::Integer(i)) => Ok(*i),
        other => Err(type_error(column, "integer", other)),
    }
}

// Integers are accepted for real columns: SQLite returns integer storage
// class for whole-number aggregates.
fn real(row: &Row, column: usize) -> Result<f64, DecodeError> {
    match row.get(column) {
        Some(Value::Real(f)) => Ok(*f),
        Some(Value::Integer(i)) => Ok(*i as f64),
        other => Err(type_error(column, "real", other)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    pub name: String,
}

impl FromRow for MarketRow {
    fn from_row(row: &Row) -> Result<Self, DecodeError> {
        expect_columns(row, 1)?;
        Ok(Self {
            name: text(row, 0)?,
        })
    }
}

/// One window of the OHLCV diff series
#[derive(Debug, Clone, PartialEq)]
pub struct DiffPoint {
    pub timestamp: DateTime<Utc>,
    pub market: String,
    /// Percent change of the window's mean close vs. the previous window
    pub avg: f64,
    /// Change of traded volume vs. the previous window
    pub volume_token: f64,
}

impl FromRow for DiffPoint {
    /// Columns: epoch seconds, market, avg, volume_token
    fn from_row(row: &Row) -> Result<Self, DecodeError> {
        expect_columns(row, 4)?;

        let seconds = integer(row, 0)?;
        let timestamp =
            DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(DecodeError::Timestamp(seconds))?;

        Ok(Self {
            timestamp,
            market: text(row, 1)?,
            avg: real(row, 2)?,
            volume_token: real(row, 3)?,
        })
    }
}
