//! Corruption threshold gate
//!
//! Per-row decode failures are tolerated until their share exceeds the
//! configured ceiling. The ratio is failures relative to successes, computed
//! in floating point; zero successes with any failure counts as 100% corrupt.

use crate::storage::StorageError;
use crate::streaming::{CancelReason, StreamError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Accept,
    Reject { corrupt_percent: f64 },
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

/// Failed rows as a percentage of succeeded rows
pub fn corrupt_percent(succeeded: usize, failed: usize) -> f64 {
    if failed == 0 {
        return 0.0;
    }
    if succeeded == 0 {
        return 100.0;
    }
    failed as f64 / succeeded as f64 * 100.0
}

pub fn decide(succeeded: usize, failed: usize, max_corrupt_percent: f64) -> GateDecision {
    if failed == 0 {
        return GateDecision::Accept;
    }

    let corrupt_percent = corrupt_percent(succeeded, failed);
    if succeeded == 0 || corrupt_percent > max_corrupt_percent {
        return GateDecision::Reject { corrupt_percent };
    }

    GateDecision::Accept
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccumulateError {
    Cancelled(CancelReason),
    Storage(StorageError),
    TooCorrupt {
        succeeded: usize,
        failed: usize,
        corrupt_percent: f64,
    },
}

impl fmt::Display for AccumulateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccumulateError::Cancelled(reason) => write!(f, "{}", reason),
            AccumulateError::Storage(e) => write!(f, "{}", e),
            AccumulateError::TooCorrupt {
                succeeded,
                failed,
                corrupt_percent,
            } => write!(
                f,
                "too many corrupt rows: {} failed / {} succeeded ({:.2}%)",
                failed, succeeded, corrupt_percent
            ),
        }
    }
}

impl std::error::Error for AccumulateError {}

/// Successful rows plus failure count for one request
#[derive(Debug)]
pub struct ResponseAccumulator<T> {
    rows: Vec<T>,
    failed: usize,
    terminal: Option<StreamError>,
}

impl<T> Default for ResponseAccumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResponseAccumulator<T> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            failed: 0,
            terminal: None,
        }
    }

    pub fn push(&mut self, item: Result<T, StreamError>) {
        match item {
            Ok(row) => self.rows.push(row),
            Err(StreamError::Decode(e)) => {
                log::warn!("⚠️  Skipping corrupt row: {}", e);
                self.failed += 1;
            }
            Err(terminal) => {
                if self.terminal.is_none() {
                    self.terminal = Some(terminal);
                }
            }
        }
    }

    pub fn succeeded(&self) -> usize {
        self.rows.len()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Apply the terminal outcome and the corruption ceiling
    pub fn finish(self, max_corrupt_percent: f64) -> Result<Vec<T>, AccumulateError> {
        match self.terminal {
            Some(StreamError::Cancelled(reason)) => return Err(AccumulateError::Cancelled(reason)),
            Some(StreamError::Storage(e)) => return Err(AccumulateError::Storage(e)),
            Some(StreamError::Decode(_)) | None => {}
        }

        match decide(self.rows.len(), self.failed, max_corrupt_percent) {
            GateDecision::Accept => Ok(self.rows),
            GateDecision::Reject { corrupt_percent } => Err(AccumulateError::TooCorrupt {
                succeeded: self.rows.len(),
                failed: self.failed,
                corrupt_percent,
            }),
        }
    }
}
