//! Granularity tiers and window-size validation
//!
//! One static tier table drives both the minimum accepted window size and the
//! display granularity. Tiers are keyed by the elapsed hours between start and
//! end and evaluated in ascending order; the first satisfied bound wins.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Target number of points rendered on a chart.
pub const POINTS_ON_SCREEN: i64 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    Hour1,
    Hour4,
    Hour8,
    Day1,
    Day7,
    Month1,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour1 => "1 hour",
            Granularity::Hour4 => "4 hour",
            Granularity::Hour8 => "8 hour",
            Granularity::Day1 => "1 day",
            Granularity::Day7 => "7 day",
            Granularity::Month1 => "1 month",
        }
    }
}

impl Serialize for Granularity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Tier {
    /// Inclusive upper bound on elapsed hours; `None` for the catch-all tier
    max_elapsed_hours: Option<i64>,
    min_window_hours: i64,
    granularity: Granularity,
}

static TIERS: [Tier; 6] = [
    Tier {
        max_elapsed_hours: Some(POINTS_ON_SCREEN),
        min_window_hours: 1,
        granularity: Granularity::Hour1,
    },
    Tier {
        max_elapsed_hours: Some(POINTS_ON_SCREEN * 4),
        min_window_hours: 4,
        granularity: Granularity::Hour4,
    },
    Tier {
        max_elapsed_hours: Some(POINTS_ON_SCREEN * 8),
        min_window_hours: 8,
        granularity: Granularity::Hour8,
    },
    Tier {
        max_elapsed_hours: Some(POINTS_ON_SCREEN * 24),
        min_window_hours: 24,
        granularity: Granularity::Day1,
    },
    Tier {
        max_elapsed_hours: Some(POINTS_ON_SCREEN * 24 * 7),
        min_window_hours: 24 * 7,
        granularity: Granularity::Day7,
    },
    Tier {
        max_elapsed_hours: None,
        min_window_hours: 24 * 30,
        granularity: Granularity::Month1,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    TooSmall { window_size: i64, minimum: i64 },
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::TooSmall { window_size, minimum } => write!(
                f,
                "too small window size for the selected time range (got {}h, minimum {}h)",
                window_size, minimum
            ),
        }
    }
}

impl std::error::Error for WindowError {}

fn elapsed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

fn tier_for(start: DateTime<Utc>, end: DateTime<Utc>) -> &'static Tier {
    let hours = elapsed_hours(start, end);

    TIERS
        .iter()
        .find(|tier| {
            tier.max_elapsed_hours
                .map_or(true, |max| hours <= max as f64)
        })
        .unwrap_or(&TIERS[TIERS.len() - 1])
}

/// Smallest window size (hours) accepted for the given range
pub fn min_window_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    tier_for(start, end).min_window_hours
}

/// Reject window sizes finer than the range's tier allows
pub fn validate(
    window_size_hours: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), WindowError> {
    let minimum = min_window_hours(start, end);

    if window_size_hours < minimum {
        return Err(WindowError::TooSmall {
            window_size: window_size_hours,
            minimum,
        });
    }

    Ok(())
}

/// Display granularity for the range; independent of validation
pub fn granularity_for(start: DateTime<Utc>, end: DateTime<Utc>) -> Granularity {
    tier_for(start, end).granularity
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn range(hours: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (start, start + Duration::hours(hours))
    }

    #[test]
    fn test_granularity_boundaries() {
        let cases = [
            (1, Granularity::Hour1),
            (168, Granularity::Hour1),
            (169, Granularity::Hour4),
            (168 * 4, Granularity::Hour4),
            (168 * 4 + 1, Granularity::Hour8),
            (168 * 8, Granularity::Hour8),
            (168 * 8 + 1, Granularity::Day1),
            (168 * 24, Granularity::Day1),
            (168 * 24 + 1, Granularity::Day7),
            (168 * 24 * 7, Granularity::Day7),
            (168 * 24 * 7 + 1, Granularity::Month1),
        ];

        for (hours, expected) in cases {
            let (start, end) = range(hours);
            assert_eq!(granularity_for(start, end), expected, "span {}h", hours);
        }
    }

    #[test]
    fn test_granularity_labels() {
        let labels: Vec<&str> = [
            Granularity::Hour1,
            Granularity::Hour4,
            Granularity::Hour8,
            Granularity::Day1,
            Granularity::Day7,
            Granularity::Month1,
        ]
        .iter()
        .map(|g| g.as_str())
        .collect();
        assert_eq!(
            labels,
            vec!["1 hour", "4 hour", "8 hour", "1 day", "7 day", "1 month"]
        );
    }

    #[test]
    fn test_fractional_hour_moves_to_next_tier() {
        let (start, _) = range(0);
        let end = start + Duration::hours(168) + Duration::minutes(30);
        assert_eq!(granularity_for(start, end), Granularity::Hour4);
    }

    #[test]
    fn test_validate_short_range() {
        let (start, end) = range(100);
        assert!(validate(0, start, end).is_err());
        assert!(validate(1, start, end).is_ok());
    }

    #[test]
    fn test_validate_at_and_below_minimum_per_tier() {
        let spans_and_minimums = [
            (168, 1),
            (169, 4),
            (168 * 8, 8),
            (168 * 24, 24),
            (168 * 24 * 7, 168),
            (168 * 24 * 7 + 1, 720),
        ];

        for (span, minimum) in spans_and_minimums {
            let (start, end) = range(span);
            assert_eq!(
                validate(minimum - 1, start, end),
                Err(WindowError::TooSmall {
                    window_size: minimum - 1,
                    minimum
                }),
                "span {}h",
                span
            );
            assert!(validate(minimum, start, end).is_ok(), "span {}h", span);
            assert!(validate(minimum * 3, start, end).is_ok(), "span {}h", span);
        }
    }

    #[test]
    fn test_error_message() {
        let (start, end) = range(1000);
        let err = validate(1, start, end).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("too small window size for the selected time range"));
    }
}
