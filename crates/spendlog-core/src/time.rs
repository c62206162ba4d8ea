//! Period resolution for summaries

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Named reporting period, always ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Today only
    Day,
    /// Today minus seven days through today
    Week,
    /// First of the month through today
    Month,
    /// First of the year through today
    Year,
}

impl std::str::FromStr for Period {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "today" | "日" => Ok(Period::Day),
            "week" | "周" => Ok(Period::Week),
            "month" | "月" => Ok(Period::Month),
            "year" | "年" => Ok(Period::Year),
            _ => Err(format!("Invalid period: {}", s)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Week => write!(f, "week"),
            Period::Month => write!(f, "month"),
            Period::Year => write!(f, "year"),
        }
    }
}

impl Period {
    /// First day of the period ending on `today`
    pub fn start_from(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => today,
            Period::Week => today - Duration::days(7),
            Period::Month => today.with_day(1).unwrap_or(today),
            Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        }
    }
}

/// Inclusive date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// Build a window, rejecting a start after the end
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.start && *date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Get a human-readable description of the window
    pub fn description(&self) -> String {
        if self.start == self.end {
            format!("{} (1 day)", self.start)
        } else {
            format!("{} to {} ({} days)", self.start, self.end, self.days())
        }
    }
}

/// Resolve a concrete window from a period name and optional explicit dates
///
/// An explicit start overrides the period; a missing end means today. Returns
/// the label reported alongside the window.
pub fn resolve_window(
    period: Option<&str>,
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
    today: NaiveDate,
) -> CoreResult<(String, Window)> {
    let end = explicit_end.unwrap_or(today);

    let (label, start) = match explicit_start {
        Some(start) => ("custom".to_string(), start),
        None => {
            let name = period.unwrap_or_default();
            let parsed: Period = name.parse().map_err(|_| CoreError::InvalidPeriod {
                period: name.to_string(),
            })?;
            (parsed.to_string(), parsed.start_from(today))
        }
    };

    Ok((label, Window::new(start, end)?))
}

/// Today in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current local time truncated to the minute
pub fn now_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
