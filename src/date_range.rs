//! Reporting-window arithmetic. Each external source reports with its own
//! latency, so "today" is pulled back by a source-specific number of days
//! before the comparison windows are laid out.

use chrono::{Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::models::{ComparisonWindows, DateWindow};

/// The requested reporting window, a small fixed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKey {
    Days7,
    Days30,
    Months3,
    Months6,
    Months12,
}

impl RangeKey {
    pub const ALL: [RangeKey; 5] = [
        RangeKey::Days7,
        RangeKey::Days30,
        RangeKey::Months3,
        RangeKey::Months6,
        RangeKey::Months12,
    ];

    /// Window length in days. Month-based ranges use fixed lengths so the
    /// previous window is always exactly as long as the current one.
    pub fn window_days(&self) -> i64 {
        match self {
            RangeKey::Days7 => 7,
            RangeKey::Days30 => 30,
            RangeKey::Months3 => 90,
            RangeKey::Months6 => 180,
            RangeKey::Months12 => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeKey::Days7 => "7d",
            RangeKey::Days30 => "30d",
            RangeKey::Months3 => "3m",
            RangeKey::Months6 => "6m",
            RangeKey::Months12 => "12m",
        }
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(RangeKey::Days7),
            "30d" => Ok(RangeKey::Days30),
            "3m" => Ok(RangeKey::Months3),
            "6m" => Ok(RangeKey::Months6),
            "12m" => Ok(RangeKey::Months12),
            other => Err(anyhow::anyhow!("unknown range key: {}", other)),
        }
    }
}

/// Derive adjacent, equal-length current/previous windows for a source that
/// reports `latency_days` behind `today`.
pub fn compute_windows(range: RangeKey, latency_days: i64, today: NaiveDate) -> ComparisonWindows {
    let length = range.window_days();

    let current_end = today - Duration::days(latency_days);
    let current_start = current_end - Duration::days(length - 1);
    let previous_end = current_start - Duration::days(1);
    let previous_start = previous_end - Duration::days(length - 1);

    ComparisonWindows {
        current: DateWindow::new(current_start, current_end),
        previous: DateWindow::new(previous_start, previous_end),
    }
}
