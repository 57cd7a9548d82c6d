//! Deadline math shared by the reminder scan and presentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days between `now` and `deadline`, floored.
///
/// A deadline one second in the past is `-1`; one that is 23 hours away is `0`.
pub fn days_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Reminder classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    OnTime,
    DueToday,
    Overdue,
}

impl Urgency {
    pub fn from_days_left(days_left: i64) -> Self {
        match days_left {
            d if d < 0 => Urgency::Overdue,
            0 => Urgency::DueToday,
            _ => Urgency::OnTime,
        }
    }
}

/// Display classification for a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineBadge {
    NoDeadline,
    Overdue { days: i64 },
    DueToday,
    /// One to three days left
    Soon { days: i64 },
    Later { days: i64 },
}

impl DeadlineBadge {
    pub fn for_deadline(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(deadline) = deadline else {
            return DeadlineBadge::NoDeadline;
        };
        match days_left(deadline, now) {
            d if d < 0 => DeadlineBadge::Overdue { days: -d },
            0 => DeadlineBadge::DueToday,
            d if d <= 3 => DeadlineBadge::Soon { days: d },
            d => DeadlineBadge::Later { days: d },
        }
    }
}

impl std::fmt::Display for DeadlineBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let badge = match self {
            DeadlineBadge::NoDeadline => "-".to_string(),
            DeadlineBadge::Overdue { days } => format!("overdue ({}d)", days),
            DeadlineBadge::DueToday => "today!".to_string(),
            DeadlineBadge::Soon { days } => format!("! {} days", days),
            DeadlineBadge::Later { days } => format!("{} days", days),
        };
        f.pad(&badge)
    }
}
