//! Deadline reminders.
//!
//! The decision of which tasks deserve a reminder is a pure function of
//! `(now, today, last checked date, forest)` and lives in [`ReminderScan`].
//! [`ReminderScheduler`] wraps it in a background loop and hands the
//! resulting notifications to a [`NotificationSink`].
//!
//! # Firing rules
//! ```text
//! day rolled over since last scan:  daysLeft <= 7
//! regular pass:                     daysLeft in {7, 3, 1, 0} or daysLeft < 0
//! ```
//! Only pending tasks with a deadline are considered, at every nesting depth.

mod scheduler;
mod sink;

pub use scheduler::{Clock, ReminderHandle, ReminderScheduler, ScanError};
pub use sink::{dispatch, ChannelSink, LogSink, NoopSink, Notification, NotificationSink};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{days_left, Task, TaskId, TaskStatus, Urgency, ValidationError};
use crate::util::days_phrase;

/// Days-left values that fire on a regular (non-rollover) pass.
pub const MILESTONE_DAYS: [i64; 4] = [7, 3, 1, 0];

/// Rollover passes fire for anything due within this many days.
pub const ROLLOVER_WINDOW_DAYS: i64 = 7;

/// A reminder for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub task_id: TaskId,
    /// Full task text, never truncated
    pub text: String,
    pub status: TaskStatus,
    pub deadline: DateTime<Utc>,
    pub days_left: i64,
    pub urgency: Urgency,
}

impl ReminderEvent {
    /// Compute the reminder for `task` at `now`, regardless of firing rules.
    ///
    /// # Errors
    /// `ValidationError::NoDeadline` if the task has no deadline.
    pub fn for_task(task: &Task, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let deadline = task.deadline().ok_or(ValidationError::NoDeadline)?;
        let days_left = days_left(deadline, now);
        Ok(Self {
            task_id: task.id(),
            text: task.text().to_string(),
            status: task.status(),
            deadline,
            days_left,
            urgency: Urgency::from_days_left(days_left),
        })
    }

    /// Short time-to-deadline phrase: "3 days left", "due today", "overdue by 2 days".
    pub fn countdown(&self) -> String {
        match self.urgency {
            Urgency::OnTime => format!("{} left", days_phrase(self.days_left)),
            Urgency::DueToday => "due today".to_string(),
            Urgency::Overdue => format!("overdue by {}", days_phrase(-self.days_left)),
        }
    }

    /// Notification for a scheduled reminder.
    pub fn notification(&self) -> Notification {
        let (title, detail) = match self.urgency {
            Urgency::DueToday => (
                "Deadline today!",
                "Due today, don't forget!".to_string(),
            ),
            Urgency::OnTime => (
                "Deadline reminder",
                format!("{} left until the deadline", days_phrase(self.days_left)),
            ),
            Urgency::Overdue => (
                "Deadline overdue",
                format!("Overdue by {}", days_phrase(-self.days_left)),
            ),
        };
        Notification::new(title, format!("{}\n{}", self.text, detail), Some(self.urgency))
    }

    /// Notification for an explicit "notify me now" request.
    pub fn on_demand_notification(&self) -> Notification {
        let message = format!(
            "{}\nStatus: {}\nDeadline: {}\n{}",
            self.text,
            self.status.label(),
            self.deadline.format("%Y-%m-%d %H:%M UTC"),
            self.countdown()
        );
        Notification::new("Task reminder", message, Some(self.urgency))
    }
}

/// Whether a pending task with `days_left` fires on this pass.
pub fn should_fire(days_left: i64, day_rolled_over: bool) -> bool {
    if day_rolled_over {
        days_left <= ROLLOVER_WINDOW_DAYS
    } else {
        days_left < 0 || MILESTONE_DAYS.contains(&days_left)
    }
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub day_rolled_over: bool,
    pub events: Vec<ReminderEvent>,
}

/// Scan state carried between passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderScan {
    last_checked_date: NaiveDate,
}

impl ReminderScan {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            last_checked_date: today,
        }
    }

    pub fn last_checked_date(&self) -> NaiveDate {
        self.last_checked_date
    }

    /// Run one pass over `tasks` (expected in pre-order).
    ///
    /// # Postconditions
    /// - At most one event per task
    /// - `last_checked_date` advances to `today` on rollover
    pub fn evaluate<'a>(
        &mut self,
        tasks: impl IntoIterator<Item = &'a Task>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> ScanOutcome {
        let day_rolled_over = today > self.last_checked_date;
        if day_rolled_over {
            self.last_checked_date = today;
        }

        let events = tasks
            .into_iter()
            .filter(|task| task.is_pending())
            .filter_map(|task| ReminderEvent::for_task(task, now).ok())
            .filter(|event| should_fire(event.days_left, day_rolled_over))
            .collect();

        ScanOutcome {
            day_rolled_over,
            events,
        }
    }
}
