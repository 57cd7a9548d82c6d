//! Core Task type: a node in the task forest.
//!
//! # Invariants
//! - `text` is non-empty after trimming
//! - `id` is unique across the whole forest (enforced by the store)
//! - `subtasks` keep insertion order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
///
/// # Properties
/// - Generated at creation, stable for the task's lifetime
/// - Never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status of a task.
///
/// # State Machine
/// ```text
/// Pending <-> Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    /// The other status.
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Pending => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Pending,
        }
    }

    pub fn is_pending(self) -> bool {
        self == TaskStatus::Pending
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
        }
    }
}

/// A task, possibly holding an ordered list of subtasks.
///
/// # Design for Provability
/// - `id` and `created_at` are immutable after construction
/// - `deadline` has no setter; only `text` and `status` change after creation
/// - Each subtask is exclusively owned by its parent's `subtasks` vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,

    text: String,

    status: TaskStatus,

    created_at: DateTime<Utc>,

    /// Absolute deadline; absent in storage means "no deadline"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    subtasks: Vec<Task>,
}

impl Task {
    /// Create a new pending task.
    ///
    /// # Preconditions
    /// - `text` is non-empty after trimming
    /// - `deadline`, when present, is strictly later than `now`
    ///
    /// # Postconditions
    /// - `status == Pending`, `subtasks` is empty, `created_at == now`
    /// - `text` is stored exactly as supplied
    ///
    /// # Errors
    /// Returns `Err` if preconditions are violated.
    pub fn new(
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let text = validate_text(text)?;

        if let Some(deadline) = deadline {
            if deadline <= now {
                return Err(ValidationError::DeadlineNotInFuture { deadline, now });
            }
        }

        Ok(Self {
            id: TaskId::new(),
            text,
            status: TaskStatus::Pending,
            created_at: now,
            deadline,
            subtasks: Vec::new(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn subtasks(&self) -> &[Task] {
        &self.subtasks
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Replace the text. Validated the same way as creation.
    pub(crate) fn set_text(&mut self, text: impl Into<String>) -> Result<(), ValidationError> {
        self.text = validate_text(text)?;
        Ok(())
    }

    pub(crate) fn toggle_status(&mut self) {
        self.status = self.status.toggled();
    }

    pub(crate) fn subtasks_mut(&mut self) -> &mut Vec<Task> {
        &mut self.subtasks
    }

    /// Assign a fresh id. Only used to repair duplicate ids found in storage.
    pub(crate) fn reassign_id(&mut self) -> TaskId {
        self.id = TaskId::new();
        self.id
    }
}

fn validate_text(text: impl Into<String>) -> Result<String, ValidationError> {
    let text = text.into();
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text)
}

/// Errors caused by bad user input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Deadline {deadline} must be later than the current time {now}")]
    DeadlineNotInFuture {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Task has no deadline")]
    NoDeadline,
}
