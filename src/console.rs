//! Line-oriented front-end.
//!
//! Parses one command per line, calls into the store and the reminder
//! handle, and renders plain text. Display truncation happens here only;
//! the core keeps full task text.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::reminder::{dispatch, Notification, ReminderHandle};
use crate::settings::PreferencesStore;
use crate::store::{Forest, SharedTaskStore};
use crate::task::{DeadlineBadge, PathParseError, Task, TaskPath, TaskStatus};

pub const HELP: &str = "\
Commands:
  add <deadline|-> <text>          add a task (deadline YYYY-MM-DD or YYYY-MM-DDTHH:MM, local time)
  sub <path> <deadline|-> <text>   add a subtask under <path> (e.g. 0.1)
  edit <path> <text>               replace a task's text
  toggle <path>                    switch between pending and completed
  rm <path>                        delete a task and its subtasks
  ls                               show all tasks
  count                            show pending/completed totals
  notify <path>                    send a reminder for a task now
  pref [key [json-value]]          show or set a preference
  help                             show this help
  quit                             exit";

/// Characters of task text shown in confirmation notifications.
const SHORT_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        deadline: Option<DateTime<Utc>>,
        text: String,
    },
    Sub {
        parent: TaskPath,
        deadline: Option<DateTime<Utc>>,
        text: String,
    },
    Edit {
        path: TaskPath,
        text: String,
    },
    Toggle(TaskPath),
    Remove(TaskPath),
    List,
    Count,
    Notify(TaskPath),
    Pref {
        key: Option<String>,
        value: Option<Value>,
    },
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Path(#[from] PathParseError),

    #[error("Invalid deadline '{0}', use YYYY-MM-DD or YYYY-MM-DDTHH:MM")]
    Deadline(String),

    #[error("Invalid preference value: {0}")]
    Value(#[from] serde_json::Error),
}

/// Parse one input line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = split_word(line);

    let command = match verb {
        "add" => {
            let (deadline, text) = split_word(rest);
            Command::Add {
                deadline: parse_deadline(required(deadline, "deadline")?)?,
                text: required(text, "task text")?.to_string(),
            }
        }
        "sub" => {
            let (parent, rest) = split_word(rest);
            let (deadline, text) = split_word(rest);
            Command::Sub {
                parent: required(parent, "path")?.parse()?,
                deadline: parse_deadline(required(deadline, "deadline")?)?,
                text: required(text, "task text")?.to_string(),
            }
        }
        "edit" => {
            let (path, text) = split_word(rest);
            Command::Edit {
                path: required(path, "path")?.parse()?,
                text: required(text, "task text")?.to_string(),
            }
        }
        "toggle" => Command::Toggle(required(rest, "path")?.parse()?),
        "rm" => Command::Remove(required(rest, "path")?.parse()?),
        "notify" => Command::Notify(required(rest, "path")?.parse()?),
        "ls" => Command::List,
        "count" => Command::Count,
        "pref" => {
            let (key, value) = split_word(rest);
            Command::Pref {
                key: (!key.is_empty()).then(|| key.to_string()),
                value: if value.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(value)?)
                },
            }
        }
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// `-` means no deadline; dates without a time are local midnight.
pub fn parse_deadline(raw: &str) -> Result<Option<DateTime<Utc>>, CommandError> {
    if raw == "-" {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| CommandError::Deadline(raw.to_string()))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| Some(local.with_timezone(&Utc)))
        .ok_or_else(|| CommandError::Deadline(raw.to_string()))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if value.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(value)
    }
}

fn short_text(text: &str) -> String {
    if text.chars().count() > SHORT_TEXT_CHARS {
        let head: String = text.chars().take(SHORT_TEXT_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Render the whole forest as an indented list with a totals footer.
pub fn render_forest(forest: &Forest, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for (path, task) in forest.walk() {
        let marker = match task.status() {
            TaskStatus::Pending => "[ ]",
            TaskStatus::Completed => "[x]",
        };
        let badge = DeadlineBadge::for_deadline(task.deadline(), now);
        out.push_str(&format!(
            "{}{} {:<8} {:<13} {}\n",
            "  ".repeat(path.depth()),
            marker,
            path,
            badge,
            task.text().replace('\n', " ")
        ));
    }
    let counts = forest.count_by_status();
    out.push_str(&format!(
        "Total: {} | Pending: {} | Completed: {}",
        counts.total(),
        counts.pending,
        counts.completed
    ));
    out
}

pub struct Console<'a> {
    store: SharedTaskStore,
    preferences: Arc<PreferencesStore>,
    reminders: &'a ReminderHandle,
}

impl<'a> Console<'a> {
    pub fn new(
        store: SharedTaskStore,
        preferences: Arc<PreferencesStore>,
        reminders: &'a ReminderHandle,
    ) -> Self {
        Self {
            store,
            preferences,
            reminders,
        }
    }

    /// Run a command and return the text to print.
    pub async fn execute(&self, command: Command) -> anyhow::Result<String> {
        let output = match command {
            Command::Add { deadline, text } => {
                let task = self.store.create_task(text, deadline).await?;
                self.confirm_added(&task);
                format!("Added task {}", task.id())
            }
            Command::Sub {
                parent,
                deadline,
                text,
            } => {
                let task = self.store.create_subtask(parent, text, deadline).await?;
                self.confirm_added(&task);
                match self.store.path_of(task.id()).await {
                    Some(path) => format!("Added subtask at {}", path),
                    None => format!("Added subtask {}", task.id()),
                }
            }
            Command::Edit { path, text } => {
                self.store.edit_text(path, text).await?;
                "Updated".to_string()
            }
            Command::Toggle(path) => {
                let task = self.store.toggle_status(path).await?;
                dispatch(
                    self.reminders.sink(),
                    Notification::new(
                        "Status updated",
                        format!(
                            "{}\nStatus: {}",
                            short_text(task.text()),
                            task.status().label()
                        ),
                        None,
                    ),
                );
                format!("Now {}", task.status().label())
            }
            Command::Remove(path) => {
                let removed = self.store.delete_node(path).await?;
                format!("Deleted '{}'", short_text(removed.text()))
            }
            Command::List => {
                let now = Utc::now();
                self.store.read(|forest| render_forest(forest, now)).await
            }
            Command::Count => {
                let counts = self.store.count_by_status().await;
                format!(
                    "Total: {} | Pending: {} | Completed: {}",
                    counts.total(),
                    counts.pending,
                    counts.completed
                )
            }
            Command::Notify(path) => {
                let event = self.reminders.notify_now(path).await?;
                format!("Reminder sent: {}", event.countdown())
            }
            Command::Pref { key: None, .. } => {
                serde_json::to_string_pretty(&self.preferences.all().await)?
            }
            Command::Pref {
                key: Some(key),
                value: None,
            } => match self.preferences.get(&key).await {
                Some(value) => value.to_string(),
                None => format!("{} is not set", key),
            },
            Command::Pref {
                key: Some(key),
                value: Some(value),
            } => {
                self.preferences.set(key.clone(), value).await?;
                format!("Saved {}", key)
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };
        Ok(output)
    }

    fn confirm_added(&self, task: &Task) {
        let deadline = task
            .deadline()
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "none".to_string());
        dispatch(
            self.reminders.sink(),
            Notification::new(
                "Task added",
                format!("{}\nDeadline: {}", short_text(task.text()), deadline),
                None,
            ),
        );
    }
}
