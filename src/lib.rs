//! # taskpro
//!
//! Personal task tracker with nested subtasks and deadline-aware reminders.
//!
//! This library provides:
//! - A task forest (tasks holding ordered subtasks, to any depth) persisted as JSON
//! - Path- and id-addressed create/edit/toggle/delete over that forest
//! - A background reminder scheduler that classifies deadlines and notifies a sink
//!
//! ## Architecture
//!
//! ```text
//!   front-end ──mutations──▶ TaskStore ──atomic write──▶ tasks.json
//!       │                      ▲   (RwLock<Forest>)
//!       │ queries              │ read-only scan
//!       ▼                      │
//!   ReminderHandle ◀──── ReminderScheduler ──spawned──▶ NotificationSink
//! ```
//!
//! ## Modules
//! - `task`: Task, ids, paths, deadline math
//! - `store`: TaskStore and the in-memory forest
//! - `reminder`: scan rules, scheduler loop, notification sinks
//! - `settings`: pass-through presentation preferences
//! - `config`: environment configuration
//! - `console`: line-oriented front-end used by the binary

pub mod config;
pub mod console;
pub mod reminder;
pub mod settings;
pub mod store;
pub mod task;
pub mod util;

pub use config::Config;
pub use reminder::{ReminderEvent, ReminderHandle, ReminderScheduler};
pub use settings::PreferencesStore;
pub use store::{StoreError, TaskStore};
pub use task::{NodeRef, Task, TaskId, TaskPath, TaskStatus};
