//! Task module - defines tasks, their addressing, and deadline math.
//!
//! - All types use algebraic data types with exhaustive matching
//! - Invariants are documented and enforced in constructors
//! - Pure functions are separated from IO operations

pub mod task;
mod deadline;
mod path;

pub use deadline::{days_left, DeadlineBadge, Urgency};
pub use path::{NodeRef, PathParseError, TaskPath};
pub use task::{Task, TaskId, TaskStatus, ValidationError};
