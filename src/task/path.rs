//! Addressing nodes in the forest.
//!
//! A [`TaskPath`] is positional: root index, then subtask indices. It is only
//! valid until a sibling list above it changes. A [`TaskId`] is stable, so
//! callers that hold on to a node across mutations should address it by id.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Positional address: `[root, child, grandchild, ...]`.
///
/// # Invariants
/// - Never empty (enforced by every constructor)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct TaskPath(Vec<usize>);

impl TaskPath {
    /// Path of a root-level task.
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    /// Build a path from raw indices. Returns `None` for an empty list.
    pub fn from_indices(indices: Vec<usize>) -> Option<Self> {
        if indices.is_empty() {
            None
        } else {
            Some(Self(indices))
        }
    }

    /// Path of this node's child at `index`.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Path of the parent node, `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// Index within the parent's (or the root list's) sequence.
    pub fn last(&self) -> usize {
        // Non-empty by construction.
        self.0[self.0.len() - 1]
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Nesting depth; roots are depth 0.
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }
}

impl TryFrom<Vec<usize>> for TaskPath {
    type Error = PathParseError;

    fn try_from(indices: Vec<usize>) -> Result<Self, Self::Error> {
        Self::from_indices(indices).ok_or(PathParseError::Empty)
    }
}

impl From<TaskPath> for Vec<usize> {
    fn from(path: TaskPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for TaskPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dotted = self
            .0
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.pad(&dotted)
    }
}

impl std::str::FromStr for TaskPath {
    type Err = PathParseError;

    /// Parse dot-separated indices, e.g. `"0.2.1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        let indices = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(PathParseError::InvalidIndex(part.to_string()));
                }
                part.parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(indices))
    }
}

/// Reference to a node, either by position or by stable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Path(TaskPath),
    Id(TaskId),
}

impl From<TaskPath> for NodeRef {
    fn from(path: TaskPath) -> Self {
        NodeRef::Path(path)
    }
}

impl From<&TaskPath> for NodeRef {
    fn from(path: &TaskPath) -> Self {
        NodeRef::Path(path.clone())
    }
}

impl From<TaskId> for NodeRef {
    fn from(id: TaskId) -> Self {
        NodeRef::Id(id)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRef::Path(path) => write!(f, "path {}", path),
            NodeRef::Id(id) => write!(f, "id {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("Path cannot be empty")]
    Empty,

    #[error("Invalid path index '{0}'")]
    InvalidIndex(String),
}
