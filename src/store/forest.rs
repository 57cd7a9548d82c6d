//! In-memory task forest with an id index.
//!
//! The tree (`roots` and each task's `subtasks`) owns every node. The index
//! maps ids to current paths and is a lookup aid only: it is extended on
//! append and rebuilt after anything that shifts sibling positions.
//!
//! Traversals use an explicit stack so deep nesting cannot overflow the
//! call stack.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::task::{NodeRef, Task, TaskId, TaskPath, TaskStatus};

/// Pending/completed totals across every node of the forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.completed
    }
}

#[derive(Debug, Clone, Default)]
pub struct Forest {
    roots: Vec<Task>,
    index: HashMap<TaskId, TaskPath>,
}

impl Forest {
    /// Build a forest from loaded roots.
    ///
    /// # Postcondition
    /// Every id is unique; duplicates after the first occurrence get fresh ids.
    pub fn from_roots(roots: Vec<Task>) -> Self {
        let mut forest = Self {
            roots,
            index: HashMap::new(),
        };

        let mut seen = HashSet::new();
        let duplicates: Vec<TaskPath> = forest
            .walk()
            .filter(|(_, task)| !seen.insert(task.id()))
            .map(|(path, _)| path)
            .collect();
        for path in duplicates {
            if let Some(task) = forest.get_mut(&path) {
                let old = task.id();
                let new = task.reassign_id();
                tracing::warn!(path = %path, %old, %new, "Duplicate task id in store, reassigned");
            }
        }

        forest.rebuild_index();
        forest
    }

    pub fn roots(&self) -> &[Task] {
        &self.roots
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order, depth-first iteration over every node.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            stack: self.roots.iter().rev().collect(),
        }
    }

    /// Pre-order iteration yielding each node with its current path.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self
                .roots
                .iter()
                .enumerate()
                .rev()
                .map(|(i, task)| (TaskPath::root(i), task))
                .collect(),
        }
    }

    /// Current path of a node, if it exists.
    pub fn locate(&self, node: &NodeRef) -> Option<TaskPath> {
        match node {
            NodeRef::Path(path) => self.get(path).map(|_| path.clone()),
            NodeRef::Id(id) => self.index.get(id).cloned(),
        }
    }

    pub fn resolve(&self, node: &NodeRef) -> Result<&Task, StoreError> {
        self.locate(node)
            .and_then(|path| self.get(&path))
            .ok_or_else(|| StoreError::NotFound(node.clone()))
    }

    pub fn get(&self, path: &TaskPath) -> Option<&Task> {
        let (first, rest) = path.indices().split_first()?;
        let mut task = self.roots.get(*first)?;
        for &index in rest {
            task = task.subtasks().get(index)?;
        }
        Some(task)
    }

    fn get_mut(&mut self, path: &TaskPath) -> Option<&mut Task> {
        let (first, rest) = path.indices().split_first()?;
        let mut task = self.roots.get_mut(*first)?;
        for &index in rest {
            task = task.subtasks_mut().get_mut(index)?;
        }
        Some(task)
    }

    fn resolve_mut(&mut self, node: &NodeRef) -> Result<&mut Task, StoreError> {
        let path = self
            .locate(node)
            .ok_or_else(|| StoreError::NotFound(node.clone()))?;
        self.get_mut(&path)
            .ok_or_else(|| StoreError::NotFound(node.clone()))
    }

    /// Append a root-level task.
    pub fn push_root(&mut self, task: Task) -> TaskPath {
        let path = TaskPath::root(self.roots.len());
        self.index_subtree(&path, &task);
        self.roots.push(task);
        path
    }

    /// Append `task` as the last subtask of `parent`.
    pub fn push_child(&mut self, parent: &NodeRef, task: Task) -> Result<TaskPath, StoreError> {
        let parent_path = self
            .locate(parent)
            .ok_or_else(|| StoreError::NotFound(parent.clone()))?;
        let siblings = self
            .get_mut(&parent_path)
            .ok_or_else(|| StoreError::NotFound(parent.clone()))?
            .subtasks_mut();
        let path = parent_path.child(siblings.len());
        let entries = subtree_paths(&path, &task);
        siblings.push(task);
        self.index.extend(entries);
        Ok(path)
    }

    pub fn edit_text(&mut self, node: &NodeRef, text: String) -> Result<(), StoreError> {
        self.resolve_mut(node)?.set_text(text)?;
        Ok(())
    }

    pub fn toggle_status(&mut self, node: &NodeRef) -> Result<&Task, StoreError> {
        let task = self.resolve_mut(node)?;
        task.toggle_status();
        Ok(task)
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, node: &NodeRef) -> Result<Task, StoreError> {
        let path = self
            .locate(node)
            .ok_or_else(|| StoreError::NotFound(node.clone()))?;
        let siblings = match path.parent() {
            None => &mut self.roots,
            Some(parent) => self
                .get_mut(&parent)
                .ok_or_else(|| StoreError::NotFound(node.clone()))?
                .subtasks_mut(),
        };
        if path.last() >= siblings.len() {
            return Err(StoreError::NotFound(node.clone()));
        }
        let removed = siblings.remove(path.last());
        self.rebuild_index();
        Ok(removed)
    }

    pub fn count_by_status(&self) -> StatusCounts {
        self.iter()
            .fold(StatusCounts::default(), |mut counts, task| {
                match task.status() {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::Completed => counts.completed += 1,
                }
                counts
            })
    }

    fn index_subtree(&mut self, path: &TaskPath, task: &Task) {
        self.index.extend(subtree_paths(path, task));
    }

    fn rebuild_index(&mut self) {
        let index = self.walk().map(|(path, task)| (task.id(), path)).collect();
        self.index = index;
    }
}

fn subtree_paths(path: &TaskPath, task: &Task) -> Vec<(TaskId, TaskPath)> {
    let mut out = Vec::new();
    let mut stack = vec![(path.clone(), task)];
    while let Some((path, task)) = stack.pop() {
        for (i, child) in task.subtasks().iter().enumerate() {
            stack.push((path.child(i), child));
        }
        out.push((task.id(), path));
    }
    out
}

/// Pre-order iterator over tasks.
pub struct PreOrder<'a> {
    stack: Vec<&'a Task>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        let task = self.stack.pop()?;
        self.stack.extend(task.subtasks().iter().rev());
        Some(task)
    }
}

/// Pre-order iterator over `(path, task)` pairs.
pub struct Walk<'a> {
    stack: Vec<(TaskPath, &'a Task)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (TaskPath, &'a Task);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, task) = self.stack.pop()?;
        for (i, child) in task.subtasks().iter().enumerate().rev() {
            self.stack.push((path.child(i), child));
        }
        Some((path, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(text: &str) -> Task {
        Task::new(text, None, Utc::now()).unwrap()
    }

    /// a
    /// ├── a0
    /// │   └── a00
    /// └── a1
    /// b
    fn sample() -> Forest {
        let mut forest = Forest::default();
        let a = forest.push_root(task("a"));
        let a0 = forest.push_child(&a.clone().into(), task("a0")).unwrap();
        forest.push_child(&a0.into(), task("a00")).unwrap();
        forest.push_child(&a.into(), task("a1")).unwrap();
        forest.push_root(task("b"));
        forest
    }

    fn path(s: &str) -> NodeRef {
        NodeRef::Path(s.parse().unwrap())
    }

    #[test]
    fn pre_order_visits_parent_before_children() {
        let forest = sample();
        let texts: Vec<_> = forest.iter().map(|t| t.text().to_string()).collect();
        assert_eq!(texts, vec!["a", "a0", "a00", "a1", "b"]);

        let paths: Vec<_> = forest.walk().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["0", "0.0", "0.0.0", "0.1", "1"]);
        assert_eq!(forest.len(), 5);
    }

    #[test]
    fn out_of_range_is_not_found() {
        let forest = sample();
        assert!(matches!(forest.resolve(&path("2")), Err(StoreError::NotFound(_))));
        assert!(matches!(forest.resolve(&path("0.5")), Err(StoreError::NotFound(_))));
        assert!(matches!(forest.resolve(&path("1.0")), Err(StoreError::NotFound(_))));
        assert!(matches!(
            forest.resolve(&NodeRef::Id(TaskId::new())),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn remove_drops_subtree_and_reindexes_siblings() {
        let mut forest = sample();
        let a00 = forest.resolve(&path("0.0.0")).unwrap().id();
        let a1 = forest.resolve(&path("0.1")).unwrap().id();

        let removed = forest.remove(&path("0.0")).unwrap();
        assert_eq!(removed.text(), "a0");
        assert_eq!(forest.resolve(&path("0")).unwrap().subtasks().len(), 1);
        assert!(forest.resolve(&NodeRef::Id(a00)).is_err());
        assert_eq!(forest.len(), 3);

        // a1 shifted from 0.1 to 0.0; the id still finds it.
        assert_eq!(forest.locate(&NodeRef::Id(a1)), Some("0.0".parse().unwrap()));
        assert_eq!(forest.resolve(&NodeRef::Id(a1)).unwrap().text(), "a1");
    }

    #[test]
    fn counts_cover_every_depth() {
        let mut forest = sample();
        forest.toggle_status(&path("0.0.0")).unwrap();
        forest.toggle_status(&path("1")).unwrap();
        let counts = forest.count_by_status();
        assert_eq!(counts, StatusCounts { pending: 3, completed: 2 });
        assert_eq!(counts.total(), forest.len());
    }

    #[test]
    fn duplicate_ids_are_reassigned_on_load() {
        let original = task("x");
        let roots = vec![original.clone(), original.clone()];
        let forest = Forest::from_roots(roots);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.roots()[0].id(), original.id());
        assert_ne!(forest.roots()[1].id(), original.id());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut forest = Forest::default();
        let mut parent: NodeRef = forest.push_root(task("root")).into();
        for i in 0..500 {
            let child = forest.push_child(&parent, task(&format!("n{i}"))).unwrap();
            parent = child.into();
        }
        assert_eq!(forest.iter().count(), 501);
        assert_eq!(forest.count_by_status().pending, 501);
    }
}
