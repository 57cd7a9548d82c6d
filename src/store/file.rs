//! JSON file persistence for the task forest.
//!
//! The file holds a pretty-printed array of task records. Writes go to a
//! sibling `.tmp` file first and are renamed over the target, so a reader
//! never sees a half-written file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::task::Task;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize task store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read the task records at `path`. A missing file is `Ok(None)`.
pub(crate) async fn load(path: &Path) -> Result<Option<Vec<Task>>, PersistenceError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&bytes).map(Some).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode task records of any nesting depth. serde_json's recursion limit
/// is lifted and `serde_stacker` grows the stack on demand instead.
fn parse(bytes: &[u8]) -> Result<Vec<Task>, serde_json::Error> {
    let mut json = serde_json::Deserializer::from_slice(bytes);
    json.disable_recursion_limit();
    let roots = Vec::<Task>::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(roots)
}

/// Replace the contents of `path` with `roots`.
pub(crate) async fn save(path: &Path, roots: &[Task]) -> Result<(), PersistenceError> {
    let data = serde_json::to_vec_pretty(roots).map_err(PersistenceError::Serialize)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp_path = with_suffix(path, ".tmp");
    fs::write(&tmp_path, data)
        .await
        .map_err(|source| PersistenceError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!("Saved task store to {}", path.display());
    Ok(())
}

/// Keep a copy of an unreadable store file next to it before it gets overwritten.
pub(crate) async fn quarantine(path: &Path) -> Option<PathBuf> {
    let backup = with_suffix(path, ".corrupt");
    match fs::copy(path, &backup).await {
        Ok(_) => Some(backup),
        Err(e) => {
            tracing::warn!(
                "Failed to back up unreadable store {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn missing_file_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load(&temp.path().join("tasks.json")).await.expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_replaces_contents_and_leaves_no_tmp() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("tasks.json");
        let task = Task::new("persist me", None, Utc::now()).unwrap();

        save(&path, &[task.clone()]).await.expect("first save");
        save(&path, &[task.clone(), task.clone()]).await.expect("second save");

        let loaded = load(&path).await.expect("load").expect("present");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], task);
        assert!(!with_suffix(&path, ".tmp").exists());

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"text\": \"persist me\""));
        assert!(raw.contains("\"status\": \"pending\""));
        assert!(!raw.contains("\"deadline\""));
    }

    fn nested_chain(depth: usize) -> Task {
        let now = Utc::now();
        let mut task = Task::new(format!("level {}", depth), None, now).unwrap();
        for level in (0..depth).rev() {
            let mut parent = Task::new(format!("level {}", level), None, now).unwrap();
            parent.subtasks_mut().push(task);
            task = parent;
        }
        task
    }

    #[tokio::test]
    async fn nesting_past_serde_json_default_limit_loads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.json");
        save(&path, &[nested_chain(200)]).await.expect("save");

        let loaded = load(&path).await.expect("load").expect("present");
        let mut depth = 0;
        let mut node = &loaded[0];
        while let Some(child) = node.subtasks().first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, 200);
        assert_eq!(node.text(), "level 200");
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse(b"[] []").is_err());
        assert!(parse(b" [] ").expect("whitespace is fine").is_empty());
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tasks.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            load(&path).await,
            Err(PersistenceError::Parse { .. })
        ));
        let backup = quarantine(&path).await.expect("backup");
        assert_eq!(
            std::fs::read_to_string(backup).expect("read backup"),
            "{not json"
        );
    }
}
