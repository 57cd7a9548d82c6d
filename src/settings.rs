//! Presentation preferences storage.
//!
//! Persists a free-form key/value record to `{data_dir}/preferences.json`.
//! The core never interprets these values; the front-end owns their meaning.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Theme written into a fresh preferences file.
pub const DEFAULT_THEME: &str = "darkly";

pub type Preferences = BTreeMap<String, Value>;

/// In-memory store for preferences with disk persistence.
#[derive(Debug)]
pub struct PreferencesStore {
    preferences: RwLock<Preferences>,
    storage_path: PathBuf,
}

impl PreferencesStore {
    /// Create a new preferences store, loading from disk if available.
    ///
    /// Falls back to defaults when the file is missing or unreadable.
    pub async fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        let preferences = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(p) => {
                    tracing::info!("Loaded preferences from {}", storage_path.display());
                    p
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load preferences from {}: {}, using defaults",
                        storage_path.display(),
                        e
                    );
                    Self::defaults()
                }
            }
        } else {
            tracing::info!(
                "No preferences file found at {}, using defaults",
                storage_path.display()
            );
            Self::defaults()
        };

        Self {
            preferences: RwLock::new(preferences),
            storage_path,
        }
    }

    fn defaults() -> Preferences {
        let mut preferences = Preferences::new();
        preferences.insert("theme".to_string(), Value::String(DEFAULT_THEME.to_string()));
        preferences
    }

    fn load_from_path(path: &Path) -> Result<Preferences, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save current preferences to disk.
    pub async fn save(&self) -> Result<(), std::io::Error> {
        let preferences = self.preferences.read().await;

        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&*preferences)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.storage_path, contents)?;
        tracing::debug!("Saved preferences to {}", self.storage_path.display());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.preferences.read().await.get(key).cloned()
    }

    /// Get a clone of every preference.
    pub async fn all(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    /// Set a value and persist.
    ///
    /// Returns the previous value.
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, std::io::Error> {
        let mut preferences = self.preferences.write().await;
        let previous = preferences.insert(key.into(), value);
        drop(preferences); // Release lock before saving
        self.save().await?;
        Ok(previous)
    }
}

/// Shared preferences store wrapped in Arc for concurrent access.
pub type SharedPreferencesStore = Arc<PreferencesStore>;
