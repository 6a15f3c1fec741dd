//! Persistence backends for the todo list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::todo::TodoItem;

/// Snapshot of the whole list, keyed by item id.
pub type TodoMap = BTreeMap<String, TodoItem>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Corrupt todo document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Todo content cannot be empty")]
    EmptyContent,

    #[error("Todo not found: {0}")]
    NotFound(String),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Where the todo list is kept between mutations.
pub trait TodoStorage: Send + Sync {
    fn load(&self) -> Result<TodoMap, StoreError>;
    fn save(&self, items: &TodoMap) -> Result<(), StoreError>;
}

/// A JSON document on disk. Readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default path: `~/.nanocode/session_todos.json`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".nanocode").join("session_todos.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(path: &Path, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

impl TodoStorage for FileStorage {
    fn load(&self) -> Result<TodoMap, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TodoMap::new()),
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(TodoMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, items: &TodoMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }

        let body = serde_json::to_string_pretty(items).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let tmp = self.temp_path();
        std::fs::write(&tmp, body).map_err(|e| Self::io_error(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(Self::io_error(&self.path, e));
        }

        debug!(path = %self.path.display(), count = items.len(), "Todo list saved");
        Ok(())
    }
}

/// Keeps cloned snapshots in process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<TodoMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TodoStorage for MemoryStorage {
    fn load(&self) -> Result<TodoMap, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, items: &TodoMap) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = items.clone();
        Ok(())
    }
}
