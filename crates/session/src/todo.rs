//! Todo items and the manager that owns them.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::storage::{MemoryStorage, StoreError, TodoMap, TodoStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub const ALL: [&'static str; 3] = ["pending", "in_progress", "completed"];

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::ALL[self.rank() as usize]
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(StoreError::InvalidValue {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

impl TodoPriority {
    pub const ALL: [&'static str; 3] = ["high", "medium", "low"];

    fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::ALL[self.rank() as usize]
    }
}

impl fmt::Display for TodoPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoPriority {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(StoreError::InvalidValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct TodoUpdate {
    pub content: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
}

impl TodoUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.status.is_none() && self.priority.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TodoCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// Owns the todo list and persists it after every mutation.
///
/// Mutations are applied to a copy, saved, and only then committed, so the
/// in-memory list never runs ahead of what storage accepted.
pub struct TodoManager {
    items: Mutex<TodoMap>,
    storage: Box<dyn TodoStorage>,
}

impl TodoManager {
    pub fn open(storage: Box<dyn TodoStorage>) -> Result<Self, StoreError> {
        let items = storage.load()?;
        Ok(Self {
            items: Mutex::new(items),
            storage,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            items: Mutex::new(TodoMap::new()),
            storage: Box::new(MemoryStorage::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TodoMap> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut TodoMap) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut items = self.lock();
        let mut draft = items.clone();
        let value = mutate(&mut draft)?;
        self.storage.save(&draft)?;
        *items = draft;
        Ok(value)
    }

    pub fn add(&self, content: &str, priority: TodoPriority) -> Result<TodoItem, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::EmptyContent);
        }
        let item = self.commit(|items| {
            let now = Utc::now();
            let item = TodoItem {
                id: fresh_id(items),
                content: content.to_string(),
                status: TodoStatus::Pending,
                priority,
                created_at: now,
                updated_at: now,
            };
            items.insert(item.id.clone(), item.clone());
            Ok(item)
        })?;
        info!(id = %item.id, priority = %item.priority, "Todo added");
        Ok(item)
    }

    pub fn update(&self, id: &str, update: TodoUpdate) -> Result<TodoItem, StoreError> {
        let content = match update.content.as_deref().map(str::trim) {
            Some("") => return Err(StoreError::EmptyContent),
            other => other.map(str::to_string),
        };
        self.commit(|items| {
            let item = items
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if let Some(content) = content {
                item.content = content;
            }
            if let Some(status) = update.status {
                item.status = status;
            }
            if let Some(priority) = update.priority {
                item.priority = priority;
            }
            item.updated_at = Utc::now();
            Ok(item.clone())
        })
    }

    pub fn delete(&self, id: &str) -> Result<TodoItem, StoreError> {
        self.commit(|items| {
            items
                .remove(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    pub fn get(&self, id: &str) -> Option<TodoItem> {
        self.lock().get(id).cloned()
    }

    /// All items: pending before in-progress before completed, then by
    /// priority, then oldest first.
    pub fn list(&self) -> Vec<TodoItem> {
        let mut items: Vec<TodoItem> = self.lock().values().cloned().collect();
        items.sort_by(|a, b| {
            (a.status.rank(), a.priority.rank(), a.created_at, &a.id).cmp(&(
                b.status.rank(),
                b.priority.rank(),
                b.created_at,
                &b.id,
            ))
        });
        items
    }

    pub fn list_by_status(&self, status: TodoStatus) -> Vec<TodoItem> {
        self.list().into_iter().filter(|i| i.status == status).collect()
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        self.commit(|items| {
            let removed = items.len();
            items.clear();
            Ok(removed)
        })
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn counts(&self) -> TodoCounts {
        let items = self.lock();
        let by = |s: TodoStatus| items.values().filter(|i| i.status == s).count();
        TodoCounts {
            pending: by(TodoStatus::Pending),
            in_progress: by(TodoStatus::InProgress),
            completed: by(TodoStatus::Completed),
        }
    }
}

fn fresh_id(items: &TodoMap) -> String {
    loop {
        let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        if !items.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStorage;

    #[test]
    fn add_trims_and_rejects_empty() {
        let todos = TodoManager::in_memory();
        let item = todos.add("  write tests  ", TodoPriority::High).unwrap();
        assert_eq!(item.content, "write tests");
        assert_eq!(item.status, TodoStatus::Pending);
        assert_eq!(item.id.len(), 8);
        assert!(matches!(todos.add("   ", TodoPriority::Low), Err(StoreError::EmptyContent)));
        assert_eq!(todos.count(), 1);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let todos = TodoManager::in_memory();
        let item = todos.add("refactor", TodoPriority::Low).unwrap();

        let updated = todos
            .update(
                &item.id,
                TodoUpdate {
                    status: Some(TodoStatus::InProgress),
                    ..TodoUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, TodoStatus::InProgress);
        assert_eq!(updated.content, "refactor");
        assert_eq!(updated.priority, TodoPriority::Low);
        assert!(updated.updated_at >= item.updated_at);

        assert!(matches!(
            todos.update("missing", TodoUpdate::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_orders_by_status_then_priority_then_age() {
        let todos = TodoManager::in_memory();
        let done = todos.add("done", TodoPriority::High).unwrap();
        todos.add("low", TodoPriority::Low).unwrap();
        todos.add("high", TodoPriority::High).unwrap();
        let working = todos.add("working", TodoPriority::Low).unwrap();

        todos
            .update(&done.id, TodoUpdate { status: Some(TodoStatus::Completed), ..Default::default() })
            .unwrap();
        todos
            .update(&working.id, TodoUpdate { status: Some(TodoStatus::InProgress), ..Default::default() })
            .unwrap();

        let order: Vec<String> = todos.list().into_iter().map(|i| i.content).collect();
        assert_eq!(order, vec!["high", "low", "working", "done"]);
        assert_eq!(todos.list_by_status(TodoStatus::Pending).len(), 2);
        assert_eq!(
            todos.counts(),
            TodoCounts { pending: 2, in_progress: 1, completed: 1 }
        );
    }

    #[test]
    fn delete_and_clear() {
        let todos = TodoManager::in_memory();
        let a = todos.add("a", TodoPriority::Medium).unwrap();
        todos.add("b", TodoPriority::Medium).unwrap();

        assert_eq!(todos.delete(&a.id).unwrap().content, "a");
        assert!(todos.get(&a.id).is_none());
        assert!(todos.delete(&a.id).is_err());
        assert_eq!(todos.clear().unwrap(), 1);
        assert_eq!(todos.count(), 0);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");

        let first = TodoManager::open(Box::new(FileStorage::new(&path))).unwrap();
        let item = first.add("survive restart", TodoPriority::High).unwrap();
        drop(first);

        let second = TodoManager::open(Box::new(FileStorage::new(&path))).unwrap();
        assert_eq!(second.get(&item.id).unwrap().content, "survive restart");
    }

    struct FailingStorage;

    impl TodoStorage for FailingStorage {
        fn load(&self) -> Result<TodoMap, StoreError> {
            Ok(TodoMap::new())
        }

        fn save(&self, _items: &TodoMap) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "/dev/full".into(),
                reason: "disk full".into(),
            })
        }
    }

    #[test]
    fn failed_save_leaves_list_unchanged() {
        let todos = TodoManager::open(Box::new(FailingStorage)).unwrap();
        assert!(todos.add("lost", TodoPriority::Medium).is_err());
        assert_eq!(todos.count(), 0);
    }

    #[test]
    fn parse_status_and_priority() {
        assert_eq!("in_progress".parse::<TodoStatus>().unwrap(), TodoStatus::InProgress);
        assert_eq!("low".parse::<TodoPriority>().unwrap(), TodoPriority::Low);
        assert!("urgent".parse::<TodoPriority>().is_err());
        assert_eq!(TodoStatus::Completed.to_string(), "completed");
    }
}
