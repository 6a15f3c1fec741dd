//! Session task store for nanocode.
//!
//! The `todo` tool tracks multi-step work through a [`TodoManager`]. Items
//! live in memory and are persisted after every mutation by a
//! [`TodoStorage`] backend:
//! - [`FileStorage`]: a pretty-printed JSON document, replaced atomically
//!   via a temp file and rename
//! - [`MemoryStorage`]: snapshots kept in process, for tests and ephemeral runs

pub mod storage;
pub mod todo;

pub use storage::{FileStorage, MemoryStorage, StoreError, TodoStorage};
pub use todo::{TodoCounts, TodoItem, TodoManager, TodoPriority, TodoStatus, TodoUpdate};
