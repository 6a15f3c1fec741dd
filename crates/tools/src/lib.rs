//! Built-in tool implementations for nanocode.
//!
//! Tools give the agent the ability to act on a working tree: read, write
//! and edit files, inspect binary files, list and search directories, run
//! shell commands (alone or as a pipeline), look up environment variables,
//! and keep a todo list for multi-step work.

pub mod env;
pub mod file_binary;
pub mod file_edit;
pub mod file_list;
pub mod file_read;
pub mod file_search;
pub mod file_write;
pub mod pipeline;
pub mod shell;
pub mod todo;

use std::sync::Arc;

use nanocode_core::error::RegistryError;
use nanocode_core::registry::ToolRegistry;
use nanocode_core::tool::Tool;
use nanocode_session::TodoManager;

pub use env::EnvTool;
pub use file_binary::ReadBinaryTool;
pub use file_edit::{EditTool, PatchTool};
pub use file_list::ListTool;
pub use file_read::FileReadTool;
pub use file_search::{GlobTool, SearchTool};
pub use file_write::FileWriteTool;
pub use pipeline::PipelineTool;
pub use shell::BashTool;
pub use todo::TodoTool;

/// Limits shared by the built-in tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolSettings {
    pub command_timeout_secs: u64,
    pub max_read_bytes: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 300,
            max_read_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Build a registry holding every built-in tool under its canonical name
/// and short aliases.
pub fn default_registry(
    settings: &ToolSettings,
    todos: Arc<TodoManager>,
) -> Result<ToolRegistry, RegistryError> {
    let registry = ToolRegistry::new();
    let bash: Arc<dyn Tool> = Arc::new(BashTool::new(settings.command_timeout_secs));

    registry.register(Arc::new(FileReadTool::new(settings.max_read_bytes)), &["r", "cat"])?;
    registry.register(Arc::new(ReadBinaryTool::new(settings.max_read_bytes)), &["rb", "hexdump"])?;
    registry.register(Arc::new(FileWriteTool::new()), &["w"])?;
    registry.register(Arc::new(EditTool::new()), &["e", "ed"])?;
    registry.register(Arc::new(PatchTool::new()), &[])?;
    registry.register(Arc::new(ListTool::new()), &["ls", "dir"])?;
    registry.register(Arc::new(SearchTool::new()), &["grep", "find", "s"])?;
    registry.register(Arc::new(GlobTool::new()), &["g"])?;
    registry.register(Arc::clone(&bash), &["sh", "shell", "cmd"])?;
    registry.register(Arc::new(PipelineTool::new(bash)), &["pipe"])?;
    registry.register(Arc::new(EnvTool::new()), &["environment"])?;
    registry.register(Arc::new(TodoTool::new(todos)), &["todos", "task", "t"])?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        default_registry(&ToolSettings::default(), Arc::new(TodoManager::in_memory())).unwrap()
    }

    #[test]
    fn registers_all_builtins() {
        let registry = registry();
        assert_eq!(registry.len(), 12);
        for name in [
            "read", "read_binary", "write", "edit", "patch", "list", "search", "glob", "bash", "pipeline",
            "env", "todo",
        ] {
            assert!(registry.has(name), "missing {name}");
        }
    }

    #[test]
    fn aliases_resolve_to_canonical_tools() {
        let registry = registry();
        assert_eq!(registry.get("cat").unwrap().name(), "read");
        assert_eq!(registry.get("ls").unwrap().name(), "list");
        assert_eq!(registry.get("grep").unwrap().name(), "search");
        assert_eq!(registry.get("sh").unwrap().name(), "bash");
        assert_eq!(registry.get("t").unwrap().name(), "todo");
        assert_eq!(registry.get("rb").unwrap().name(), "read_binary");
        assert_eq!(registry.get("environment").unwrap().name(), "env");
        assert_eq!(registry.resolve_alias("pipe").as_deref(), Some("pipeline"));
    }

    #[test]
    fn mutating_tools_require_permission() {
        let registry = registry();
        for name in ["write", "edit", "patch", "bash", "pipeline"] {
            assert!(registry.get(name).unwrap().info().requires_permission, "{name}");
        }
        for name in ["read", "read_binary", "list", "search", "glob", "env", "todo"] {
            assert!(!registry.get(name).unwrap().info().requires_permission, "{name}");
        }
    }

    #[test]
    fn definitions_carry_object_schemas() {
        let definitions = registry().definitions();
        assert_eq!(definitions.len(), 12);
        assert!(definitions.iter().all(|d| d.parameters["type"] == "object"));
    }
}
