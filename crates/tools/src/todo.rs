//! Todo tool: lets the model track multi-step work in the session store.

use std::sync::Arc;

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use nanocode_session::{StoreError, TodoItem, TodoManager, TodoPriority, TodoStatus, TodoUpdate};

const NAME: &str = "todo";

pub struct TodoTool {
    spec: ToolSpec,
    todos: Arc<TodoManager>,
}

impl TodoTool {
    pub fn new(todos: Arc<TodoManager>) -> Self {
        let spec = ToolSpec::new(NAME, "development", "Manage the session todo list to track multi-step work")
            .tags(["todo", "task", "planning"])
            .schema(
                ParameterSchema::object()
                    .property(
                        "action",
                        PropertySchema::string("Operation to perform")
                            .with_enum(["list", "add", "update", "delete", "clear"]),
                    )
                    .property("content", PropertySchema::string("Todo text (add, update)"))
                    .property("id", PropertySchema::string("Todo id (update, delete)"))
                    .property(
                        "status",
                        PropertySchema::string("New status (update)").with_enum(TodoStatus::ALL),
                    )
                    .property(
                        "priority",
                        PropertySchema::string("Priority (add, update)").with_enum(TodoPriority::ALL),
                    )
                    .required(["action"]),
            );
        Self { spec, todos }
    }
}

fn store_error(e: StoreError) -> ToolError {
    match e {
        StoreError::EmptyContent | StoreError::InvalidValue { .. } => ToolError::invalid_params(NAME, e.to_string()),
        other => ToolError::execution_failed(NAME, other.to_string()),
    }
}

fn marker(status: TodoStatus) -> &'static str {
    match status {
        TodoStatus::Pending => "[ ]",
        TodoStatus::InProgress => "[~]",
        TodoStatus::Completed => "[x]",
    }
}

fn render_list(items: &[TodoItem], todos: &TodoManager) -> String {
    if items.is_empty() {
        return "No todos".to_string();
    }
    let counts = todos.counts();
    let mut out = format!(
        "Todos ({} total: {} pending, {} in progress, {} completed)",
        items.len(),
        counts.pending,
        counts.in_progress,
        counts.completed
    );
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} {} (id: {}, priority: {})",
            i + 1,
            marker(item.status),
            item.content,
            item.id,
            item.priority
        ));
    }
    out
}

fn item_data(item: &TodoItem) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(item).map_err(|e| ToolError::internal(NAME, e.to_string()))
}

#[async_trait]
impl Tool for TodoTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let action = params.get_string("action").map_err(|e| e.for_tool(NAME))?;
        let priority = params
            .opt_string("priority")
            .map_err(|e| e.for_tool(NAME))?
            .map(|p| p.parse::<TodoPriority>())
            .transpose()
            .map_err(store_error)?;
        let status = params
            .opt_string("status")
            .map_err(|e| e.for_tool(NAME))?
            .map(|s| s.parse::<TodoStatus>())
            .transpose()
            .map_err(store_error)?;

        match action.as_str() {
            "list" => {
                let items = self.todos.list();
                let data = serde_json::to_value(&items).map_err(|e| ToolError::internal(NAME, e.to_string()))?;
                Ok(ToolResult::with_data(render_list(&items, &self.todos), data).meta("count", items.len()))
            }
            "add" => {
                let content = params.get_string("content").map_err(|e| e.for_tool(NAME))?;
                let item = self
                    .todos
                    .add(&content, priority.unwrap_or(TodoPriority::Medium))
                    .map_err(store_error)?;
                Ok(ToolResult::with_data(
                    format!("Added todo {}: {} ({})", item.id, item.content, item.priority),
                    item_data(&item)?,
                ))
            }
            "update" => {
                let id = params.get_string("id").map_err(|e| e.for_tool(NAME))?;
                let update = TodoUpdate {
                    content: params.opt_string("content").map_err(|e| e.for_tool(NAME))?,
                    status,
                    priority,
                };
                if update.is_empty() {
                    return Err(ToolError::invalid_params(
                        NAME,
                        "update needs at least one of content, status, priority",
                    ));
                }
                let item = self.todos.update(&id, update).map_err(store_error)?;
                Ok(ToolResult::with_data(
                    format!("Updated todo {}: {} {}", item.id, marker(item.status), item.content),
                    item_data(&item)?,
                ))
            }
            "delete" => {
                let id = params.get_string("id").map_err(|e| e.for_tool(NAME))?;
                let item = self.todos.delete(&id).map_err(store_error)?;
                Ok(ToolResult::text(format!("Deleted todo {}: {}", item.id, item.content)))
            }
            "clear" => {
                let removed = self.todos.clear().map_err(store_error)?;
                Ok(ToolResult::text(format!("Cleared {removed} todos")).meta("removed", removed))
            }
            other => Err(ToolError::invalid_params(NAME, format!("unknown action: {other}"))),
        }
    }
}
