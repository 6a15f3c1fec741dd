//! File read tool: read file contents, optionally a line range.

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use tracing::debug;

const NAME: &str = "read";

pub struct FileReadTool {
    spec: ToolSpec,
    max_bytes: u64,
}

impl FileReadTool {
    pub fn new(max_bytes: u64) -> Self {
        let spec = ToolSpec::new(NAME, "file", "Read file contents, optionally limited to a line range")
            .tags(["file", "read", "content"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("File path to read").with_length(Some(1), None))
                    .property(
                        "start_line",
                        PropertySchema::integer("First line to return (1-based, inclusive)"),
                    )
                    .property(
                        "end_line",
                        PropertySchema::integer("Last line to return (1-based, inclusive)"),
                    )
                    .property(
                        "max_size",
                        PropertySchema::integer("Maximum file size in bytes").with_default(max_bytes),
                    )
                    .required(["path"]),
            );
        Self { spec, max_bytes }
    }
}

/// Lines `start..=end` (1-based). Zero means "unbounded" on either side.
fn select_lines(content: &str, start: usize, end: usize) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(n, _)| (start == 0 || *n >= start) && (end == 0 || *n <= end))
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for FileReadTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.get_string("path").map_err(|e| e.for_tool(NAME))?;
        let start = params.int_or("start_line", 0).map_err(|e| e.for_tool(NAME))?.max(0) as usize;
        let end = params.int_or("end_line", 0).map_err(|e| e.for_tool(NAME))?.max(0) as usize;
        let max_size = params
            .int_or("max_size", self.max_bytes as i64)
            .map_err(|e| e.for_tool(NAME))?
            .max(0) as u64;

        if start > 0 && end > 0 && start > end {
            return Err(ToolError::invalid_params(
                NAME,
                format!("start_line {start} is after end_line {end}"),
            ));
        }

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::execution_failed(NAME, format!("file not found: {path}")));
            }
            Err(e) => return Err(ToolError::execution_failed(NAME, e.to_string())),
        };
        if meta.is_dir() {
            return Err(ToolError::execution_failed(NAME, format!("path is a directory: {path}")));
        }
        if meta.len() > max_size {
            return Err(ToolError::execution_failed(
                NAME,
                format!("file too large: {} bytes (max: {max_size} bytes)", meta.len()),
            ));
        }

        debug!(path = %path, size = meta.len(), "Reading file");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::execution_failed(NAME, format!("failed to read {path}: {e}")))?;
        let content = String::from_utf8_lossy(&bytes);
        let total_lines = content.lines().count();

        let ranged = start > 0 || end > 0;
        let output = if ranged {
            select_lines(&content, start, end)
        } else {
            content.into_owned()
        };

        let mut result = ToolResult::text(output)
            .meta("path", path)
            .meta("size", meta.len())
            .meta("lines", total_lines);
        if ranged {
            result = result.meta("start_line", start).meta("end_line", end);
        }
        Ok(result)
    }
}
