//! File write tool: create, overwrite, or append to files.
//!
//! Overwrite and create go through `<path>.tmp` and a rename, so a reader
//! never sees a half-written file. Append writes in place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const NAME: &str = "write";

pub struct FileWriteTool {
    spec: ToolSpec,
}

impl FileWriteTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(NAME, "file", "Write content to a file, creating it if needed")
            .requires_permission(true)
            .tags(["file", "write", "create"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("File path to write").with_length(Some(1), None))
                    .property("content", PropertySchema::string("Content to write"))
                    .property(
                        "mode",
                        PropertySchema::string("overwrite, append, or create (fails if the file exists)")
                            .with_enum(["overwrite", "append", "create"])
                            .with_default("overwrite"),
                    )
                    .property(
                        "create_dirs",
                        PropertySchema::boolean("Create missing parent directories").with_default(true),
                    )
                    .property(
                        "backup",
                        PropertySchema::boolean("Copy an existing file to <path>.backup first")
                            .with_default(false),
                    )
                    .required(["path", "content"]),
            );
        Self { spec }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn failed(e: impl std::fmt::Display) -> ToolError {
    ToolError::execution_failed(NAME, e.to_string())
}

async fn write_atomic(path: &Path, content: &str) -> Result<(), ToolError> {
    let tmp = sibling(path, ".tmp");
    if let Err(e) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(failed(format!("failed to write content: {e}")));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(failed(format!("failed to rename file: {e}")));
    }
    Ok(())
}

async fn append(path: &Path, content: &str) -> Result<(), ToolError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| failed(format!("failed to open file: {e}")))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| failed(format!("failed to append content: {e}")))?;
    file.flush().await.map_err(failed)
}

#[async_trait]
impl Tool for FileWriteTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let raw_path = params.get_string("path").map_err(|e| e.for_tool(NAME))?;
        let content = params.get_string("content").map_err(|e| e.for_tool(NAME))?;
        let mode = params.string_or("mode", "overwrite").map_err(|e| e.for_tool(NAME))?;
        let create_dirs = params.bool_or("create_dirs", true).map_err(|e| e.for_tool(NAME))?;
        let backup = params.bool_or("backup", false).map_err(|e| e.for_tool(NAME))?;
        let path = PathBuf::from(&raw_path);

        let exists = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => return Err(failed("path is a directory")),
            Ok(_) => true,
            Err(_) => false,
        };
        if mode == "create" && exists {
            return Err(failed(format!("file already exists: {raw_path}")));
        }

        if create_dirs
            && let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("failed to create directories: {e}")))?;
        }

        let backup_path = sibling(&path, ".backup");
        if backup && exists {
            tokio::fs::copy(&path, &backup_path)
                .await
                .map_err(|e| failed(format!("failed to create backup: {e}")))?;
        }

        match mode.as_str() {
            "append" => append(&path, &content).await?,
            _ => write_atomic(&path, &content).await?,
        }
        debug!(path = %raw_path, mode = %mode, bytes = content.len(), "File written");

        let file_size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        let mut result = ToolResult::text(format!(
            "Successfully wrote {} bytes to {raw_path}",
            content.len()
        ))
        .meta("path", raw_path)
        .meta("size", content.len())
        .meta("mode", mode)
        .meta("file_size", file_size);
        if backup && exists {
            result = result.meta("backup_path", backup_path.to_string_lossy().into_owned());
        }
        Ok(result)
    }
}
