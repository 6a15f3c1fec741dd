//! Directory listing tool.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const NAME: &str = "list";
const DEFAULT_MAX_DEPTH: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the listed directory.
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Name,
    Size,
    Time,
}

struct ListOptions {
    recursive: bool,
    show_hidden: bool,
    max_depth: usize,
    sort_by: SortKey,
    reverse: bool,
}

pub(crate) fn format_size(size: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("TB", 1 << 40),
        ("GB", 1 << 30),
        ("MB", 1 << 20),
        ("KB", 1 << 10),
    ];
    for (unit, scale) in UNITS {
        if size >= scale {
            return format!("{:.2} {unit}", size as f64 / scale as f64);
        }
    }
    format!("{size} B")
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

fn walk(
    root: &Path,
    opts: &ListOptions,
    cancel: &CancellationToken,
) -> Result<Vec<FileEntry>, ToolError> {
    let depth = if opts.recursive { opts.max_depth.max(1) } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || opts.show_hidden || !is_hidden(&e.file_name().to_string_lossy())
        });

    let mut entries = Vec::new();
    for entry in walker.filter_map(|e| e.ok()) {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled { tool: NAME.into() });
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: relative.to_string_lossy().replace('\\', "/"),
            size: if meta.is_dir() { 0 } else { meta.len() },
            is_dir: meta.is_dir(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    entries.sort_by(|a, b| {
        let ord = match opts.sort_by {
            SortKey::Name => a.path.cmp(&b.path),
            SortKey::Size => a.size.cmp(&b.size).then_with(|| a.path.cmp(&b.path)),
            SortKey::Time => a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)),
        };
        if opts.reverse { ord.reverse() } else { ord }
    });
    Ok(entries)
}

pub struct ListTool {
    spec: ToolSpec,
}

impl ListTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(NAME, "file", "List directory contents with sizes")
            .tags(["file", "list", "ls", "dir"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("Directory path to list").with_default("."))
                    .property(
                        "recursive",
                        PropertySchema::boolean("List subdirectories too").with_default(false),
                    )
                    .property(
                        "show_hidden",
                        PropertySchema::boolean("Include entries starting with '.'").with_default(false),
                    )
                    .property(
                        "sort_by",
                        PropertySchema::string("Sort key")
                            .with_enum(["name", "size", "time"])
                            .with_default("name"),
                    )
                    .property("reverse", PropertySchema::boolean("Reverse sort order").with_default(false))
                    .property(
                        "max_depth",
                        PropertySchema::integer("Maximum depth when recursive").with_default(DEFAULT_MAX_DEPTH),
                    ),
            );
        Self { spec }
    }
}

impl Default for ListTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.string_or("path", ".").map_err(|e| e.for_tool(NAME))?;
        let opts = ListOptions {
            recursive: params.bool_or("recursive", false).map_err(|e| e.for_tool(NAME))?,
            show_hidden: params.bool_or("show_hidden", false).map_err(|e| e.for_tool(NAME))?,
            max_depth: params
                .int_or("max_depth", DEFAULT_MAX_DEPTH)
                .map_err(|e| e.for_tool(NAME))?
                .max(1) as usize,
            sort_by: match params.string_or("sort_by", "name").map_err(|e| e.for_tool(NAME))?.as_str() {
                "size" => SortKey::Size,
                "time" => SortKey::Time,
                _ => SortKey::Name,
            },
            reverse: params.bool_or("reverse", false).map_err(|e| e.for_tool(NAME))?,
        };

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolError::execution_failed(NAME, format!("failed to stat {path}: {e}")))?;
        if !meta.is_dir() {
            return Ok(ToolResult::text(format!(
                "File info: {path} (size: {})",
                format_size(meta.len())
            ))
            .meta("path", path)
            .meta("total_files", 1)
            .meta("total_dirs", 0)
            .meta("total_size", meta.len()));
        }

        let root = path.clone();
        let cancel = ctx.cancellation.clone();
        let entries = tokio::task::spawn_blocking(move || walk(Path::new(&root), &opts, &cancel))
            .await
            .map_err(|e| ToolError::internal(NAME, format!("listing aborted: {e}")))??;

        let dirs = entries.iter().filter(|e| e.is_dir).count();
        let files = entries.len() - dirs;
        let total: u64 = entries.iter().map(|e| e.size).sum();

        let mut output = format!(
            "Listed {files} files and {dirs} directories in {path} (total size: {})",
            format_size(total)
        );
        for entry in &entries {
            if entry.is_dir {
                output.push_str(&format!("\n{}/", entry.path));
            } else {
                output.push_str(&format!("\n{} ({})", entry.path, format_size(entry.size)));
            }
        }

        let data = serde_json::to_value(&entries).map_err(|e| ToolError::internal(NAME, e.to_string()))?;
        Ok(ToolResult::with_data(output, data)
            .meta("path", path)
            .meta("total_files", files)
            .meta("total_dirs", dirs)
            .meta("total_size", total))
    }
}
