//! Content search (regex over files) and path globbing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

const SEARCH: &str = "search";
const GLOB: &str = "glob";

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_PROBE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub text: String,
}

struct SearchQuery {
    regex: Regex,
    file_pattern: glob::Pattern,
    recursive: bool,
    max_results: usize,
}

fn search_file(path: &Path, display: &str, query: &SearchQuery, matches: &mut Vec<SearchMatch>) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    if bytes[..bytes.len().min(BINARY_PROBE_BYTES)].contains(&0) {
        return false;
    }
    let text = String::from_utf8_lossy(&bytes);

    let before = matches.len();
    for (i, line) in text.lines().enumerate() {
        if matches.len() >= query.max_results {
            break;
        }
        if let Some(m) = query.regex.find(line) {
            matches.push(SearchMatch {
                file: display.to_string(),
                line: i + 1,
                column: m.start() + 1,
                text: line.to_string(),
            });
        }
    }
    matches.len() > before
}

fn run_search(
    root: &Path,
    query: &SearchQuery,
    cancel: &CancellationToken,
) -> Result<(Vec<SearchMatch>, usize), ToolError> {
    let mut matches = Vec::new();
    let mut files_with_matches = 0;

    if root.is_file() {
        if search_file(root, &root.to_string_lossy(), query, &mut matches) {
            files_with_matches = 1;
        }
        return Ok((matches, files_with_matches));
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if query.recursive { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker.filter_map(|e| e.ok()) {
        if matches.len() >= query.max_results {
            break;
        }
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled { tool: SEARCH.into() });
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if !query.file_pattern.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let display = entry.path().to_string_lossy().into_owned();
        if search_file(entry.path(), &display, query, &mut matches) {
            files_with_matches += 1;
        }
    }
    Ok((matches, files_with_matches))
}

/// Regex search over file contents.
pub struct SearchTool {
    spec: ToolSpec,
}

impl SearchTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(SEARCH, "file", "Search file contents with a regular expression")
            .tags(["file", "search", "grep", "find"])
            .schema(
                ParameterSchema::object()
                    .property("pattern", PropertySchema::string("Regex to search for").with_length(Some(1), None))
                    .property("path", PropertySchema::string("File or directory to search").with_default("."))
                    .property(
                        "file_pattern",
                        PropertySchema::string("File name glob, e.g. '*.rs'").with_default("*"),
                    )
                    .property(
                        "case_sensitive",
                        PropertySchema::boolean("Case sensitive matching").with_default(true),
                    )
                    .property(
                        "recursive",
                        PropertySchema::boolean("Descend into subdirectories").with_default(true),
                    )
                    .property(
                        "max_results",
                        PropertySchema::integer("Maximum number of matching lines").with_default(100),
                    )
                    .required(["pattern"]),
            );
        Self { spec }
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let pattern = params.get_string("pattern").map_err(|e| e.for_tool(SEARCH))?;
        let path = params.string_or("path", ".").map_err(|e| e.for_tool(SEARCH))?;
        let file_pattern = params.string_or("file_pattern", "*").map_err(|e| e.for_tool(SEARCH))?;
        let case_sensitive = params.bool_or("case_sensitive", true).map_err(|e| e.for_tool(SEARCH))?;

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ToolError::invalid_params(SEARCH, format!("invalid regex pattern: {e}")))?;
        let file_pattern = glob::Pattern::new(&file_pattern)
            .map_err(|e| ToolError::invalid_params(SEARCH, format!("invalid file_pattern: {e}")))?;
        let query = SearchQuery {
            regex,
            file_pattern,
            recursive: params.bool_or("recursive", true).map_err(|e| e.for_tool(SEARCH))?,
            max_results: params.int_or("max_results", 100).map_err(|e| e.for_tool(SEARCH))?.max(1) as usize,
        };

        if tokio::fs::metadata(&path).await.is_err() {
            return Err(ToolError::execution_failed(SEARCH, format!("path not found: {path}")));
        }

        let root = PathBuf::from(&path);
        let cancel = ctx.cancellation.clone();
        let (matches, files) = tokio::task::spawn_blocking(move || run_search(&root, &query, &cancel))
            .await
            .map_err(|e| ToolError::internal(SEARCH, format!("search aborted: {e}")))??;
        debug!(pattern = %pattern, matches = matches.len(), files, "Search finished");

        let mut output = format!("Found {} matches in {files} files", matches.len());
        for m in &matches {
            output.push_str(&format!("\n{}:{}: {}", m.file, m.line, m.text));
        }

        let total = matches.len();
        let data = serde_json::to_value(&matches).map_err(|e| ToolError::internal(SEARCH, e.to_string()))?;
        Ok(ToolResult::with_data(output, data)
            .meta("pattern", pattern)
            .meta("total_matches", total)
            .meta("files_with_matches", files))
    }
}

/// Paths matching a glob pattern under a base directory.
pub struct GlobTool {
    spec: ToolSpec,
}

impl GlobTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(GLOB, "file", "Find files matching a glob pattern such as 'src/**/*.rs'")
            .tags(["file", "glob", "find", "pattern"])
            .schema(
                ParameterSchema::object()
                    .property("pattern", PropertySchema::string("Glob pattern").with_length(Some(1), None))
                    .property("path", PropertySchema::string("Base directory").with_default("."))
                    .property(
                        "exclude",
                        PropertySchema::string_array("File name patterns to leave out"),
                    )
                    .property(
                        "include_dirs",
                        PropertySchema::boolean("Include directories in results").with_default(false),
                    )
                    .property(
                        "max_results",
                        PropertySchema::integer("Maximum number of paths").with_default(1000),
                    )
                    .required(["pattern"]),
            );
        Self { spec }
    }
}

impl Default for GlobTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let pattern = params.get_string("pattern").map_err(|e| e.for_tool(GLOB))?;
        let base = params.string_or("path", ".").map_err(|e| e.for_tool(GLOB))?;
        let include_dirs = params.bool_or("include_dirs", false).map_err(|e| e.for_tool(GLOB))?;
        let max_results = params.int_or("max_results", 1000).map_err(|e| e.for_tool(GLOB))?.max(1) as usize;
        let excludes = if params.has("exclude") {
            params.get_string_list("exclude").map_err(|e| e.for_tool(GLOB))?
        } else {
            Vec::new()
        };
        let excludes = excludes
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolError::invalid_params(GLOB, format!("invalid exclude pattern: {e}")))?;

        let base_path = PathBuf::from(&base);
        let full = base_path.join(&pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .map_err(|e| ToolError::invalid_params(GLOB, format!("invalid glob pattern: {e}")))?;

        let mut paths = Vec::new();
        let mut truncated = false;
        for entry in entries.filter_map(|e| e.ok()) {
            if ctx.is_cancelled() {
                return Err(ToolError::Cancelled { tool: GLOB.into() });
            }
            if !include_dirs && entry.is_dir() {
                continue;
            }
            let name = entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if excludes.iter().any(|p| p.matches(&name)) {
                continue;
            }
            if paths.len() >= max_results {
                truncated = true;
                break;
            }
            let relative = entry.strip_prefix(&base_path).unwrap_or(&entry);
            paths.push(relative.to_string_lossy().replace('\\', "/"));
        }

        paths.sort();

        let mut output = format!("Found {} paths matching {pattern}", paths.len());
        if truncated {
            output.push_str(&format!(" (truncated at {max_results})"));
        }
        for p in &paths {
            output.push('\n');
            output.push_str(p);
        }

        let count = paths.len();
        Ok(ToolResult::with_data(output, serde_json::json!(paths))
            .meta("pattern", pattern)
            .meta("count", count)
            .meta("truncated", truncated))
    }
}
