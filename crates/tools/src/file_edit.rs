//! In-place file editing: find/replace operations and a line-level patcher.

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use regex::{NoExpand, Regex, RegexBuilder};
use serde::Deserialize;
use tracing::debug;

const EDIT: &str = "edit";
const PATCH: &str = "patch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum EditKind {
    Replace,
    RegexReplace,
    Insert,
    Delete,
}

fn yes() -> bool {
    true
}

fn replace_kind() -> EditKind {
    EditKind::Replace
}

/// One entry of the `operations` list.
#[derive(Debug, Clone, Deserialize)]
struct EditOperation {
    #[serde(rename = "type", default = "replace_kind")]
    kind: EditKind,
    #[serde(default)]
    find: String,
    #[serde(default)]
    replace: String,
    #[serde(default)]
    line: i64,
    #[serde(default = "yes")]
    all: bool,
    #[serde(default = "yes")]
    case_sensitive: bool,
}

impl EditOperation {
    fn check(&self) -> Result<(), String> {
        match self.kind {
            EditKind::Replace | EditKind::RegexReplace if self.find.is_empty() => {
                Err("replace operations require a non-empty 'find'".into())
            }
            EditKind::Insert | EditKind::Delete if self.line <= 0 => {
                Err("insert and delete operations require a positive 'line'".into())
            }
            _ => Ok(()),
        }
    }
}

fn compile(pattern: &str, case_sensitive: bool) -> Result<Regex, ToolError> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| ToolError::invalid_params(EDIT, format!("invalid regex: {e}")))
}

fn regex_apply(content: &str, re: &Regex, replace: &str, all: bool, expand: bool) -> (String, usize) {
    let found = re.find_iter(content).count();
    if found == 0 {
        return (content.to_string(), 0);
    }
    let limit = if all { 0 } else { 1 };
    let out = if expand {
        re.replacen(content, limit, replace)
    } else {
        re.replacen(content, limit, NoExpand(replace))
    };
    (out.into_owned(), if all { found } else { 1 })
}

/// Apply one operation to the file's lines, returning how many edits it made.
fn apply(lines: &mut Vec<String>, op: &EditOperation) -> Result<usize, ToolError> {
    match op.kind {
        EditKind::Replace | EditKind::RegexReplace => {
            let joined = lines.join("\n");
            let (out, count) = match (op.kind, op.case_sensitive) {
                (EditKind::Replace, true) => {
                    let found = joined.matches(op.find.as_str()).count();
                    if op.all {
                        (joined.replace(&op.find, &op.replace), found)
                    } else {
                        (joined.replacen(&op.find, &op.replace, 1), found.min(1))
                    }
                }
                (EditKind::Replace, false) => {
                    let re = compile(&regex::escape(&op.find), false)?;
                    regex_apply(&joined, &re, &op.replace, op.all, false)
                }
                _ => {
                    let re = compile(&op.find, op.case_sensitive)?;
                    regex_apply(&joined, &re, &op.replace, op.all, true)
                }
            };
            *lines = out.split('\n').map(str::to_string).collect();
            Ok(count)
        }
        EditKind::Insert => {
            let at = op.line as usize;
            if at > lines.len() + 1 {
                return Ok(0);
            }
            lines.insert(at - 1, op.replace.clone());
            Ok(1)
        }
        EditKind::Delete => {
            let at = op.line as usize;
            if at > lines.len() {
                return Ok(0);
            }
            lines.remove(at - 1);
            Ok(1)
        }
    }
}

async fn read_existing(tool: &str, path: &str) -> Result<String, ToolError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::execution_failed(tool, format!("file not found: {path}")))
        }
        Err(e) => Err(ToolError::execution_failed(tool, format!("failed to read file: {e}"))),
    }
}

/// Find/replace, regex replace, and line insert/delete.
pub struct EditTool {
    spec: ToolSpec,
}

impl EditTool {
    pub fn new() -> Self {
        let operation = PropertySchema::object(
            "{type: replace|regex_replace|insert|delete, find, replace, line, all (default true), case_sensitive (default true)}",
        );
        let spec = ToolSpec::new(EDIT, "file", "Edit file contents with find/replace and line operations")
            .requires_permission(true)
            .tags(["file", "edit", "modify", "replace"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("File path to edit").with_length(Some(1), None))
                    .property(
                        "operations",
                        PropertySchema::array_of("Edit operations, applied in order", operation),
                    )
                    .required(["path", "operations"]),
            );
        Self { spec }
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.get_string("path").map_err(|e| e.for_tool(EDIT))?;
        let raw_ops = params.get("operations").map_err(|e| e.for_tool(EDIT))?;
        let operations: Vec<EditOperation> = serde_json::from_value(raw_ops.clone())
            .map_err(|e| ToolError::invalid_params(EDIT, format!("invalid operations: {e}")))?;
        if operations.is_empty() {
            return Err(ToolError::invalid_params(EDIT, "at least one operation is required"));
        }
        for op in &operations {
            op.check().map_err(|m| ToolError::invalid_params(EDIT, m))?;
        }

        let content = read_existing(EDIT, &path).await?;
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        let original_lines = lines.len();

        let mut edits = 0;
        for op in &operations {
            edits += apply(&mut lines, op)?;
        }
        if edits == 0 {
            return Err(ToolError::execution_failed(
                EDIT,
                format!("no edits applied to {path}: nothing matched"),
            ));
        }

        tokio::fs::write(&path, lines.join("\n"))
            .await
            .map_err(|e| ToolError::execution_failed(EDIT, format!("failed to write file: {e}")))?;
        debug!(path = %path, edits, "File edited");

        Ok(ToolResult::text(format!("Successfully edited {path} ({edits} edits)"))
            .meta("path", path)
            .meta("edits", edits)
            .meta("original_lines", original_lines)
            .meta("new_lines", lines.len()))
    }
}

/// Best-effort line patcher.
///
/// Each `-old` line immediately followed by a `+new` line replaces the first
/// file line whose trimmed text equals the trimmed `old`. This is not a diff
/// engine: hunk headers and context lines are ignored.
pub struct PatchTool {
    spec: ToolSpec,
}

impl PatchTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(PATCH, "file", "Apply simple -old/+new line replacements to a file")
            .requires_permission(true)
            .tags(["file", "edit", "patch", "diff"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("File path to patch").with_length(Some(1), None))
                    .property("patch", PropertySchema::string("Lines of the form -old followed by +new"))
                    .property(
                        "reverse",
                        PropertySchema::boolean("Apply the patch in reverse").with_default(false),
                    )
                    .required(["path", "patch"]),
            );
        Self { spec }
    }
}

impl Default for PatchTool {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_line_patch(content: &str, patch: &str, reverse: bool) -> (String, usize) {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let patch_lines: Vec<&str> = patch.split('\n').collect();
    let mut applied = 0;

    let mut i = 0;
    while i < patch_lines.len() {
        let pair = patch_lines[i]
            .strip_prefix('-')
            .zip(patch_lines.get(i + 1).and_then(|next| next.strip_prefix('+')));
        let Some((old, new)) = pair else {
            i += 1;
            continue;
        };
        let (old, new) = if reverse { (new, old) } else { (old, new) };
        if let Some(line) = lines.iter_mut().find(|l| l.trim() == old.trim()) {
            *line = new.to_string();
            applied += 1;
        }
        i += 2;
    }

    (lines.join("\n"), applied)
}

#[async_trait]
impl Tool for PatchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.get_string("path").map_err(|e| e.for_tool(PATCH))?;
        let patch = params.get_string("patch").map_err(|e| e.for_tool(PATCH))?;
        let reverse = params.bool_or("reverse", false).map_err(|e| e.for_tool(PATCH))?;

        let content = read_existing(PATCH, &path).await?;
        let (patched, applied) = apply_line_patch(&content, &patch, reverse);
        if applied > 0 {
            tokio::fs::write(&path, patched)
                .await
                .map_err(|e| ToolError::execution_failed(PATCH, format!("failed to write file: {e}")))?;
        }
        debug!(path = %path, applied, reverse, "Patch applied");

        Ok(ToolResult::text(format!("Applied {applied} line replacements to {path}"))
            .meta("path", path)
            .meta("hunks_applied", applied)
            .meta("reverse", reverse))
    }
}
