//! Environment tool: read-only view of the process environment.
//!
//! Values whose names look like credentials are redacted before they reach
//! the model.

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};

const NAME: &str = "env";

const SENSITIVE: &[&str] = &["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL"];
const REDACTED: &str = "[redacted]";

pub struct EnvTool {
    spec: ToolSpec,
}

impl EnvTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(NAME, "system", "Read environment variables")
            .tags(["system", "environment", "variables"])
            .schema(
                ParameterSchema::object()
                    .property(
                        "action",
                        PropertySchema::string("Operation to perform")
                            .with_enum(["get", "list"])
                            .with_default("list"),
                    )
                    .property("name", PropertySchema::string("Variable name (get)"))
                    .property(
                        "pattern",
                        PropertySchema::string("Case-insensitive name filter (list); '*' matches all"),
                    ),
            );
        Self { spec }
    }
}

impl Default for EnvTool {
    fn default() -> Self {
        Self::new()
    }
}

fn is_sensitive(name: &str) -> bool {
    let upper = name.to_uppercase();
    SENSITIVE.iter().any(|marker| upper.contains(marker))
}

fn shown(name: &str, value: String) -> String {
    if is_sensitive(name) { REDACTED.to_string() } else { value }
}

/// Matching variables sorted by name, values already redacted.
fn select<I>(vars: I, pattern: &str) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let needle = pattern.to_lowercase();
    let mut selected: Vec<_> = vars
        .into_iter()
        .filter(|(name, _)| needle.is_empty() || needle == "*" || name.to_lowercase().contains(&needle))
        .map(|(name, value)| {
            let value = shown(&name, value);
            (name, value)
        })
        .collect();
    selected.sort();
    selected
}

fn current_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
}

#[async_trait]
impl Tool for EnvTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let action = params.string_or("action", "list").map_err(|e| e.for_tool(NAME))?;
        match action.as_str() {
            "get" => {
                let name = params
                    .get_string("name")
                    .map_err(|_| ToolError::invalid_params(NAME, "name is required for get"))?;
                let result = match std::env::var_os(&name) {
                    Some(value) => {
                        let value = shown(&name, value.to_string_lossy().into_owned());
                        ToolResult::text(format!("{name}={value}")).meta("exists", true)
                    }
                    None => ToolResult::text(format!("{name} is not set")).meta("exists", false),
                };
                Ok(result.meta("name", name))
            }
            _ => {
                let pattern = params.string_or("pattern", "").map_err(|e| e.for_tool(NAME))?;
                let vars = select(current_vars(), &pattern);
                let mut text = format!("{} variables", vars.len());
                for (name, value) in &vars {
                    text.push_str(&format!("\n{name}={value}"));
                }
                Ok(ToolResult::text(text).meta("count", vars.len()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vec<(String, String)> {
        [("PATH", "/usr/bin"), ("OPENAI_API_KEY", "sk-123"), ("HOME", "/home/a"), ("GitHub_Token", "t")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pattern_is_case_insensitive_and_star_matches_all() {
        let names = |p: &str| select(vars(), p).into_iter().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(names("path"), ["PATH"]);
        assert_eq!(names("*").len(), 4);
        assert_eq!(names("").len(), 4);
        assert_eq!(names("*")[0], "GitHub_Token");
        assert!(names("nothing").is_empty());
    }

    #[test]
    fn credentials_are_redacted() {
        let selected = select(vars(), "*");
        let value = |name: &str| selected.iter().find(|(n, _)| n == name).unwrap().1.clone();
        assert_eq!(value("OPENAI_API_KEY"), REDACTED);
        assert_eq!(value("GitHub_Token"), REDACTED);
        assert_eq!(value("HOME"), "/home/a");
    }

    #[tokio::test]
    async fn get_reports_unset_variables() {
        let params = Parameters::new()
            .with("action", "get")
            .with("name", "NANOCODE_TEST_SURELY_UNSET_VARIABLE");
        let result = EnvTool::new().execute(&ToolContext::default(), &params).await.unwrap();
        assert!(result.success());
        assert_eq!(result.metadata["exists"], false);
        assert!(result.output.ends_with("is not set"));
    }

    #[tokio::test]
    async fn get_requires_a_name_and_list_counts() {
        let tool = EnvTool::new();
        let err = tool
            .execute(&ToolContext::default(), &Parameters::new().with("action", "get"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");

        let result = tool.execute(&ToolContext::default(), &Parameters::new()).await.unwrap();
        assert_eq!(result.metadata["count"], std::env::vars_os().count());
        assert!(!tool.info().requires_permission);
    }
}
