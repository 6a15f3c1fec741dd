//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! read and write files, run shell commands, track tasks. Each tool
//! describes itself through a [`ToolSpec`] and is invoked with validated
//! [`Parameters`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ParamError, ToolError};
use crate::params::Parameters;
use crate::provider::ToolDefinition;
use crate::result::ToolResult;
use crate::schema::ParameterSchema;

/// A completed tool invocation reconstructed from streamed deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID
    pub id: String,

    /// Name (or alias) of the tool to execute
    pub name: String,

    /// Raw JSON argument text, decoded once when the call is dispatched
    pub arguments: String,
}

impl ToolCall {
    pub fn parse_arguments(&self) -> Result<Parameters, ParamError> {
        Parameters::from_json_str(&self.arguments)
    }
}

/// Descriptive metadata of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub category: String,
    pub description: String,
    pub requires_permission: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Identity and schema of a tool, embedded by each implementation.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub info: ToolInfo,
    pub schema: ParameterSchema,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            info: ToolInfo {
                name: name.into(),
                category: category.into(),
                description: description.into(),
                requires_permission: false,
                tags: Vec::new(),
            },
            schema: ParameterSchema::object(),
        }
    }

    pub fn requires_permission(mut self, required: bool) -> Self {
        self.info.requires_permission = required;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// Per-execution context handed to tools.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Cancelled when the governing run is aborted. Long-running tools
    /// observe it and stop at their own boundary.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// The core Tool trait.
///
/// Implementations are registered in the [`ToolRegistry`](crate::registry::ToolRegistry)
/// and invoked by the agent loop or by pipelines. `execute` only ever sees
/// parameters that already passed `schema()` validation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    async fn execute(&self, ctx: &ToolContext, params: &Parameters)
    -> Result<ToolResult, ToolError>;

    fn info(&self) -> &ToolInfo {
        &self.spec().info
    }

    fn schema(&self) -> &ParameterSchema {
        &self.spec().schema
    }

    fn name(&self) -> &str {
        &self.spec().info.name
    }

    /// Policy checks that reject a call outright, before the operator is
    /// asked to approve it.
    fn screen(&self, _params: &Parameters) -> Result<(), ToolError> {
        Ok(())
    }

    /// Human-readable description of what this call is about to do,
    /// shown by the permission gate.
    fn permission_description(&self, params: &Parameters) -> String {
        if let Ok(command) = params.get_string("command") {
            format!("Execute command: {command}")
        } else if let Ok(path) = params.get_string("path") {
            format!("Write to file: {path}")
        } else {
            self.info().description.clone()
        }
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.info().description.clone(),
            parameters: self.schema().to_json(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::schema::PropertySchema;

    /// Echoes its `text` argument; fails when `fail` is true.
    pub struct EchoTool {
        spec: ToolSpec,
    }

    impl EchoTool {
        pub fn new(name: &str) -> Self {
            Self {
                spec: ToolSpec::new(name, "testing", "Echoes the input back")
                    .tags(["echo", "debug"])
                    .schema(
                        ParameterSchema::object()
                            .property("text", PropertySchema::string("Text to echo")),
                    ),
            }
        }

        pub fn with_spec(spec: ToolSpec) -> Self {
            Self { spec }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            params: &Parameters,
        ) -> Result<ToolResult, ToolError> {
            if params.bool_or("fail", false).map_err(|e| e.for_tool(self.name()))? {
                return Err(ToolError::execution_failed(self.name(), "asked to fail"));
            }
            let text = params.string_or("text", "").map_err(|e| e.for_tool(self.name()))?;
            let mut result = ToolResult::text(text.clone());
            if let Ok(prev) = params.get("_previous_result") {
                result = result.meta("previous", prev.clone());
            }
            Ok(result)
        }
    }
}
