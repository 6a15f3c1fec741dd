//! The uniform envelope returned by every tool.

use crate::error::ToolError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of one tool execution.
///
/// Success is derived from the absence of an error. Results are built once
/// and not mutated after being handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Human-readable output shown to the model.
    pub output: String,

    /// Structured payload, if the tool produces one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "error_message")]
    pub error: Option<ToolError>,

    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    /// A successful result whose data is its own output text.
    pub fn text(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            data: Some(Value::String(output.clone())),
            output,
            error: None,
            metadata: Map::new(),
        }
    }

    /// A successful result carrying structured data alongside its summary.
    pub fn with_data(output: impl Into<String>, data: Value) -> Self {
        Self {
            output: output.into(),
            data: Some(data),
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            output: String::new(),
            data: None,
            error: Some(error),
            metadata: Map::new(),
        }
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// The text fed back into the conversation.
    pub fn display(&self) -> String {
        match &self.error {
            Some(err) => format!("Error: {err}"),
            None => self.output.clone(),
        }
    }
}

impl From<Result<ToolResult, ToolError>> for ToolResult {
    fn from(outcome: Result<ToolResult, ToolError>) -> Self {
        outcome.unwrap_or_else(ToolResult::failure)
    }
}

fn error_message<S: serde::Serializer>(
    error: &Option<ToolError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}
