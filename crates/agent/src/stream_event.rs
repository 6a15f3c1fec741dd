//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream frames and tool activity
//! into the events a front end renders: text as it arrives, each call and
//! its result, and how the run ended.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// The agent is about to run a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool call finished, successfully or not.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The model answered without requesting tools.
    Done { rounds: u32, tool_calls_made: usize },

    /// The round budget ran out while the model still wanted tools.
    RoundLimit { max_rounds: u32, tool_calls_made: usize },
}

impl AgentStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::RoundLimit { .. } => "round_limit",
        }
    }
}
