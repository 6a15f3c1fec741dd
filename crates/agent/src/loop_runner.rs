//! The agent reasoning loop implementation.

use std::sync::Arc;

use nanocode_core::error::ToolError;
use nanocode_core::message::{Conversation, Message};
use nanocode_core::params::Parameters;
use nanocode_core::permission::PermissionGate;
use nanocode_core::provider::{Provider, ProviderRequest};
use nanocode_core::registry::ToolRegistry;
use nanocode_core::result::ToolResult;
use nanocode_core::tool::{Tool, ToolCall, ToolContext};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::StreamAccumulator;
use crate::error::AgentError;
use crate::stream_event::AgentStreamEvent;

/// Receives events as the loop produces them.
pub type EventSink<'a> = &'a mut (dyn FnMut(AgentStreamEvent) + Send);

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// The model answered without requesting any tool.
    Done,
    /// The last permitted round still produced tool calls.
    RoundLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    /// Provider calls made.
    pub rounds: u32,
    pub tool_calls: usize,
}

/// Drives the conversation: stream a completion, run the requested tools,
/// feed their results back, repeat.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    gate: Arc<dyn PermissionGate>,
    max_rounds: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        gate: Arc<dyn PermissionGate>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            gate,
            max_rounds: 25,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Provider calls allowed per run. At least one.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Run until the model stops asking for tools, the round budget runs
    /// out, or `cancel` fires.
    ///
    /// The caller appends the user message first. Everything the loop
    /// appends stays in `conversation` even when the run fails.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        sink: EventSink<'_>,
    ) -> Result<LoopOutcome, AgentError> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            max_rounds = self.max_rounds,
            "Agent run started"
        );
        let definitions = self.tools.definitions();
        let ctx = ToolContext::new(cancel.clone());
        let mut tool_calls = 0;

        for round in 1..=self.max_rounds {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled { round });
            }
            debug!(round, "Agent round");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
                stream: true,
            };
            let calls = self
                .receive(round, request, conversation, cancel, &mut *sink)
                .await?;

            if calls.is_empty() {
                info!(round, tool_calls, "Agent run done");
                sink(AgentStreamEvent::Done {
                    rounds: round,
                    tool_calls_made: tool_calls,
                });
                return Ok(LoopOutcome {
                    status: LoopStatus::Done,
                    rounds: round,
                    tool_calls,
                });
            }

            tool_calls += calls.len();
            self.dispatch(round, &calls, conversation, &ctx, &mut *sink)
                .await?;
        }

        warn!(max_rounds = self.max_rounds, tool_calls, "Round limit reached with tool calls pending");
        sink(AgentStreamEvent::RoundLimit {
            max_rounds: self.max_rounds,
            tool_calls_made: tool_calls,
        });
        Ok(LoopOutcome {
            status: LoopStatus::RoundLimitExceeded,
            rounds: self.max_rounds,
            tool_calls,
        })
    }

    /// Stream one completion, forwarding text and collecting finished calls.
    /// Appends the assistant turn, or on cancellation whatever text arrived.
    async fn receive(
        &self,
        round: u32,
        request: ProviderRequest,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
        sink: EventSink<'_>,
    ) -> Result<Vec<ToolCall>, AgentError> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled { round }),
            opened = self.provider.stream(request) => opened?,
        };

        let mut acc = StreamAccumulator::new();
        let mut text = String::new();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(round, pending = acc.is_accumulating(), "Run cancelled mid-stream");
                    if !text.is_empty() {
                        conversation.push(Message::assistant(text));
                    }
                    return Err(AgentError::Cancelled { round });
                }
                frame = stream.recv() => frame,
            };
            let Some(frame) = frame else { break };
            let chunk = frame?;
            acc.push(&chunk, |t| {
                text.push_str(t);
                sink(AgentStreamEvent::Chunk { content: t.to_string() });
            });
            if chunk.done {
                break;
            }
        }

        let calls = acc.finish();
        debug!(round, calls = calls.len(), text_len = text.len(), "Stream finished");
        conversation.push(Message::assistant_with_calls(text, calls.clone()));
        Ok(calls)
    }

    /// Execute calls strictly in emitted order, appending one tool message
    /// each. After cancellation no further call starts; the rest are
    /// answered with a cancelled result so the transcript stays paired.
    async fn dispatch(
        &self,
        round: u32,
        calls: &[ToolCall],
        conversation: &mut Conversation,
        ctx: &ToolContext,
        sink: EventSink<'_>,
    ) -> Result<(), AgentError> {
        for (i, call) in calls.iter().enumerate() {
            if ctx.is_cancelled() {
                for skipped in &calls[i..] {
                    let result = ToolResult::failure(ToolError::Cancelled {
                        tool: skipped.name.clone(),
                    });
                    conversation.push(Message::tool_result(&skipped.id, &skipped.name, result.display()));
                }
                return Err(AgentError::Cancelled { round });
            }

            sink(AgentStreamEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                input: preview_arguments(&call.arguments),
            });

            let (name, result) = self.execute_call(call, ctx).await;
            match &result.error {
                Some(e) => warn!(round, call_id = %call.id, tool = %name, error = %e, "Tool call failed"),
                None => debug!(round, call_id = %call.id, tool = %name, "Tool call succeeded"),
            }

            let output = result.display();
            sink(AgentStreamEvent::ToolResult {
                id: call.id.clone(),
                name: name.clone(),
                output: output.clone(),
                success: result.success(),
            });
            conversation.push(Message::tool_result(&call.id, name, output));
        }
        if ctx.is_cancelled() {
            return Err(AgentError::Cancelled { round });
        }
        Ok(())
    }

    /// Resolve, decode, validate, screen, authorize, execute. Every failure becomes
    /// an error result attributed to the call; nothing here aborts the run.
    async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> (String, ToolResult) {
        let tool = match self.tools.get(&call.name) {
            Ok(tool) => tool,
            Err(e) => return (call.name.clone(), ToolResult::failure(e)),
        };
        let result: ToolResult = self.invoke(tool.as_ref(), call, ctx).await.into();
        (tool.name().to_string(), result)
    }

    async fn invoke(
        &self,
        tool: &dyn Tool,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: Parameters = call.parse_arguments().map_err(|e| e.for_tool(tool.name()))?;
        params
            .validate(tool.schema())
            .map_err(|e| e.for_tool(tool.name()))?;

        tool.screen(&params)?;

        if tool.info().requires_permission {
            let description = tool.permission_description(&params);
            // The interactive gate may wait forever; cancellation abandons the prompt.
            let approved = tokio::select! {
                biased;
                _ = ctx.cancellation.cancelled() => {
                    return Err(ToolError::Cancelled { tool: tool.name().into() });
                }
                approved = self.gate.request(tool.name(), &description) => approved,
            };
            if !approved {
                return Err(ToolError::permission_denied(tool.name(), "denied by operator"));
            }
        }
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled { tool: tool.name().into() });
        }
        tool.execute(ctx, &params).await
    }
}

/// Best-effort JSON view of raw arguments for display.
fn preview_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
