//! Reassembles streamed tool-call deltas into complete calls.
//!
//! A provider delivers a call's JSON arguments in arbitrary fragments. A
//! delta with a non-empty `id` opens a call (flushing any call already
//! open); a delta with an empty `id` extends the open call. Argument text
//! is only ever appended here and decoded once, by the loop, after flush.

use std::collections::HashSet;

use nanocode_core::provider::{StreamChunk, ToolCallDelta};
use nanocode_core::tool::ToolCall;
use tracing::{debug, warn};

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(ToolCall),
}

/// Per-round accumulator. Create a fresh one for every provider stream.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    state: State,
    completed: Vec<ToolCall>,
    flushed_ids: HashSet<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame. Text is forwarded to `on_text` right away,
    /// independent of any tool-call state.
    pub fn push(&mut self, chunk: &StreamChunk, mut on_text: impl FnMut(&str)) {
        if let Some(text) = chunk.content.as_deref()
            && !text.is_empty()
        {
            on_text(text);
        }
        for delta in &chunk.tool_calls {
            self.push_delta(delta);
        }
    }

    pub fn push_delta(&mut self, delta: &ToolCallDelta) {
        if delta.id.is_empty() {
            match &mut self.state {
                State::Accumulating(open) => {
                    open.name.push_str(&delta.name);
                    open.arguments.push_str(&delta.arguments);
                }
                State::Idle => {
                    if !delta.name.is_empty() || !delta.arguments.is_empty() {
                        warn!("Dropping tool-call delta with no open call");
                    }
                }
            }
            return;
        }

        // Some servers repeat the id on every fragment of the same call.
        if let State::Accumulating(open) = &mut self.state
            && open.id == delta.id
        {
            if open.name.is_empty() {
                open.name.push_str(&delta.name);
            }
            open.arguments.push_str(&delta.arguments);
            return;
        }

        self.flush();
        if self.flushed_ids.contains(&delta.id) {
            warn!(call_id = %delta.id, "Dropping delta for an already completed tool call");
            return;
        }
        debug!(call_id = %delta.id, tool = %delta.name, "Tool call opened");
        self.state = State::Accumulating(ToolCall {
            id: delta.id.clone(),
            name: delta.name.clone(),
            arguments: delta.arguments.clone(),
        });
    }

    /// True while a call is open and still receiving fragments.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    /// Calls completed so far, in first-seen order.
    pub fn completed(&self) -> &[ToolCall] {
        &self.completed
    }

    fn flush(&mut self) {
        if let State::Accumulating(call) = std::mem::take(&mut self.state) {
            debug!(call_id = %call.id, tool = %call.name, bytes = call.arguments.len(), "Tool call complete");
            self.flushed_ids.insert(call.id.clone());
            self.completed.push(call);
        }
    }

    /// End of stream: flush the open call and hand back every completed one.
    pub fn finish(mut self) -> Vec<ToolCall> {
        self.flush();
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(deltas: &[ToolCallDelta]) -> Vec<ToolCall> {
        let mut acc = StreamAccumulator::new();
        for delta in deltas {
            acc.push_delta(delta);
        }
        acc.finish()
    }

    #[test]
    fn split_arguments_are_joined_once() {
        let calls = feed(&[
            ToolCallDelta::start("1", "bash", r#"{"command":""#),
            ToolCallDelta::more(r#"ls"}"#),
        ]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "1");
        assert_eq!(calls[0].name, "bash");
        let params = calls[0].parse_arguments().unwrap();
        assert_eq!(params.get_string("command").unwrap(), "ls");
    }

    #[test]
    fn arbitrary_byte_boundaries() {
        let raw = r#"{"path":"src/main.rs","start_line":3}"#;
        let mut deltas = vec![ToolCallDelta::start("c", "read", "")];
        deltas.extend(raw.chars().map(|c| ToolCallDelta::more(c.to_string())));
        let calls = feed(&deltas);
        assert_eq!(calls[0].arguments, raw);
    }

    #[test]
    fn new_id_flushes_previous_call_first() {
        let mut acc = StreamAccumulator::new();
        acc.push_delta(&ToolCallDelta::start("a", "read", r#"{"path":"x"}"#));
        assert!(acc.completed().is_empty());

        acc.push_delta(&ToolCallDelta::start("b", "list", "{}"));
        assert_eq!(acc.completed().len(), 1);
        assert_eq!(acc.completed()[0].id, "a");
        assert!(acc.is_accumulating());

        let calls = acc.finish();
        let ids: Vec<_> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn text_and_deltas_in_one_frame() {
        let mut acc = StreamAccumulator::new();
        let mut text = String::new();
        let chunk = StreamChunk {
            content: Some("Let me look.".into()),
            tool_calls: vec![ToolCallDelta::start("1", "list", "{}")],
            ..StreamChunk::default()
        };
        acc.push(&chunk, |t| text.push_str(t));
        assert_eq!(text, "Let me look.");
        assert_eq!(acc.finish().len(), 1);
    }

    #[test]
    fn delta_without_open_call_is_dropped() {
        let calls = feed(&[ToolCallDelta::more("{}"), ToolCallDelta::start("1", "list", "{}")]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn reused_id_after_flush_is_dropped() {
        let calls = feed(&[
            ToolCallDelta::start("1", "list", "{}"),
            ToolCallDelta::start("2", "read", r#"{"path":"a"}"#),
            ToolCallDelta::start("1", "bash", r#"{"command":"rm x"}"#),
            ToolCallDelta::more("ignored"),
        ]);
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["list", "read"]);
    }

    #[test]
    fn repeated_id_on_open_call_continues_it() {
        let calls = feed(&[
            ToolCallDelta::start("1", "bash", r#"{"command":"#),
            ToolCallDelta::start("1", "bash", r#""pwd"}"#),
        ]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "bash");
        assert_eq!(calls[0].arguments, r#"{"command":"pwd"}"#);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut acc = StreamAccumulator::new();
        acc.push(&StreamChunk::done(), |_| {});
        assert!(acc.finish().is_empty());
    }
}
