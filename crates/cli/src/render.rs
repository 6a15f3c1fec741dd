//! Terminal rendering of agent events.
//!
//! Model text streams to the output writer untouched. Tool activity and
//! notices go to the status writer so that piping stdout captures only the
//! answer.

use std::io::{Stderr, Stdout, Write};

use nanocode_agent::AgentStreamEvent;

const PREVIEW_CHARS: usize = 120;

pub struct Renderer<O, E> {
    out: O,
    status: E,
    /// The last thing written to `out` did not end in a newline.
    mid_line: bool,
}

impl Renderer<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, status: E) -> Self {
        Self {
            out,
            status,
            mid_line: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.status)
    }

    /// Terminal writes are best effort; a closed pipe must not abort the run.
    pub fn handle(&mut self, event: AgentStreamEvent) {
        let _ = self.write_event(event);
    }

    fn write_event(&mut self, event: AgentStreamEvent) -> std::io::Result<()> {
        match event {
            AgentStreamEvent::Chunk { content } => {
                write!(self.out, "{content}")?;
                self.out.flush()?;
                self.mid_line = !content.ends_with('\n');
            }
            AgentStreamEvent::ToolCall { name, input, .. } => {
                self.end_line()?;
                writeln!(self.status, "🔧 {name} {}", preview(&input_text(&input)))?;
            }
            AgentStreamEvent::ToolResult {
                name, output, success, ..
            } => {
                let mark = if success { "✓" } else { "✗" };
                let first = output.lines().next().unwrap_or_default();
                writeln!(self.status, "   {mark} {name}: {}", preview(first))?;
            }
            AgentStreamEvent::Done { .. } => {
                self.end_line()?;
            }
            AgentStreamEvent::RoundLimit {
                max_rounds,
                tool_calls_made,
            } => {
                self.end_line()?;
                writeln!(
                    self.status,
                    "\n⚠️  Round limit reached: stopped after {max_rounds} rounds ({tool_calls_made} tool calls) with work still pending."
                )?;
            }
        }
        Ok(())
    }

    fn end_line(&mut self) -> std::io::Result<()> {
        if self.mid_line {
            writeln!(self.out)?;
            self.out.flush()?;
            self.mid_line = false;
        }
        Ok(())
    }
}

fn input_text(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
