//! The streaming agent loop for nanocode.
//!
//! Each round:
//!
//! 1. **Send** the conversation plus advertised tool schemas to the provider
//! 2. **Receive** the stream, forwarding text and reassembling tool calls
//! 3. **Dispatch** each call: resolve, decode, validate, authorize, execute
//! 4. **Append** one tool message per call and go again
//!
//! The run ends when a round produces no tool calls, or when the round
//! budget is spent, which is reported as its own outcome.

pub mod accumulator;
pub mod error;
pub mod loop_runner;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use accumulator::StreamAccumulator;
pub use error::AgentError;
pub use loop_runner::{AgentLoop, EventSink, LoopOutcome, LoopStatus};
pub use prompt::system_prompt;
pub use stream_event::AgentStreamEvent;
