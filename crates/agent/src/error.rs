use nanocode_core::error::ProviderError;
use thiserror::Error;

/// Failures that end an agent run early.
///
/// Per-call tool failures never show up here; they are fed back to the
/// model as tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("agent run cancelled during round {round}")]
    Cancelled { round: u32 },
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
