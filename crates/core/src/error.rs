//! Error types for the nanocode domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `ToolError` carries the
//! per-call taxonomy that is fed back to the model as a tool's output.

use thiserror::Error;

/// The top-level error type for nanocode operations outside the agent loop.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure of a single tool invocation.
///
/// Every variant names the tool it concerns so the message fed back to the
/// model is self-describing. Only [`ToolError::Timeout`] is retryable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("[INVALID_PARAMS] {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("[PERMISSION_DENIED] {tool}: {reason}")]
    PermissionDenied { tool: String, reason: String },

    #[error("[TOOL_NOT_FOUND] {0}: tool not found")]
    NotFound(String),

    #[error("[EXECUTION_FAILED] {tool}: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("[TIMEOUT] {tool}: timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("[CANCELLED] {tool}: operation cancelled")]
    Cancelled { tool: String },

    #[error("[NOT_IMPLEMENTED] {tool}: {feature} is not implemented")]
    NotImplemented { tool: String, feature: String },

    #[error("[INTERNAL_ERROR] {tool}: {message}")]
    Internal { tool: String, message: String },
}

impl ToolError {
    pub fn invalid_params(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn execution_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn permission_denied(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => "INVALID_PARAMS",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::NotFound(_) => "TOOL_NOT_FOUND",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether resubmitting the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Name of the tool the error concerns.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound(tool) => tool,
            Self::InvalidParams { tool, .. }
            | Self::PermissionDenied { tool, .. }
            | Self::ExecutionFailed { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Cancelled { tool }
            | Self::NotImplemented { tool, .. }
            | Self::Internal { tool, .. } => tool,
        }
    }
}

/// Failure while reading or validating a parameter bag.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("missing required parameter: {0}")]
    Missing(String),

    #[error("parameter {key} is not a valid {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("parameter {key} must be one of: {}", allowed.join(", "))]
    NotInEnum { key: String, allowed: Vec<String> },

    #[error("parameter {key} must be at least {min} characters")]
    TooShort { key: String, min: usize },

    #[error("parameter {key} must be at most {max} characters")]
    TooLong { key: String, max: usize },

    #[error("arguments are not a JSON object: {0}")]
    Decode(String),
}

impl ParamError {
    /// Attribute this failure to a tool.
    pub fn for_tool(self, tool: &str) -> ToolError {
        ToolError::invalid_params(tool, self.to_string())
    }
}

/// Registration collisions. A failed registration leaves the registry untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("tool {0} is already registered")]
    DuplicateName(String),

    #[error("alias {alias} is already in use by {owner}")]
    AliasInUse { alias: String, owner: String },
}
