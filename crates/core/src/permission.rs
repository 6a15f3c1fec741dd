//! Authorization checkpoint for side-effecting tool calls.
//!
//! Implementations live in `nanocode-security`. The agent loop consults the
//! gate for every tool whose info sets `requires_permission`, and never runs
//! such a tool unless the gate answered `true`.

use async_trait::async_trait;

#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Ask whether `action` (usually the tool name) may proceed.
    ///
    /// Implementations fail closed: anything other than an explicit
    /// approval is `false`.
    async fn request(&self, action: &str, description: &str) -> bool;
}
