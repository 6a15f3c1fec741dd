//! Security for nanocode: permission gates, command screening, and audit logging.
//!
//! Provides:
//! - **Gates**: interactive operator prompt and opt-in auto-approval
//! - **Command screening**: a blocklist of destructive shell fragments
//! - **Audit logging**: structured record of every authorization decision
//! - **Shared input**: one line reader over stdin for the session and the gate

pub mod audit;
pub mod command;
pub mod gate;
pub mod input;

pub use audit::{
    AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, DEFAULT_AUDIT_CAPACITY, TracingSink,
};
pub use command::{CommandBlocked, check_command};
pub use gate::{AutoGate, InteractiveGate, is_affirmative};
pub use input::{SharedLines, StdinLines};
