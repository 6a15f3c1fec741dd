//! Audit logging: a structured record of authorization decisions.
//!
//! Every permission request and every blocked command produces one entry.
//! Entries are forwarded to the configured sinks; the most recent ones are
//! also kept in memory, up to a fixed capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Entries retained in memory unless a logger is built with another capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// Who decided: `operator` for the interactive gate, `auto` for
    /// auto-approval, `policy` for the command blocklist.
    pub actor: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A side-effecting tool asked for permission
    PermissionRequest { action: String },
    /// A shell command matched the blocklist
    CommandBlocked { command: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Approved,
    Denied,
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Audit logger that forwards to sinks and keeps a bounded in-memory tail.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("capacity", &self.capacity)
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    /// Logs through `tracing`.
    fn default() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)])
    }
}

impl AuditLogger {
    /// A logger that only keeps entries in memory.
    pub fn silent() -> Self {
        Self::with_sinks(Vec::new())
    }

    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_AUDIT_CAPACITY,
            sinks,
        }
    }

    /// Keep at most `capacity` entries in memory; older ones are dropped.
    /// Sinks still see every entry.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn log(&self, event: AuditEvent, actor: &str, outcome: AuditOutcome, details: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            actor: actor.into(),
            outcome,
            details,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn entries_by_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            target: "audit",
            event = ?entry.event,
            actor = %entry.actor,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn log_and_filter_entries() {
        let logger = AuditLogger::silent();
        logger.log(
            AuditEvent::PermissionRequest { action: "bash".into() },
            "operator",
            AuditOutcome::Approved,
            None,
        );
        logger.log(
            AuditEvent::CommandBlocked { command: "mkfs /dev/sda1".into() },
            "auto",
            AuditOutcome::Denied,
            Some("matched mkfs".into()),
        );

        assert_eq!(logger.count(), 2);
        assert_eq!(logger.entries()[0].actor, "operator");
        let denied = logger.entries_by_outcome(AuditOutcome::Denied);
        assert_eq!(denied.len(), 1);
        assert!(matches!(denied[0].event, AuditEvent::CommandBlocked { .. }));
    }

    struct CountingSink(Arc<Mutex<usize>>);

    impl AuditSink for CountingSink {
        fn record(&self, _entry: &AuditEntry) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn entries_reach_sinks() {
        let counter = Arc::new(Mutex::new(0));
        let logger = AuditLogger::with_sinks(vec![Box::new(CountingSink(Arc::clone(&counter)))]);
        logger.log(
            AuditEvent::PermissionRequest { action: "write".into() },
            "auto",
            AuditOutcome::Approved,
            None,
        );
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[test]
    fn memory_keeps_only_the_newest_entries() {
        let counter = Arc::new(Mutex::new(0));
        let logger =
            AuditLogger::with_sinks(vec![Box::new(CountingSink(Arc::clone(&counter)))]).with_capacity(2);
        for action in ["read", "write", "bash"] {
            logger.log(
                AuditEvent::PermissionRequest { action: action.into() },
                "auto",
                AuditOutcome::Approved,
                None,
            );
        }

        assert_eq!(logger.count(), 2);
        let actions: Vec<_> = logger
            .entries()
            .into_iter()
            .map(|e| match e.event {
                AuditEvent::PermissionRequest { action } => action,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(actions, ["write", "bash"]);
        assert_eq!(*counter.lock().unwrap(), 3);
    }

    #[test]
    fn default_capacity_applies() {
        let logger = AuditLogger::silent();
        for _ in 0..DEFAULT_AUDIT_CAPACITY + 5 {
            logger.log(
                AuditEvent::CommandBlocked { command: "mkfs".into() },
                "policy",
                AuditOutcome::Denied,
                None,
            );
        }
        assert_eq!(logger.count(), DEFAULT_AUDIT_CAPACITY);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(AuditEvent::PermissionRequest { action: "edit".into() }).unwrap();
        assert_eq!(json["type"], "permission_request");
        assert_eq!(json["action"], "edit");
    }
}
