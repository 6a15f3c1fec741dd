//! Permission gates: the interactive prompt and unattended auto-approval.
//!
//! The interactive gate writes a fixed-shape prompt and blocks on one line
//! of operator input, with no timeout. Only `y` or `yes` (trimmed, any case)
//! approves; anything else, including EOF and read errors, denies. Answers
//! are read through [`SharedLines`] so the session prompt and the gate never
//! buffer the terminal separately.

use std::sync::Arc;

use async_trait::async_trait;
use nanocode_core::permission::PermissionGate;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::input::SharedLines;

/// True for the accepted affirmative answers.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Asks the operator before every side-effecting call.
pub struct InteractiveGate<R, W> {
    input: SharedLines<R>,
    writer: Mutex<W>,
    audit: Arc<AuditLogger>,
}

impl InteractiveGate<BufReader<Stdin>, Stderr> {
    /// Prompt on stderr, read answers from the shared stdin handle.
    pub fn stdio(input: SharedLines<BufReader<Stdin>>) -> Self {
        Self::shared(input, tokio::io::stderr())
    }
}

impl<R, W> InteractiveGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::shared(SharedLines::new(reader), writer)
    }

    /// Read answers from a line source other consumers also read from.
    pub fn shared(input: SharedLines<R>, writer: W) -> Self {
        Self {
            input,
            writer: Mutex::new(writer),
            audit: Arc::new(AuditLogger::default()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn ask(&self, action: &str, description: &str) -> bool {
        let mut writer = self.writer.lock().await;

        let prompt = format!("\n⚠️  Permission required: {action}\n   {description}\n   Allow? [y/N]: ");
        if let Err(e) = writer.write_all(prompt.as_bytes()).await {
            warn!(action, error = %e, "Could not write permission prompt");
            return false;
        }
        let _ = writer.flush().await;

        match self.input.next_line().await {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(action, error = %e, "Could not read permission answer");
                false
            }
        }
    }
}

#[async_trait]
impl<R, W> PermissionGate for InteractiveGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&self, action: &str, description: &str) -> bool {
        let approved = self.ask(action, description).await;
        let outcome = if approved {
            AuditOutcome::Approved
        } else {
            AuditOutcome::Denied
        };
        self.audit.log(
            AuditEvent::PermissionRequest { action: action.into() },
            "operator",
            outcome,
            Some(description.into()),
        );
        debug!(action, approved, "Interactive permission decision");
        approved
    }
}

/// Approves everything. Opt-in only, for unattended runs.
pub struct AutoGate<W> {
    writer: Mutex<W>,
    audit: Arc<AuditLogger>,
}

impl AutoGate<Stderr> {
    pub fn stderr() -> Self {
        Self::new(tokio::io::stderr())
    }
}

impl<W: AsyncWrite + Unpin + Send> AutoGate<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            audit: Arc::new(AuditLogger::default()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PermissionGate for AutoGate<W> {
    async fn request(&self, action: &str, description: &str) -> bool {
        let line = format!("✓ Auto-approved: {action} ({description})\n");
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.write_all(line.as_bytes()).await;
            let _ = writer.flush().await;
        }
        self.audit.log(
            AuditEvent::PermissionRequest { action: action.into() },
            "auto",
            AuditOutcome::Approved,
            Some(description.into()),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    async fn answer(input: &str) -> bool {
        let gate = InteractiveGate::new(BufReader::new(input.as_bytes()), Vec::new())
            .with_audit(Arc::new(AuditLogger::silent()));
        gate.request("bash", "Execute command: ls").await
    }

    #[tokio::test]
    async fn approves_only_y_or_yes() {
        for input in ["y\n", "yes\n", "  YES  \n", "Y", "Yes\r\n"] {
            assert!(answer(input).await, "{input:?} should approve");
        }
        for input in ["n\n", "\n", "", "maybe\n", "yess\n", "y e s\n"] {
            assert!(!answer(input).await, "{input:?} should deny");
        }
    }

    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed")))
        }
    }

    #[tokio::test]
    async fn read_error_denies() {
        let audit = Arc::new(AuditLogger::silent());
        let gate = InteractiveGate::new(BufReader::new(BrokenReader), Vec::new())
            .with_audit(Arc::clone(&audit));
        assert!(!gate.request("write", "Write to file: a.txt").await);
        assert_eq!(audit.entries_by_outcome(AuditOutcome::Denied).len(), 1);
    }

    #[tokio::test]
    async fn prompt_has_fixed_shape() {
        let gate = InteractiveGate::new(BufReader::new(&b"y\n"[..]), Vec::new())
            .with_audit(Arc::new(AuditLogger::silent()));
        assert!(gate.request("bash", "Execute command: ls").await);
        let written = gate.into_writer();
        let prompt = String::from_utf8(written).unwrap();
        assert!(prompt.contains("Permission required: bash"));
        assert!(prompt.contains("Execute command: ls"));
        assert!(prompt.ends_with("Allow? [y/N]: "));
    }

    #[tokio::test]
    async fn auto_gate_approves_and_audits() {
        let audit = Arc::new(AuditLogger::silent());
        let gate = AutoGate::new(Vec::new()).with_audit(Arc::clone(&audit));
        assert!(gate.request("bash", "Execute command: rm tmp.txt").await);

        let line = String::from_utf8(gate.into_inner()).unwrap();
        assert_eq!(line, "✓ Auto-approved: bash (Execute command: rm tmp.txt)\n");
        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "auto");
        assert_eq!(entries[0].outcome, AuditOutcome::Approved);
    }

    #[tokio::test]
    async fn gate_and_session_share_one_input() {
        let input = SharedLines::new(BufReader::new(&b"y\nlist files\n"[..]));
        let gate = InteractiveGate::shared(input.clone(), Vec::new())
            .with_audit(Arc::new(AuditLogger::silent()));

        assert!(gate.request("write", "Write to file: a.txt").await);
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("list files"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[test]
    fn affirmative_matching() {
        assert!(is_affirmative(" y "));
        assert!(!is_affirmative("no"));
    }
}
