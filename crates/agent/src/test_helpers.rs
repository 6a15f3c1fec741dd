//! Shared test helpers: scripted providers, stub tools and a recording gate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nanocode_core::error::{ProviderError, ToolError};
use nanocode_core::params::Parameters;
use nanocode_core::permission::PermissionGate;
use nanocode_core::provider::{
    ChunkStream, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta,
};
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One round of text frames followed by the end marker.
pub fn text_round(parts: &[&str]) -> Vec<StreamChunk> {
    let mut frames: Vec<StreamChunk> = parts.iter().map(|p| StreamChunk::text(*p)).collect();
    frames.push(StreamChunk::done());
    frames
}

/// One round carrying a single tool call whose arguments arrive in `fragments`.
pub fn tool_round(id: &str, name: &str, fragments: &[&str]) -> Vec<StreamChunk> {
    let mut frames = Vec::new();
    for (i, fragment) in fragments.iter().enumerate() {
        let delta = if i == 0 {
            ToolCallDelta::start(id, name, *fragment)
        } else {
            ToolCallDelta::more(*fragment)
        };
        frames.push(StreamChunk::deltas(vec![delta]));
    }
    frames.push(StreamChunk::done());
    frames
}

enum Script {
    Rounds(Mutex<VecDeque<Vec<StreamChunk>>>),
    Repeat(Vec<StreamChunk>),
    Fail,
}

/// Replays pre-built frame sequences, one per `stream` call, and records
/// every request it receives.
pub struct ScriptedProvider {
    script: Script,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(rounds: Vec<Vec<StreamChunk>>) -> Self {
        Self::with_script(Script::Rounds(Mutex::new(rounds.into())))
    }

    /// Returns the same round forever.
    pub fn repeating(round: Vec<StreamChunk>) -> Self {
        Self::with_script(Script::Repeat(round))
    }

    /// Every call fails with a transport error.
    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("scripted provider only streams".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let frames = match &self.script {
            Script::Rounds(rounds) => rounds
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted provider ran out of rounds"),
            Script::Repeat(round) => round.clone(),
            Script::Fail => return Err(ProviderError::Network("connection refused".into())),
        };
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for frame in frames {
            tx.send(Ok(frame)).await.unwrap();
        }
        Ok(rx)
    }
}

/// Sends its frames, then keeps the stream open without ever finishing.
pub struct StalledProvider {
    frames: Vec<StreamChunk>,
    open: Mutex<Vec<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl StalledProvider {
    pub fn new(frames: Vec<StreamChunk>) -> Self {
        Self {
            frames,
            open: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stalled provider only streams".into()))
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        let (tx, rx) = mpsc::channel(self.frames.len() + 1);
        for frame in &self.frames {
            tx.send(Ok(frame.clone())).await.unwrap();
        }
        self.open.lock().unwrap().push(tx);
        Ok(rx)
    }
}

/// Answers every request with a fixed decision and remembers what was asked.
pub struct RecordingGate {
    allow: bool,
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingGate {
    pub fn allow() -> Arc<Self> {
        Arc::new(Self {
            allow: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn deny() -> Arc<Self> {
        Arc::new(Self {
            allow: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionGate for RecordingGate {
    async fn request(&self, action: &str, description: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .push((action.to_string(), description.to_string()));
        self.allow
    }
}

/// Cancels the run while the operator is being asked, then approves.
pub struct CancellingGate {
    cancel: CancellationToken,
}

impl CancellingGate {
    pub fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self { cancel })
    }
}

#[async_trait]
impl PermissionGate for CancellingGate {
    async fn request(&self, _action: &str, _description: &str) -> bool {
        self.cancel.cancel();
        true
    }
}

/// An operator who never answers.
pub struct PendingGate;

#[async_trait]
impl PermissionGate for PendingGate {
    async fn request(&self, _action: &str, _description: &str) -> bool {
        std::future::pending().await
    }
}

/// Read-only stand-in for the directory listing tool.
pub struct ListStub {
    spec: ToolSpec,
}

impl ListStub {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new("list", "file", "List directory contents").schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("Directory").with_default(".")),
            ),
        }
    }
}

#[async_trait]
impl Tool for ListStub {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.string_or("path", ".").map_err(|e| e.for_tool("list"))?;
        Ok(ToolResult::text(format!("listed {path}")))
    }
}

/// Permission-gated stand-in for the file writer; counts executions.
pub struct WriteStub {
    spec: ToolSpec,
    executions: AtomicUsize,
}

impl WriteStub {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new("write", "file", "Write a file")
                .requires_permission(true)
                .schema(
                    ParameterSchema::object()
                        .property("path", PropertySchema::string("File path"))
                        .property("content", PropertySchema::string("Content"))
                        .required(["path", "content"]),
                ),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for WriteStub {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Anything under `/etc` is refused without asking.
    fn screen(&self, params: &Parameters) -> Result<(), ToolError> {
        let path = params.get_string("path").map_err(|e| e.for_tool("write"))?;
        if path.starts_with("/etc") {
            return Err(ToolError::permission_denied("write", "system path"));
        }
        Ok(())
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let path = params.get_string("path").map_err(|e| e.for_tool("write"))?;
        Ok(ToolResult::text(format!("wrote {path}")))
    }
}
