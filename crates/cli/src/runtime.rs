//! Wires configuration into a ready-to-run agent.

use std::path::PathBuf;
use std::sync::Arc;

use nanocode_agent::{AgentError, AgentLoop, AgentStreamEvent, LoopOutcome, system_prompt};
use nanocode_config::AppConfig;
use nanocode_core::message::Conversation;
use nanocode_core::permission::PermissionGate;
use nanocode_providers::OpenAiCompatProvider;
use nanocode_security::{AutoGate, InteractiveGate, StdinLines};
use nanocode_session::{FileStorage, TodoManager};
use nanocode_tools::{ToolSettings, default_registry};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::render::Renderer;

pub struct Runtime {
    agent: AgentLoop,
    system_prompt: String,
    pub model: String,
    pub cwd: PathBuf,
    pub auto_approve: bool,
    pub tool_count: usize,
    /// Stdin, shared with the interactive gate.
    pub input: StdinLines,
}

impl Runtime {
    pub fn build(
        config: &AppConfig,
        auto_approve: bool,
        max_rounds: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let provider = Arc::new(OpenAiCompatProvider::from_config(config)?);

        let todo_path = config.session.todo_path();
        let todos = Arc::new(TodoManager::open(Box::new(FileStorage::new(&todo_path)))?);
        debug!(path = %todo_path.display(), items = todos.count(), "Todo store opened");

        let settings = ToolSettings {
            command_timeout_secs: config.tools.command_timeout_secs,
            max_read_bytes: config.tools.max_read_bytes,
        };
        let tools = Arc::new(default_registry(&settings, todos)?);
        let tool_count = tools.len();

        let input = StdinLines::stdin();
        let gate: Arc<dyn PermissionGate> = if auto_approve {
            Arc::new(AutoGate::stderr())
        } else {
            Arc::new(InteractiveGate::stdio(input.clone()))
        };

        let agent = AgentLoop::new(provider, config.default_model.clone(), tools, gate)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_rounds(u32::try_from(max_rounds).unwrap_or(u32::MAX));

        let cwd = std::env::current_dir()?;
        Ok(Self {
            agent,
            system_prompt: system_prompt(&cwd),
            model: config.default_model.clone(),
            cwd,
            auto_approve,
            tool_count,
            input,
        })
    }

    /// A fresh conversation seeded with the system prompt.
    pub fn conversation(&self) -> Conversation {
        Conversation::with_system(self.system_prompt.clone())
    }

    pub fn max_rounds(&self) -> u32 {
        self.agent.max_rounds()
    }

    /// Run one agent turn, printing events as they arrive. Ctrl-C during the
    /// turn cancels it.
    pub async fn run_turn(&self, conversation: &mut Conversation) -> Result<LoopOutcome, AgentError> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let mut renderer = Renderer::stdio();
        let mut sink = |event: AgentStreamEvent| renderer.handle(event);
        let result = self.agent.run(conversation, &cancel, &mut sink).await;

        watcher.abort();
        result
    }
}
