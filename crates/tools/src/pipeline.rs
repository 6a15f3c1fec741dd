//! Pipeline tool: run several shell commands in sequence or in parallel.

use std::sync::Arc;

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::pipeline::{ParallelPipeline, PipelineOutcome, SequentialPipeline};
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use tracing::info;

const NAME: &str = "pipeline";

pub struct PipelineTool {
    spec: ToolSpec,
    shell: Arc<dyn Tool>,
}

impl PipelineTool {
    /// `shell` runs each command; it receives `command` plus the shared
    /// `cwd`, `env` and `timeout` parameters.
    pub fn new(shell: Arc<dyn Tool>) -> Self {
        let spec = ToolSpec::new(NAME, "system", "Execute a list of shell commands in sequence or in parallel")
            .requires_permission(true)
            .tags(["system", "shell", "pipeline", "chain"])
            .schema(
                ParameterSchema::object()
                    .property("commands", PropertySchema::string_array("Commands to execute"))
                    .property(
                        "stop_on_error",
                        PropertySchema::boolean("Stop at the first failing command").with_default(true),
                    )
                    .property(
                        "parallel",
                        PropertySchema::boolean("Run all commands concurrently").with_default(false),
                    )
                    .property("cwd", PropertySchema::string("Working directory for every command"))
                    .property("env", PropertySchema::object("Environment variables for every command"))
                    .property("timeout", PropertySchema::integer("Per-command timeout in seconds"))
                    .required(["commands"]),
            );
        Self { spec, shell }
    }

    fn commands(params: &Parameters) -> Result<Vec<String>, ToolError> {
        let commands = params.get_string_list("commands").map_err(|e| e.for_tool(NAME))?;
        if commands.is_empty() {
            return Err(ToolError::invalid_params(NAME, "at least one command is required"));
        }
        Ok(commands)
    }
}

fn report(commands: &[String], outcome: &PipelineOutcome, parallel: bool) -> (String, usize) {
    let succeeded = outcome.results.iter().filter(|r| r.success()).count();
    let failed = outcome.results.len() - succeeded;
    let mut text = format!(
        "Executed {} of {} commands{}: {succeeded} succeeded, {failed} failed",
        outcome.results.len(),
        commands.len(),
        if parallel { " in parallel" } else { "" },
    );
    for (i, (command, result)) in commands.iter().zip(&outcome.results).enumerate() {
        text.push_str(&format!("\n\n[{}] $ {command}\n{}", i + 1, result.display()));
    }
    (text, succeeded)
}

#[async_trait]
impl Tool for PipelineTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn permission_description(&self, params: &Parameters) -> String {
        match params.get_string_list("commands") {
            Ok(commands) => format!("Execute commands: {}", commands.join("; ")),
            Err(_) => self.info().description.clone(),
        }
    }

    /// Every command must pass the shell's own screening.
    fn screen(&self, params: &Parameters) -> Result<(), ToolError> {
        for command in Self::commands(params)? {
            self.shell
                .screen(&Parameters::new().with("command", command.as_str()))
                .map_err(|e| match e {
                    ToolError::PermissionDenied { reason, .. } => ToolError::permission_denied(NAME, reason),
                    other => other,
                })?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let commands = Self::commands(params)?;
        let stop_on_error = params.bool_or("stop_on_error", true).map_err(|e| e.for_tool(NAME))?;
        let parallel = params.bool_or("parallel", false).map_err(|e| e.for_tool(NAME))?;

        let mut shared = Parameters::new();
        for key in ["cwd", "env", "timeout"] {
            if let Ok(value) = params.get(key) {
                shared.set(key, value.clone());
            }
        }
        let step = |command: &String| shared.clone().with("command", command.as_str());

        let outcome = if parallel {
            commands
                .iter()
                .fold(ParallelPipeline::new(), |p, c| p.step(Arc::clone(&self.shell), step(c)))
                .execute(ctx)
                .await
        } else {
            commands
                .iter()
                .fold(SequentialPipeline::new(), |p, c| p.step(Arc::clone(&self.shell), step(c)))
                .stop_on_error(stop_on_error)
                .execute(ctx)
                .await
        };

        let (text, succeeded) = report(&commands, &outcome, parallel);
        info!(
            commands = commands.len(),
            attempted = outcome.results.len(),
            succeeded,
            parallel,
            "Pipeline finished"
        );

        let result = match &outcome.error {
            None => ToolResult::text(text),
            Some(error) => ToolResult::failure(ToolError::execution_failed(NAME, format!("{error}\n\n{text}"))),
        };
        Ok(result
            .meta("total_commands", commands.len())
            .meta("attempted", outcome.results.len())
            .meta("success_count", succeeded)
            .meta("fail_count", outcome.results.len() - succeeded)
            .meta("parallel", parallel))
    }
}
