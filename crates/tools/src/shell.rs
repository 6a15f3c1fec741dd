//! Shell tool: run a command through `sh -c`.
//!
//! Commands are screened against the destructive-command blocklist before
//! the operator is asked and again before spawning. Every refusal is written
//! to the audit log. The child is killed when the call times out or the
//! context is cancelled.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use nanocode_security::{AuditEvent, AuditLogger, AuditOutcome, check_command};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

const NAME: &str = "bash";

pub struct BashTool {
    spec: ToolSpec,
    default_timeout_secs: u64,
    audit: Arc<AuditLogger>,
}

impl BashTool {
    pub fn new(default_timeout_secs: u64) -> Self {
        let spec = ToolSpec::new(NAME, "system", "Execute a shell command and return its combined output")
            .requires_permission(true)
            .tags(["system", "shell", "command", "execute"])
            .schema(
                ParameterSchema::object()
                    .property("command", PropertySchema::string("Command to execute").with_length(Some(1), None))
                    .property("cwd", PropertySchema::string("Working directory"))
                    .property("env", PropertySchema::object("Extra environment variables"))
                    .property(
                        "timeout",
                        PropertySchema::integer("Timeout in seconds (0 disables it)")
                            .with_default(default_timeout_secs),
                    )
                    .required(["command"]),
            );
        Self {
            spec,
            default_timeout_secs,
            audit: Arc::new(AuditLogger::default()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    fn check(&self, command: &str) -> Result<(), ToolError> {
        check_command(command).map_err(|blocked| {
            warn!(command = %command, fragment = blocked.fragment, "Blocked dangerous command");
            self.audit.log(
                AuditEvent::CommandBlocked {
                    command: command.to_string(),
                },
                "policy",
                AuditOutcome::Denied,
                Some(format!("matched '{}'", blocked.fragment)),
            );
            ToolError::permission_denied(NAME, blocked.to_string())
        })
    }
}

fn env_vars(params: &Parameters) -> Result<HashMap<String, String>, ToolError> {
    if !params.has("env") {
        return Ok(HashMap::new());
    }
    match params.get("env").map_err(|e| e.for_tool(NAME))? {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()),
        _ => Err(ToolError::invalid_params(NAME, "env must be an object of strings")),
    }
}

fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => format!("[stderr]: {stderr}"),
        (false, false) => format!("{stdout}\n[stderr]: {stderr}"),
    }
}

#[async_trait]
impl Tool for BashTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn screen(&self, params: &Parameters) -> Result<(), ToolError> {
        let command = params.get_string("command").map_err(|e| e.for_tool(NAME))?;
        self.check(&command)
    }

    async fn execute(&self, ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let command = params.get_string("command").map_err(|e| e.for_tool(NAME))?;
        let cwd = params.opt_string("cwd").map_err(|e| e.for_tool(NAME))?.filter(|c| !c.is_empty());
        let env = env_vars(params)?;
        let timeout_secs = params
            .int_or("timeout", self.default_timeout_secs as i64)
            .map_err(|e| e.for_tool(NAME))?
            .max(0) as u64;

        // Pipelines reach here without passing through the loop's screening.
        self.check(&command)?;
        if let Some(dir) = &cwd
            && !Path::new(dir).is_dir()
        {
            return Err(ToolError::invalid_params(NAME, format!("invalid working directory: {dir}")));
        }
        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled { tool: NAME.into() });
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cwd {
            cmd.current_dir(dir);
        }

        debug!(command = %command, timeout_secs, "Executing shell command");
        let started = Instant::now();
        let child = cmd
            .spawn()
            .map_err(|e| ToolError::execution_failed(NAME, format!("failed to spawn shell: {e}")))?;

        let waited = async move {
            let output = child.wait_with_output();
            if timeout_secs == 0 {
                Ok(output.await)
            } else {
                tokio::time::timeout(Duration::from_secs(timeout_secs), output).await
            }
        };

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                warn!(command = %command, "Shell command cancelled");
                return Err(ToolError::Cancelled { tool: NAME.into() });
            }
            waited = waited => match waited {
                Err(_) => {
                    warn!(command = %command, timeout_secs, "Shell command timed out");
                    return Err(ToolError::Timeout { tool: NAME.into(), timeout_secs });
                }
                Ok(output) => output
                    .map_err(|e| ToolError::execution_failed(NAME, format!("failed to wait for command: {e}")))?,
            },
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let text = combine(&output.stdout, &output.stderr);

        let result = if output.status.success() {
            ToolResult::text(text)
        } else {
            warn!(command = %command, exit_code, "Command failed");
            ToolResult::failure(ToolError::execution_failed(
                NAME,
                format!("exit code {exit_code}\n{text}").trim_end().to_string(),
            ))
        };
        let mut result = result
            .meta("command", command)
            .meta("exit_code", exit_code)
            .meta("duration_ms", duration_ms);
        if let Some(dir) = cwd {
            result = result.meta("cwd", dir);
        }
        Ok(result)
    }
}
