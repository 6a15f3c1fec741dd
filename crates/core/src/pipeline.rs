//! Pipeline combinators for composing tool calls.
//!
//! - [`SequentialPipeline`] runs steps in order, optionally feeding each
//!   step the previous step's data under [`PREVIOUS_RESULT_KEY`].
//! - [`ParallelPipeline`] spawns one task per step and joins them all.
//! - [`ConditionalPipeline`] picks the first step whose predicate holds.
//!
//! Every step is validated against its tool's schema before it executes.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::params::Parameters;
use crate::result::ToolResult;
use crate::tool::{Tool, ToolContext};

/// Parameter key under which a sequential pipeline passes the previous result.
pub const PREVIOUS_RESULT_KEY: &str = "_previous_result";

/// One tool plus the parameters to invoke it with.
#[derive(Clone)]
pub struct PipelineStep {
    pub tool: Arc<dyn Tool>,
    pub params: Parameters,
}

impl PipelineStep {
    pub fn new(tool: Arc<dyn Tool>, params: Parameters) -> Self {
        Self { tool, params }
    }
}

/// Why a pipeline did not complete cleanly. Step numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("pipeline failed at step {step} ({tool}): {source}")]
    StepFailed {
        step: usize,
        tool: String,
        source: ToolError,
    },

    #[error("tool {tool} failed: {source}")]
    WorkerFailed {
        step: usize,
        tool: String,
        source: ToolError,
    },

    #[error("pipeline cancelled before step {step}")]
    Cancelled { step: usize },
}

/// Results of every attempted step plus the first failure, if any.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub results: Vec<ToolResult>,
    pub error: Option<PipelineError>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

async fn run_step(tool: &dyn Tool, ctx: &ToolContext, params: &Parameters) -> ToolResult {
    if let Err(e) = params.validate(tool.schema()) {
        return ToolResult::failure(e.for_tool(tool.name()));
    }
    tool.execute(ctx, params).await.into()
}

/// Runs steps one after another.
pub struct SequentialPipeline {
    steps: Vec<PipelineStep>,
    stop_on_error: bool,
    pass_previous: bool,
}

impl SequentialPipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            stop_on_error: true,
            pass_previous: false,
        }
    }

    pub fn step(mut self, tool: Arc<dyn Tool>, params: Parameters) -> Self {
        self.steps.push(PipelineStep::new(tool, params));
        self
    }

    /// Keep going after a failed step. The first failure is still reported.
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Inject each successful result's data into the next step's parameters.
    pub fn pass_previous_result(mut self, pass: bool) -> Self {
        self.pass_previous = pass;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn execute(&self, ctx: &ToolContext) -> PipelineOutcome {
        let mut results: Vec<ToolResult> = Vec::with_capacity(self.steps.len());
        let mut error = None;

        for (i, step) in self.steps.iter().enumerate() {
            let number = i + 1;
            if ctx.is_cancelled() {
                error.get_or_insert(PipelineError::Cancelled { step: number });
                break;
            }

            let mut params = step.params.clone();
            if self.pass_previous
                && let Some(prev) = results.last().filter(|r| r.success())
            {
                let data = prev
                    .data
                    .clone()
                    .unwrap_or_else(|| Value::String(prev.output.clone()));
                params.set(PREVIOUS_RESULT_KEY, data);
            }

            let tool = step.tool.name().to_string();
            debug!(step = number, tool = %tool, "Running pipeline step");
            let result = run_step(step.tool.as_ref(), ctx, &params).await;

            let Some(source) = result.error.clone() else {
                results.push(result);
                continue;
            };

            warn!(step = number, tool = %tool, error = %source, "Pipeline step failed");
            results.push(result.meta("step", number).meta("tool", tool.clone()));
            let failure = PipelineError::StepFailed {
                step: number,
                tool,
                source,
            };
            if self.stop_on_error {
                return PipelineOutcome {
                    results,
                    error: Some(failure),
                };
            }
            error.get_or_insert(failure);
        }

        PipelineOutcome { results, error }
    }
}

impl Default for SequentialPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs every step concurrently, one spawned task per step.
#[derive(Default)]
pub struct ParallelPipeline {
    steps: Vec<PipelineStep>,
}

impl ParallelPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, tool: Arc<dyn Tool>, params: Parameters) -> Self {
        self.steps.push(PipelineStep::new(tool, params));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Results come back in step order. The reported error is the first
    /// failing step's, in step order.
    pub async fn execute(&self, ctx: &ToolContext) -> PipelineOutcome {
        let handles: Vec<_> = self
            .steps
            .iter()
            .map(|step| {
                let step = step.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { run_step(step.tool.as_ref(), &ctx, &step.params).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        let mut error = None;
        for (i, (handle, step)) in handles.into_iter().zip(&self.steps).enumerate() {
            let tool = step.tool.name().to_string();
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => ToolResult::failure(ToolError::internal(&tool, format!("worker aborted: {e}"))),
            };
            if let Some(source) = &result.error {
                warn!(step = i + 1, tool = %tool, error = %source, "Parallel step failed");
                error.get_or_insert_with(|| PipelineError::WorkerFailed {
                    step: i + 1,
                    tool: tool.clone(),
                    source: source.clone(),
                });
            }
            results.push(result);
        }

        PipelineOutcome { results, error }
    }
}

type Predicate = Box<dyn Fn(&[ToolResult]) -> bool + Send + Sync>;

/// Runs the first step whose predicate over prior results holds.
#[derive(Default)]
pub struct ConditionalPipeline {
    branches: Vec<(Predicate, PipelineStep)>,
    fallback: Option<PipelineStep>,
}

impl ConditionalPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when<F>(mut self, predicate: F, tool: Arc<dyn Tool>, params: Parameters) -> Self
    where
        F: Fn(&[ToolResult]) -> bool + Send + Sync + 'static,
    {
        self.branches
            .push((Box::new(predicate), PipelineStep::new(tool, params)));
        self
    }

    pub fn otherwise(mut self, tool: Arc<dyn Tool>, params: Parameters) -> Self {
        self.fallback = Some(PipelineStep::new(tool, params));
        self
    }

    pub async fn execute(&self, ctx: &ToolContext, previous: &[ToolResult]) -> ToolResult {
        let chosen = self
            .branches
            .iter()
            .find(|(predicate, _)| predicate(previous))
            .map(|(_, step)| step)
            .or(self.fallback.as_ref());

        match chosen {
            Some(step) => run_step(step.tool.as_ref(), ctx, &step.params).await,
            None => ToolResult::text("no condition matched and no default step"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParameterSchema, PropertySchema};
    use crate::tool::ToolSpec;
    use crate::tool::test_support::EchoTool;
    use async_trait::async_trait;
    use std::time::Duration;

    fn echo(name: &str) -> Arc<dyn Tool> {
        Arc::new(EchoTool::new(name))
    }

    fn say(text: &str) -> Parameters {
        Parameters::new().with("text", text)
    }

    fn failing() -> Parameters {
        Parameters::new().with("fail", true)
    }

    #[tokio::test]
    async fn sequential_stops_at_first_failure() {
        let pipeline = SequentialPipeline::new()
            .step(echo("first"), say("a"))
            .step(echo("second"), failing())
            .step(echo("third"), say("c"));

        let outcome = pipeline.execute(&ToolContext::default()).await;
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].success());
        assert!(!outcome.results[1].success());
        assert_eq!(outcome.results[1].metadata["tool"], "second");
        match outcome.error {
            Some(PipelineError::StepFailed { step, tool, .. }) => {
                assert_eq!(step, 2);
                assert_eq!(tool, "second");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sequential_can_continue_past_failures() {
        let pipeline = SequentialPipeline::new()
            .stop_on_error(false)
            .step(echo("first"), failing())
            .step(echo("second"), say("b"));

        let outcome = pipeline.execute(&ToolContext::default()).await;
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[1].success());
        assert!(matches!(outcome.error, Some(PipelineError::StepFailed { step: 1, .. })));
    }

    #[tokio::test]
    async fn sequential_passes_previous_data() {
        let pipeline = SequentialPipeline::new()
            .pass_previous_result(true)
            .step(echo("first"), say("hello"))
            .step(echo("second"), say("world"));

        let outcome = pipeline.execute(&ToolContext::default()).await;
        assert!(outcome.is_success());
        assert!(outcome.results[0].metadata.get("previous").is_none());
        assert_eq!(outcome.results[1].metadata["previous"], "hello");
    }

    #[tokio::test]
    async fn sequential_validates_before_executing() {
        let strict: Arc<dyn Tool> = Arc::new(EchoTool::with_spec(
            ToolSpec::new("strict", "testing", "Needs text").schema(
                ParameterSchema::object()
                    .property("text", PropertySchema::string("Text"))
                    .required(["text"]),
            ),
        ));
        let outcome = SequentialPipeline::new()
            .step(strict, Parameters::new())
            .execute(&ToolContext::default())
            .await;
        let err = outcome.results[0].error.clone().unwrap();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn sequential_honours_cancellation() {
        let ctx = ToolContext::default();
        ctx.cancellation.cancel();
        let outcome = SequentialPipeline::new()
            .step(echo("first"), say("a"))
            .execute(&ctx)
            .await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.error, Some(PipelineError::Cancelled { step: 1 }));
    }

    #[tokio::test]
    async fn parallel_reports_partial_success() {
        let pipeline = ParallelPipeline::new()
            .step(echo("first"), say("a"))
            .step(echo("second"), failing())
            .step(echo("third"), say("c"));

        let outcome = pipeline.execute(&ToolContext::default()).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results.iter().filter(|r| r.success()).count(), 2);
        assert_eq!(outcome.results[0].output, "a");
        assert_eq!(outcome.results[2].output, "c");

        let err = outcome.error.unwrap();
        assert!(err.to_string().contains("second"));
        assert!(matches!(err, PipelineError::WorkerFailed { step: 2, .. }));
    }

    struct SleepTool {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for SleepTool {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _ctx: &ToolContext, _params: &Parameters) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(ToolResult::text("slept"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn parallel_steps_overlap() {
        let sleeper: Arc<dyn Tool> = Arc::new(SleepTool {
            spec: ToolSpec::new("sleep", "testing", "Sleeps"),
        });
        let pipeline = (0..3).fold(ParallelPipeline::new(), |p, _| {
            p.step(Arc::clone(&sleeper), Parameters::new())
        });

        let started = tokio::time::Instant::now();
        let outcome = pipeline.execute(&ToolContext::default()).await;
        assert!(outcome.is_success());
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn conditional_picks_first_matching_branch() {
        let previous = vec![ToolResult::text("ok")];
        let pipeline = ConditionalPipeline::new()
            .when(|prev| prev.iter().any(|r| !r.success()), echo("repair"), say("fix"))
            .when(|prev| prev.iter().all(|r| r.success()), echo("report"), say("all good"))
            .otherwise(echo("fallback"), say("default"));

        let result = pipeline.execute(&ToolContext::default(), &previous).await;
        assert_eq!(result.output, "all good");
    }

    #[tokio::test]
    async fn conditional_falls_back_then_no_ops() {
        let never = |_: &[ToolResult]| false;
        let with_default = ConditionalPipeline::new()
            .when(never, echo("x"), say("x"))
            .otherwise(echo("fallback"), say("default"));
        let result = with_default.execute(&ToolContext::default(), &[]).await;
        assert_eq!(result.output, "default");

        let bare = ConditionalPipeline::new().when(never, echo("x"), say("x"));
        let result = bare.execute(&ToolContext::default(), &[]).await;
        assert!(result.success());
        assert_eq!(result.output, "no condition matched and no default step");
    }
}
