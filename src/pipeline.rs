//! The pipeline descriptor and the `run`/`run_with_tracer` drivers that execute it.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::breaker::Breaker;
use crate::context::RunContext;
use crate::diagram::skin::Skin;
use crate::error::PipelineError;
use crate::pipe::{connect_flow, Flow, Resolver};
use crate::plumbing::{feed, merge_errors, panic_trampoline, wait_for_pipeline};
use crate::runtime_options::RuntimeOptions;
use crate::tracer::{Jotter, Tracer};
use crate::value::Value;

/// Transforms the run's input token before it enters the `Flow`. Same shape as a
/// [`crate::pipe::Resolver`]: one token in, one token out.
pub type Source = Resolver;

/// Transforms the `Flow`'s final token (or an early-exit value) into the run's result.
pub type Sink = Resolver;

/// Immutable descriptor for one runnable graph: a name, a [`Source`], an ordered [`Flow`] of
/// pipes, a [`Sink`], and the two skins used when rendering this pipeline's diagrams.
pub struct Pipeline {
    /// Human-readable name, used as the tracer's run name and the diagram title.
    pub name: String,
    /// Free-text description, rendered as a diagram header comment.
    pub description: String,
    /// Transforms the run's input before the `Flow` sees it.
    pub source: Source,
    /// The ordered sequence of pipes this pipeline wires together.
    pub flow: Flow,
    /// Transforms the `Flow`'s output (or an early-exit value) into the run's result.
    pub sink: Sink,
    /// Skin used when rendering this pipeline's static blueprint.
    pub blueprint_skin: Skin,
    /// Skin used when rendering this pipeline's execution trace.
    pub trace_skin: Skin,
    /// Optional free-text note attached once, at the source, when tracing is enabled.
    pub source_note: Option<String>,
    /// Optional free-text note attached once, at the sink, when tracing is enabled.
    pub sink_note: Option<String>,
}

impl Pipeline {
    /// Renders this pipeline's static blueprint diagram (no execution required).
    pub fn diagram(&self) -> String {
        crate::diagram::blueprint::render(self)
    }
}

/// Runs `pipeline` against `input`. If `traced` is set, a fresh [`Tracer`] is attached to the
/// run's context (retrievable afterwards only through [`run_with_tracer`], which also encodes
/// it as a link).
pub async fn run(
    options: Arc<RuntimeOptions>,
    pipeline: &Pipeline,
    input: Value,
    traced: bool,
) -> Result<Value, PipelineError> {
    let tracer = traced.then(|| Tracer::new(pipeline.name.clone(), pipeline.trace_skin.clone()));
    run_inner(options, pipeline, input, tracer).await.map(|(value, _)| value)
}

/// Runs `pipeline` with tracing always enabled, returning both the result and the encoded
/// PlantUML link for the resulting trace diagram.
pub async fn run_with_tracer(
    options: Arc<RuntimeOptions>,
    pipeline: &Pipeline,
    input: Value,
) -> Result<(Value, String), PipelineError> {
    let encrypted_mode = options.encrypted_mode;
    let tracer = Tracer::new(pipeline.name.clone(), pipeline.trace_skin.clone());
    let (value, tracer) = run_inner(options, pipeline, input, Some(tracer)).await?;
    let tracer = tracer.expect("run_with_tracer always attaches a tracer");
    let diagram = crate::diagram::trace::render(&tracer);
    let link = crate::link::link(&diagram, encrypted_mode);
    Ok((value, link))
}

async fn run_inner(
    options: Arc<RuntimeOptions>,
    pipeline: &Pipeline,
    input: Value,
    tracer: Option<Arc<Tracer>>,
) -> Result<(Value, Option<Arc<Tracer>>), PipelineError> {
    let (breaker, early_exit_rx) = Breaker::new();
    let ctx = RunContext::root(breaker.clone(), tracer.clone(), options);

    if let Some(note) = &pipeline.source_note {
        ctx.source_note().note(note.clone());
    }

    let source_value = panic_trampoline({
        let source = pipeline.source.clone();
        let ctx = ctx.clone();
        async move { source(ctx, input).await }
    })
    .await?;

    let (feed_tx, feed_rx) = mpsc::channel(1);
    let (mut flow_out, flow_errors) = connect_flow(&ctx, &pipeline.flow, feed_rx).await;
    let merged_errors = merge_errors(flow_errors);
    let errors_done = tokio::spawn(wait_for_pipeline(merged_errors));
    feed(&breaker, feed_tx, source_value).await;

    let mut early_exit_rx = early_exit_rx;
    let final_value: Option<Value> = tokio::select! {
        biased;
        early = &mut early_exit_rx => {
            // An early exit short-circuits the wait for the flow's own completion; the
            // residual error-merging task is left to finish on its own rather than blocking
            // the sink on stages the early exit has already made moot.
            breaker.cancel();
            early.ok()
        }
        value = flow_out.recv() => {
            if let Some(err) = errors_done.await.ok().flatten() {
                return Err(err);
            }
            value
        }
    };

    let Some(final_value) = final_value else {
        return Err(PipelineError::Cancelled(format!(
            "pipeline {:?} produced no output",
            pipeline.name
        )));
    };

    let result = panic_trampoline({
        let sink = pipeline.sink.clone();
        let ctx = ctx.clone();
        async move { sink(ctx, final_value).await }
    })
    .await?;

    if let Some(note) = &pipeline.sink_note {
        ctx.sink_note().note(note.clone());
    }

    Ok((result, tracer))
}
