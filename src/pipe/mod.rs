//! The six pipe kinds a [`crate::pipeline::Pipeline`]'s `Flow` is built from, and the trait
//! that lets the driver and the diagram renderer treat them uniformly.

pub mod broadcast;
pub mod counters;
pub mod if_pipe;
pub mod iterator;
pub mod loop_pipe;
pub mod partition;
pub mod simple;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::counters::Counters;
use crate::value::Value;

/// Result type every user-supplied stage function returns.
pub type StageResult = Result<Value, PipelineError>;

/// `SimplePipe`'s resolver: one token in, one token out.
pub type Resolver = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, StageResult> + Send + Sync>;

/// Fans a token out to N sub-tokens (`Iterator`, `Loop`).
pub type Splitter = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<Vec<Value>, PipelineError>> + Send + Sync>;

/// Fans N result tokens back into one, given the original input token for context (`Iterator`,
/// `Loop`). Receives results in **chunk order only** — within a chunk, order is unspecified; see
/// [`iterator::Iterator`]'s documentation.
pub type Joiner = Arc<dyn Fn(RunContext, Value, Vec<Value>) -> BoxFuture<'static, StageResult> + Send + Sync>;

/// Labels a sub-token for tracing (`Iterator`, `Loop`).
pub type Tagger = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<String, PipelineError>> + Send + Sync>;

/// Joins a fixed-size or variable-size list of branch outputs into one token (`Broadcast`,
/// `PartitionPipe`).
pub type Merger = Arc<dyn Fn(RunContext, Vec<Value>) -> BoxFuture<'static, StageResult> + Send + Sync>;

/// Selects `TrueFlow` or `FalseFlow` (`IfPipe`).
pub type Decider = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<bool, PipelineError>> + Send + Sync>;

/// Labels a token for counter breakdowns (`IfPipe`, `PartitionPipe`).
pub type TrafficTagger = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<String, PipelineError>> + Send + Sync>;

/// Splits a token into one or more named parts (`PartitionPipe`).
pub type Partitioner = Arc<dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<Vec<(String, Value)>, PipelineError>> + Send + Sync>;

/// An ordered sequence of pipes; the output channel of pipe *i* is the input channel of pipe
/// *i+1*.
pub type Flow = Vec<Arc<dyn Pipe>>;

/// A capability: given a context and an input channel, returns an output channel and an error
/// channel. Every implementation must (a) let both channels close on every exit path — in this
/// crate that falls out of normal `Sender` drop semantics rather than an explicit close call,
/// (b) run its body through [`crate::plumbing::panic_trampoline`], and (c) honor
/// [`crate::breaker::Breaker`] cancellation at every send/receive.
#[async_trait]
pub trait Pipe: Send + Sync {
    /// Wires this pipe's body to `input`, returning its output and error channels.
    async fn connect(
        &self,
        ctx: RunContext,
        input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>);

    /// Display label, used by both diagram modes. Defaults to a type-derived name unless
    /// overridden at construction.
    fn label(&self) -> &str;

    /// Structural description consumed by the blueprint renderer.
    fn shape(&self) -> PipeShape<'_>;
}

/// What the blueprint renderer needs to know about a pipe's static structure. The trace renderer
/// doesn't use this — it walks the tracer's own node tree, which already carries labels and
/// timings independent of the `Flow` that produced them.
pub enum PipeShape<'a> {
    /// [`simple::SimplePipe`]: no sub-flows.
    Simple,
    /// [`broadcast::Broadcast`]: N fixed parallel sub-flows, fanned in by a merger.
    Broadcast {
        /// The fixed parallel sub-flows fanned out to.
        streams: &'a [Flow],
    },
    /// [`iterator::Iterator`]: one inner flow run over dynamically-split input, chunked by
    /// `max_p`.
    Iterator {
        /// The inner flow run over each batch item.
        stream: &'a Flow,
        /// The maximum number of items run concurrently, if bounded.
        max_p: Option<usize>,
    },
    /// [`if_pipe::IfPipe`]: a predicate branch with its own counters.
    If {
        /// The sub-flow taken when the predicate is true.
        true_flow: &'a Flow,
        /// The sub-flow taken when the predicate is false.
        false_flow: &'a Flow,
        /// Per-branch counters.
        counters: &'a Counters,
    },
    /// [`loop_pipe::Loop`]: like `Iterator`, but sequential.
    Loop {
        /// The inner flow run sequentially over each batch item.
        stream: &'a Flow,
    },
    /// [`partition::PartitionPipe`]: a named multi-way switch with its own counters.
    Partition {
        /// The named sub-flows routed to.
        paths: &'a indexmap::IndexMap<String, Flow>,
        /// Per-path counters.
        counters: &'a Counters,
    },
}

/// Wires an entire [`Flow`] in sequence, threading pipe *i*'s output into pipe *i+1*'s input, and
/// collecting every pipe's error channel along the way. Used both for a [`crate::pipeline::Pipeline`]'s
/// top-level flow and for each composite pipe's sub-flows.
pub(crate) async fn connect_flow(
    ctx: &RunContext,
    flow: &Flow,
    input: mpsc::Receiver<Value>,
) -> (mpsc::Receiver<Value>, Vec<mpsc::UnboundedReceiver<PipelineError>>) {
    let mut current = input;
    let mut errors = Vec::with_capacity(flow.len());
    for pipe in flow {
        let (next_out, next_err) = pipe.connect(ctx.clone(), current).await;
        current = next_out;
        errors.push(next_err);
    }
    (current, errors)
}

/// Derives a default label from a type name, stripping module path and generic parameters —
/// e.g. `conduit::pipe::simple::SimplePipe<F>` becomes `SimplePipe`. Used when a pipe is
/// constructed without an explicit label.
pub fn default_label<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_owned()
}
