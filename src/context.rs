//! Explicit run-scoped context, replacing the pervasive context-with-values pattern of the
//! system this runtime is modelled on: rather than stashing the tracer, the current branch, the
//! current parent node, and a stage pointer behind string keys in a heterogeneous map, every one
//! of those is a typed field here, threaded by value (cheaply: everything heavy is `Arc`-backed).

use std::sync::Arc;

use crate::breaker::Breaker;
use crate::runtime_options::RuntimeOptions;
use crate::tracer::{
    self, BranchScope, Jotter, NoopJotter, NoopStopwatch, PipeId, PointerScope, Stopwatch, Tracer,
    TracerNode,
};
use crate::value::Value;

/// Everything a pipe needs besides its input token: the breaker, the (optional) tracer and its
/// current branch/pointer scope, and the run's [`RuntimeOptions`].
#[derive(Clone)]
pub struct RunContext {
    /// Per-run cancellation handle, shared by every task spawned during the run.
    pub breaker: Breaker,
    tracer: Option<Arc<Tracer>>,
    branch: Option<Arc<BranchScope>>,
    pointer: Arc<PointerScope>,
    /// Run-wide settings (encryption mode, default parallelism, branch enrichment hook).
    pub options: Arc<RuntimeOptions>,
    iterator_parent: Option<Arc<(Value, RunContext)>>,
}

impl RunContext {
    /// Builds the root context for a run: no branch, no parent, a fresh top-level pointer.
    pub fn root(breaker: Breaker, tracer: Option<Arc<Tracer>>, options: Arc<RuntimeOptions>) -> Self {
        RunContext {
            breaker,
            tracer,
            branch: None,
            pointer: PointerScope::root(),
            options,
            iterator_parent: None,
        }
    }

    /// True if this run has a tracer attached.
    pub fn tracer_on(&self) -> bool {
        self.tracer.is_some()
    }

    pub(crate) fn tracer(&self) -> Option<&Arc<Tracer>> {
        self.tracer.as_ref()
    }

    /// Creates a node for `pipe_id` under the current branch (or the tracer's top level),
    /// returning a stopwatch to drive its lifecycle and, if tracing is enabled, the node itself
    /// (needed by pipes that open branches of their own, e.g. [`crate::pipe::broadcast::Broadcast`]).
    pub fn trace_me(
        &self,
        pipe_id: PipeId,
        label: impl Into<String>,
    ) -> (Box<dyn Stopwatch>, Option<Arc<TracerNode>>) {
        tracer::trace_me(
            self.tracer.as_ref(),
            self.branch.as_deref(),
            &self.pointer,
            pipe_id,
            label,
        )
    }

    /// Opens a branch named `name` under `root` (this pipe's own tracer node), returning a child
    /// context whose notes and sub-traces are recorded under that branch. If tracing is disabled
    /// or `root` is `None` (tracing enabled but this pipe didn't register a node), returns a
    /// plain clone: nothing will be recorded, but the context stays otherwise valid to pass down.
    pub fn open_branch(&self, root: Option<Arc<TracerNode>>, name: &str) -> RunContext {
        let Some(root) = root else {
            return self.clone();
        };
        let branch = Arc::new(BranchScope {
            name: name.to_owned(),
            parent: root,
        });
        let pointer = self.pointer.child(name);
        let child = RunContext {
            breaker: self.breaker.clone(),
            tracer: self.tracer.clone(),
            branch: Some(branch),
            pointer,
            options: self.options.clone(),
            iterator_parent: self.iterator_parent.clone(),
        };
        match &self.options.ctx_branch {
            Some(hook) => hook(&child, name),
            None => child,
        }
    }

    /// Attaches `token` and this context as the "parent" seen by a sub-flow spawned by
    /// [`crate::pipe::iterator::Iterator`] or [`crate::pipe::loop_pipe::Loop`].
    pub fn with_iterator_parent(&self, token: Value) -> RunContext {
        let mut child = self.clone();
        child.iterator_parent = Some(Arc::new((token, self.clone())));
        child
    }

    /// Retrieves the token and parent context attached by [`RunContext::with_iterator_parent`],
    /// if this context was derived from an iterator/loop sub-flow.
    pub fn iterator_parent(&self) -> Option<(&Value, &RunContext)> {
        self.iterator_parent
            .as_deref()
            .map(|(token, ctx)| (token, ctx))
    }

    /// A jotter for attaching free-text notes to the run as a whole (rendered at the top of the
    /// trace diagram), meant to be called once from the Source.
    pub fn source_note(&self) -> Box<dyn Jotter> {
        match &self.tracer {
            Some(tracer) => Box::new(RunNoteSink {
                tracer: tracer.clone(),
                sink: RunNoteKind::Source,
            }),
            None => Box::new(NoopJotter),
        }
    }

    /// A jotter for attaching free-text notes to the run as a whole, meant to be called once
    /// from the Sink.
    pub fn sink_note(&self) -> Box<dyn Jotter> {
        match &self.tracer {
            Some(tracer) => Box::new(RunNoteSink {
                tracer: tracer.clone(),
                sink: RunNoteKind::Sink,
            }),
            None => Box::new(NoopJotter),
        }
    }

    /// A jotter for the node that most recently started in the current branch (or top level),
    /// letting a stage body attach a note to its own tracer entry without holding a
    /// [`Stopwatch`] handle.
    pub fn with_note(&self) -> Box<dyn Jotter> {
        match tracer::resolve_with_note_target(self.tracer.as_ref(), self.branch.as_deref(), &self.pointer) {
            Some(node) => Box::new(node),
            None => Box::new(NoopJotter),
        }
    }
}

/// A stopwatch that never records anything; exported for pipes that need a placeholder value of
/// the right type outside of [`RunContext::trace_me`] (e.g. in tests).
pub fn noop_stopwatch() -> Box<dyn Stopwatch> {
    Box::new(NoopStopwatch)
}

enum RunNoteKind {
    Source,
    Sink,
}

struct RunNoteSink {
    tracer: Arc<Tracer>,
    sink: RunNoteKind,
}

impl Jotter for RunNoteSink {
    fn note(&self, text: String) {
        match self.sink {
            RunNoteKind::Source => tracer::push_source_note(&self.tracer, text),
            RunNoteKind::Sink => tracer::push_sink_note(&self.tracer, text),
        }
    }
}
