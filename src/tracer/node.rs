//! Per-pipe execution record and the stopwatch/jotter views over it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use indexmap::IndexMap;

use crate::error::PipelineError;

/// Identifies a pipe instance for the lifetime of the process, used to deduplicate a pipe's
/// node in the tracer's top-level list if it is ever registered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(usize);

impl PipeId {
    /// Allocates a fresh, process-unique id.
    pub fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        PipeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Terminal state of a traced node. `new` and `start` are not terminal; exactly one of these
/// three is reached before the node is read by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// Finished normally.
    Done,
    /// The breaker was cancelled before this node could finish.
    Cancelled,
    /// The node's resolver returned an error or panicked.
    Failed(String),
}

/// One executed pipe's record: timing, terminal state, notes, and the sub-nodes of any branches
/// it opened.
pub struct TracerNode {
    pipe_id: PipeId,
    label: String,
    start: Mutex<Option<Instant>>,
    end: Mutex<Option<Instant>>,
    terminal: Mutex<Option<Terminal>>,
    notes: Mutex<Vec<String>>,
    /// Branch name -> ordered sub-nodes. Insertion-ordered so rendering never needs a secondary
    /// sort by timestamp to get a stable, human-meaningful order.
    branches: Mutex<IndexMap<String, Vec<Arc<TracerNode>>>>,
}

impl TracerNode {
    pub(crate) fn new(pipe_id: PipeId, label: impl Into<String>) -> Self {
        TracerNode {
            pipe_id,
            label: label.into(),
            start: Mutex::new(None),
            end: Mutex::new(None),
            terminal: Mutex::new(None),
            notes: Mutex::new(Vec::new()),
            branches: Mutex::new(IndexMap::new()),
        }
    }

    /// Identity of the pipe that produced this node.
    pub fn pipe_id(&self) -> PipeId {
        self.pipe_id
    }

    /// The pipe's display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Wall-clock duration between start and end, if both were recorded.
    pub fn duration(&self) -> Option<std::time::Duration> {
        let start = (*self.start.lock().unwrap())?;
        let end = (*self.end.lock().unwrap())?;
        Some(end.saturating_duration_since(start))
    }

    /// The terminal state, if the node reached one.
    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal.lock().unwrap().clone()
    }

    /// Notes attached via [`crate::tracer::Jotter::note`].
    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().unwrap().clone()
    }

    /// Sub-nodes recorded under `branch_name`, in insertion order.
    pub fn branch(&self, branch_name: &str) -> Vec<Arc<TracerNode>> {
        self.branches
            .lock()
            .unwrap()
            .get(branch_name)
            .cloned()
            .unwrap_or_default()
    }

    /// All branch names this node opened, in the order they were first opened.
    pub fn branch_names(&self) -> Vec<String> {
        self.branches.lock().unwrap().keys().cloned().collect()
    }

    pub(crate) fn push_branch_child(&self, branch_name: &str, child: Arc<TracerNode>) {
        self.branches
            .lock()
            .unwrap()
            .entry(branch_name.to_owned())
            .or_default()
            .push(child);
    }

    pub(crate) fn nth_branch_child(&self, branch_name: &str, index: usize) -> Option<Arc<TracerNode>> {
        self.branches
            .lock()
            .unwrap()
            .get(branch_name)?
            .get(index)
            .cloned()
    }
}

/// Records the `new -> start -> {done, cancelled, fail}` lifecycle of a traced pipe invocation.
///
/// Disabled tracing (no tracer attached to the run) is modelled by [`NoopStopwatch`], so call
/// sites never need to branch on whether tracing is active.
pub trait Stopwatch: Send + Sync {
    /// Marks the node as started. Called once, immediately before the resolver runs.
    fn start(&self);
    /// Marks the node as finished normally.
    fn done(&self);
    /// Marks the node as cancelled (the breaker fired before this pipe produced output).
    fn cancelled(&self);
    /// Marks the node as failed, recording the error's display text.
    fn fail(&self, err: &PipelineError);
}

impl Stopwatch for Arc<TracerNode> {
    fn start(&self) {
        *self.start.lock().unwrap() = Some(Instant::now());
    }

    fn done(&self) {
        *self.end.lock().unwrap() = Some(Instant::now());
        *self.terminal.lock().unwrap() = Some(Terminal::Done);
    }

    fn cancelled(&self) {
        *self.end.lock().unwrap() = Some(Instant::now());
        *self.terminal.lock().unwrap() = Some(Terminal::Cancelled);
    }

    fn fail(&self, err: &PipelineError) {
        *self.end.lock().unwrap() = Some(Instant::now());
        *self.terminal.lock().unwrap() = Some(Terminal::Failed(err.to_string()));
    }
}

/// A stopwatch that discards every call, used when no tracer is attached to the run.
pub struct NoopStopwatch;

impl Stopwatch for NoopStopwatch {
    fn start(&self) {}
    fn done(&self) {}
    fn cancelled(&self) {}
    fn fail(&self, _err: &PipelineError) {}
}

/// Lets a stage body attach free-text notes to a tracer node without holding a [`Stopwatch`]
/// handle directly (see [`crate::context::RunContext::with_note`]).
///
/// Takes an owned `String` rather than `impl Into<String>` so the trait stays object-safe —
/// every call site is `Box<dyn Jotter>`, and a generic method would drop out of the vtable.
pub trait Jotter: Send + Sync {
    /// Appends `text` to the node's note list.
    fn note(&self, text: String);
}

impl Jotter for Arc<TracerNode> {
    fn note(&self, text: String) {
        self.notes.lock().unwrap().push(text);
    }
}

/// A jotter that discards every note, used when there is nothing to attach to (no tracer, or no
/// node yet started in the current branch).
pub struct NoopJotter;

impl Jotter for NoopJotter {
    fn note(&self, _text: String) {}
}

