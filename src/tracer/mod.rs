//! Execution tracer: an optional per-run recorder of what executed, in what order, for how
//! long, and with what notes attached.
//!
//! Tracing state does not live in a context-value map the way the system this runtime is
//! modelled on carries it; it is held explicitly on [`crate::context::RunContext`] as an
//! `Option<Arc<Tracer>>` plus the current branch/pointer scope. See [`crate::context`].

mod node;

pub use node::{Jotter, NoopJotter, NoopStopwatch, PipeId, Stopwatch, Terminal, TracerNode};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use indexmap::IndexMap;

use crate::diagram::skin::Skin;

/// Per-run execution record.
pub struct Tracer {
    name: String,
    start: Instant,
    skin: Skin,
    top_level: Mutex<IndexMap<PipeId, Arc<TracerNode>>>,
    source_notes: Mutex<Vec<String>>,
    sink_notes: Mutex<Vec<String>>,
}

impl Tracer {
    /// Starts a new, empty tracer for a run named `name`, rendered with `skin`.
    pub fn new(name: impl Into<String>, skin: Skin) -> Arc<Tracer> {
        Arc::new(Tracer {
            name: name.into(),
            start: Instant::now(),
            skin,
            top_level: Mutex::new(IndexMap::new()),
            source_notes: Mutex::new(Vec::new()),
            sink_notes: Mutex::new(Vec::new()),
        })
    }

    /// The run's name, as given to [`Tracer::new`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The skin used to render this run's trace diagram.
    pub fn skin(&self) -> &Skin {
        &self.skin
    }

    /// When the run started.
    pub fn started_at(&self) -> Instant {
        self.start
    }

    /// Top-level nodes (one per pipe in the main `Flow`) in the order they first executed.
    pub fn top_level_nodes(&self) -> Vec<Arc<TracerNode>> {
        self.top_level.lock().unwrap().values().cloned().collect()
    }

    /// Notes attached by the source via [`crate::context::RunContext::source_note`].
    pub fn source_notes(&self) -> Vec<String> {
        self.source_notes.lock().unwrap().clone()
    }

    /// Notes attached by the sink via [`crate::context::RunContext::sink_note`].
    pub fn sink_notes(&self) -> Vec<String> {
        self.sink_notes.lock().unwrap().clone()
    }

    fn register_top_level(&self, pipe_id: PipeId, node: Arc<TracerNode>) {
        // `entry().or_insert_with()` is the dedup: a pipe that is (re-)registered under the same
        // id keeps its first node rather than appending a duplicate.
        self.top_level
            .lock()
            .unwrap()
            .entry(pipe_id)
            .or_insert(node);
    }

    fn nth_top_level(&self, index: usize) -> Option<Arc<TracerNode>> {
        self.top_level.lock().unwrap().get_index(index).map(|(_, v)| v.clone())
    }
}

/// A branch scope opened by [`crate::context::RunContext::open_branch`]: the name under which
/// sub-nodes are recorded, and the parent node they're recorded against.
pub(crate) struct BranchScope {
    pub(crate) name: String,
    pub(crate) parent: Arc<TracerNode>,
}

/// Counts how many nodes have started within the current branch (or at the top level), so
/// [`crate::context::RunContext::with_note`] can find "the node that just started".
pub(crate) struct PointerScope {
    #[allow(dead_code)]
    pub(crate) name: String,
    pub(crate) counter: AtomicUsize,
}

impl PointerScope {
    pub(crate) fn root() -> Arc<PointerScope> {
        Arc::new(PointerScope {
            name: "root".to_owned(),
            counter: AtomicUsize::new(0),
        })
    }

    pub(crate) fn child(&self, branch_name: &str) -> Arc<PointerScope> {
        Arc::new(PointerScope {
            name: format!("{}.{}", self.name, branch_name),
            counter: AtomicUsize::new(0),
        })
    }
}

/// Creates a node for `pipe_id`/`label`, registers it under the current branch (or the tracer's
/// top-level list if there is none), and returns a stopwatch for it. Returns [`NoopStopwatch`]
/// if the run has no tracer attached.
pub(crate) fn trace_me(
    tracer: Option<&Arc<Tracer>>,
    branch: Option<&BranchScope>,
    pointer: &PointerScope,
    pipe_id: PipeId,
    label: impl Into<String>,
) -> (Box<dyn Stopwatch>, Option<Arc<TracerNode>>) {
    let Some(tracer) = tracer else {
        return (Box::new(NoopStopwatch), None);
    };
    let node = Arc::new(TracerNode::new(pipe_id, label));
    match branch {
        Some(scope) => scope.parent.push_branch_child(&scope.name, node.clone()),
        None => tracer.register_top_level(pipe_id, node.clone()),
    }
    pointer.counter.fetch_add(1, Ordering::SeqCst);
    (Box::new(node.clone()), Some(node))
}

/// Resolves the node most recently started in the given scope, for note attachment.
pub(crate) fn resolve_with_note_target(
    tracer: Option<&Arc<Tracer>>,
    branch: Option<&BranchScope>,
    pointer: &PointerScope,
) -> Option<Arc<TracerNode>> {
    let tracer = tracer?;
    let idx = pointer.counter.load(Ordering::SeqCst);
    if idx == 0 {
        return None;
    }
    match branch {
        Some(scope) => scope.parent.nth_branch_child(&scope.name, idx - 1),
        None => tracer.nth_top_level(idx - 1),
    }
}

pub(crate) fn push_source_note(tracer: &Arc<Tracer>, text: String) {
    tracer.source_notes.lock().unwrap().push(text);
}

pub(crate) fn push_sink_note(tracer: &Arc<Tracer>, text: String) {
    tracer.sink_notes.lock().unwrap().push(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_registration_is_ordered_and_deduped() {
        let tracer = Tracer::new("t", Skin::default());
        let id_a = PipeId::next();
        let id_b = PipeId::next();
        tracer.register_top_level(id_a, Arc::new(TracerNode::new(id_a, "a")));
        tracer.register_top_level(id_b, Arc::new(TracerNode::new(id_b, "b")));
        tracer.register_top_level(id_a, Arc::new(TracerNode::new(id_a, "a-again")));

        let nodes = tracer.top_level_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].label(), "a");
        assert_eq!(nodes[1].label(), "b");
    }
}
