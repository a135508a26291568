//! Process-wide-ish settings, folded into a single value threaded through `run` instead of
//! living as module-level globals.

use std::sync::Arc;

use crate::context::RunContext;

/// Hook invoked every time a branch is opened, letting a host enrich the child [`RunContext`]
/// (e.g. attach a request id, a deadline, or additional tracing fields) before sub-flows run.
pub type CtxBranchHook = Arc<dyn Fn(&RunContext, &str) -> RunContext + Send + Sync>;

/// Settings that applied to every run in the source this runtime is modelled on, expressed here
/// as plain values passed to [`crate::pipeline::run`] rather than statics.
#[derive(Clone, Default)]
pub struct RuntimeOptions {
    /// When true, [`crate::link::link`] encrypts the diagram payload before hex-encoding it.
    /// When false, callers may skip straight to the compressed+base64 form.
    pub encrypted_mode: bool,
    /// Default `max_p` for an [`crate::pipe::iterator::Iterator`] pipe that doesn't set its own.
    pub default_max_p: Option<usize>,
    /// Enriches a child context whenever a branch opens. See [`CtxBranchHook`].
    pub ctx_branch: Option<CtxBranchHook>,
}

impl RuntimeOptions {
    /// Default options: unencrypted links, no default parallelism cap, no branch hook.
    pub fn new() -> Self {
        RuntimeOptions::default()
    }

    /// Builder form of [`RuntimeOptions::encrypted_mode`].
    pub fn with_encrypted_mode(mut self, on: bool) -> Self {
        self.encrypted_mode = on;
        self
    }

    /// Builder form of [`RuntimeOptions::default_max_p`].
    pub fn with_default_max_p(mut self, max_p: usize) -> Self {
        self.default_max_p = Some(max_p);
        self
    }

    /// Builder form of [`RuntimeOptions::ctx_branch`].
    pub fn with_ctx_branch(mut self, hook: CtxBranchHook) -> Self {
        self.ctx_branch = Some(hook);
        self
    }
}
