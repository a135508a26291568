//! The error vocabulary shared by the runtime, the demo stages, and the HTTP adapter.

use thiserror::Error;

/// Everything that can go wrong while building, configuring, or running a [`crate::pipeline::Pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A user-supplied resolver, splitter, joiner, merger, decider, or partitioner returned an error.
    #[error("stage error: {0}")]
    Stage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A pipe body panicked; the payload's best-effort string form is preserved.
    ///
    /// The literal prefix is load-bearing: callers (and tests) match on it.
    #[error("panic recovered: {0}")]
    Panic(String),

    /// A stage received a [`crate::value::Value`] that did not hold the shape it expected.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the shape the stage tried to extract.
        expected: &'static str,
        /// Name of the shape that was actually present.
        found: &'static str,
    },

    /// The run was cancelled before producing a value, with no other error collected first.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Configuration failed to load or parse.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wraps any `std::error::Error` as a [`PipelineError::Stage`].
    pub fn stage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PipelineError::Stage(Box::new(err))
    }

    /// True if this is the panic variant.
    pub fn is_panic(&self) -> bool {
        matches!(self, PipelineError::Panic(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
