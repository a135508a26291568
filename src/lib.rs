//! # conduit
//!
//! `conduit` is a composable concurrent dataflow runtime for Rust: pipelines of typed pipes,
//! wired source to sink, with cooperative cancellation, optional execution tracing, and diagram
//! export. It is an abstraction over `tokio`, not a replacement for it — if you don't need a
//! reusable pipeline topology, reach for `tokio` directly.
//!
//! A [`pipeline::Pipeline`] has a [`pipeline::Source`], an ordered [`pipe::Flow`] of pipes, and a
//! [`pipeline::Sink`]. Six pipe kinds cover the shapes a dataflow graph needs:
//!
//! - [`pipe::simple::SimplePipe`] — one resolver, one token in, one token out.
//! - [`pipe::broadcast::Broadcast`] — fans one token out to N fixed sub-flows, joined by a merger.
//! - [`pipe::iterator::Iterator`] — splits one token into a dynamically-sized batch, runs an
//!   inner flow over it with bounded parallelism, joins the results.
//! - [`pipe::if_pipe::IfPipe`] — routes to one of two sub-flows based on a predicate, with
//!   per-branch counters.
//! - [`pipe::loop_pipe::Loop`] — like `Iterator`, but strictly sequential.
//! - [`pipe::partition::PartitionPipe`] — routes a token's parts across a named set of sub-flows.
//!
//! A [`breaker::Breaker`] gives every run cooperative cancellation and a one-shot early-exit
//! channel. A [`tracer::Tracer`] records per-pipe timings and notes when attached, feeding the
//! [`diagram`] renderer and the [`link`] encoder that turns a rendered diagram into a
//! `plantuml.com` URL.
//!
//! The [`stages`] module hosts a demo workload (concurrent product enrichment) built on top of
//! these primitives, served over HTTP by the `conduit-server` binary via [`http`].

#![deny(missing_docs)]

/// The error vocabulary shared across the runtime, the demo stages, and the HTTP adapter.
pub mod error;

/// The token type that flows between pipes.
pub mod value;

/// Per-run cancellation and early-exit.
pub mod breaker;

/// Run-wide settings threaded through every pipeline invocation.
pub mod runtime_options;

/// Explicit run-scoped context threaded through every pipe.
pub mod context;

/// Shared plumbing: panic trampolines, fan-in, error merging, cancellation-aware sends.
pub mod plumbing;

/// Execution tracing: per-pipe timings, notes, and the branch tree they're recorded under.
pub mod tracer;

/// The six pipe kinds and the trait that lets the driver and diagram renderer treat them
/// uniformly.
pub mod pipe;

/// The pipeline descriptor and its `run`/`run_with_tracer` drivers.
pub mod pipeline;

/// Renders a pipeline's static blueprint or a run's execution trace as PlantUML activity-diagram
/// text.
pub mod diagram;

/// Encodes a rendered diagram as a `plantuml.com` link, optionally AES-encrypted.
pub mod link;

/// Startup configuration: worker count, bind address, log filter.
pub mod config;

/// Installs the process's `tracing` subscriber.
pub mod logging;

/// The demo enrichment workload built on top of the runtime primitives above.
pub mod stages;

/// The HTTP adapter serving the demo workload.
pub mod http;
