//! The single-stage pipe: one resolver, one input, one output.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::{default_label, Pipe, PipeShape, Resolver};
use crate::plumbing::{feed, panic_trampoline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Awaits one input token, invokes its resolver, and writes one output token.
///
/// On a closed input with no token ever received, the pipe marks its tracer node cancelled and
/// exits without emitting. On a resolver error or panic, it pushes the error (which, via
/// [`crate::breaker::Breaker::cancel`], tears down the rest of the run) and does not emit.
pub struct SimplePipe {
    id: PipeId,
    label: String,
    resolver: Resolver,
}

impl SimplePipe {
    /// Builds a `SimplePipe` with a default, type-derived label.
    pub fn new(resolver: Resolver) -> Self {
        SimplePipe {
            id: PipeId::next(),
            label: default_label::<SimplePipe>(),
            resolver,
        }
    }

    /// Builds a `SimplePipe` with an explicit label, shown in both diagram modes.
    pub fn named(label: impl Into<String>, resolver: Resolver) -> Self {
        SimplePipe {
            id: PipeId::next(),
            label: label.into(),
            resolver,
        }
    }
}

#[async_trait]
impl Pipe for SimplePipe {
    async fn connect(
        &self,
        ctx: RunContext,
        mut input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>) {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let resolver = self.resolver.clone();
        let pipe_id = self.id;
        let label = self.label.clone();

        tokio::spawn(async move {
            let (stopwatch, _node) = ctx.trace_me(pipe_id, label);
            let mut cancel_rx = ctx.breaker.subscribe();
            let received = tokio::select! {
                item = input.recv() => item,
                _ = cancelled(&mut cancel_rx) => None,
            };

            let Some(token) = received else {
                stopwatch.cancelled();
                return;
            };

            stopwatch.start();
            let breaker = ctx.breaker.clone();
            let result = panic_trampoline({
                let resolver = resolver.clone();
                let ctx = ctx.clone();
                async move { resolver(ctx, token).await }
            })
            .await;

            match result {
                Ok(value) => {
                    stopwatch.done();
                    feed(&breaker, out_tx, value).await;
                }
                Err(err) => {
                    stopwatch.fail(&err);
                    breaker.cancel();
                    let _ = err_tx.send(err);
                }
            }
        });

        (out_rx, err_rx)
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn shape(&self) -> PipeShape<'_> {
        PipeShape::Simple
    }
}
