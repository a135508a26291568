//! Fan-out to a fixed set of sub-flows, fanned back in by a merger.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::{connect_flow, default_label, Flow, Merger, Pipe, PipeShape};
use crate::plumbing::{fan_in, feed, merge_errors, panic_trampoline, wait_for_pipeline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Observes the same input token with N independent sub-flows, then joins their outputs with a
/// [`Merger`]. Used, for instance, to query availability and pricing concurrently for the same
/// product before combining both into one enriched record.
pub struct Broadcast {
    id: PipeId,
    label: String,
    streams: Vec<Flow>,
    merger: Merger,
}

impl Broadcast {
    /// Builds a `Broadcast` over `streams`, joined by `merger`, with a default label.
    pub fn new(streams: Vec<Flow>, merger: Merger) -> Self {
        Broadcast {
            id: PipeId::next(),
            label: default_label::<Broadcast>(),
            streams,
            merger,
        }
    }

    /// Builds a `Broadcast` with an explicit label.
    pub fn named(label: impl Into<String>, streams: Vec<Flow>, merger: Merger) -> Self {
        Broadcast {
            id: PipeId::next(),
            label: label.into(),
            streams,
            merger,
        }
    }
}

#[async_trait]
impl Pipe for Broadcast {
    async fn connect(
        &self,
        ctx: RunContext,
        mut input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>) {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let pipe_id = self.id;
        let label = self.label.clone();
        let streams = self.streams.clone();
        let merger = self.merger.clone();
        let stream_count = streams.len();

        tokio::spawn(async move {
            let (stopwatch, node) = ctx.trace_me(pipe_id, label.clone());
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

            let mut flow_outputs = Vec::with_capacity(stream_count);
            let mut flow_errors = Vec::with_capacity(stream_count);
            for (index, sub_flow) in streams.iter().enumerate() {
                let branch_name = format!("{label}#{index}");
                let branch_ctx = ctx.open_branch(node.clone(), &branch_name);
                let (feed_tx, feed_rx) = mpsc::channel(1);
                let (flow_out, flow_err) = connect_flow(&branch_ctx, sub_flow, feed_rx).await;
                feed(&branch_ctx.breaker, feed_tx, token.clone()).await;
                flow_outputs.push(flow_out);
                flow_errors.extend(flow_err);
            }

            let mut merged_outputs = fan_in(&ctx.breaker, flow_outputs);
            let errors_done = tokio::spawn(wait_for_pipeline(merge_errors(flow_errors)));

            let mut collected = Vec::with_capacity(stream_count);
            while let Some(value) = merged_outputs.recv().await {
                collected.push(value);
            }
            let first_error = errors_done.await.ok().flatten();

            if let Some(err) = first_error {
                stopwatch.fail(&err);
                ctx.breaker.cancel();
                let _ = err_tx.send(err);
                return;
            }

            if collected.len() < stream_count {
                stopwatch.cancelled();
                return;
            }

            let merge_result = panic_trampoline({
                let merger = merger.clone();
                let ctx = ctx.clone();
                async move { merger(ctx, collected).await }
            })
            .await;

            match merge_result {
                Ok(value) => {
                    stopwatch.done();
                    feed(&ctx.breaker, out_tx, value).await;
                }
                Err(err) => {
                    stopwatch.fail(&err);
                    ctx.breaker.cancel();
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
        PipeShape::Broadcast {
            streams: &self.streams,
        }
    }
}
