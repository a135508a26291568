//! A named multi-way switch: a `Partitioner` slices one token into named parts, each routed
//! flow runs on whichever parts match its name, and a `Merger` joins the outputs.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::counters::Counters;
use crate::pipe::{connect_flow, default_label, Flow, Merger, Partitioner, Pipe, PipeShape};
use crate::plumbing::{fan_in, feed, merge_errors, panic_trampoline, wait_for_pipeline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Splits one input token into an arbitrary number of named parts via `partitioner`, routes
/// each part whose name has an entry in `paths` through that path's flow, and joins whatever
/// comes back with `merger`.
///
/// `counters` tallies every part the partitioner emits, including parts whose name has no entry
/// in `paths` — it answers "how much traffic was tagged with this name", not "how much traffic
/// a matching flow executed". A partitioner that emits a part with no matching path is not a
/// bug: that traffic is simply dropped before the merge, and the counters make it visible.
pub struct PartitionPipe {
    id: PipeId,
    label: String,
    partitioner: Partitioner,
    paths: IndexMap<String, Flow>,
    merger: Merger,
    counters: Arc<Counters>,
}

impl PartitionPipe {
    /// Builds a `PartitionPipe` with a default label.
    pub fn new(partitioner: Partitioner, paths: IndexMap<String, Flow>, merger: Merger) -> Self {
        PartitionPipe {
            id: PipeId::next(),
            label: default_label::<PartitionPipe>(),
            partitioner,
            paths,
            merger,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Builds a `PartitionPipe` with an explicit label.
    pub fn named(
        label: impl Into<String>,
        partitioner: Partitioner,
        paths: IndexMap<String, Flow>,
        merger: Merger,
    ) -> Self {
        PartitionPipe {
            id: PipeId::next(),
            label: label.into(),
            partitioner,
            paths,
            merger,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Snapshot of traffic routed to each part name so far, including unrouted names.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

#[async_trait]
impl Pipe for PartitionPipe {
    async fn connect(
        &self,
        ctx: RunContext,
        mut input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>) {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let pipe_id = self.id;
        let label = self.label.clone();
        let partitioner = self.partitioner.clone();
        let paths = self.paths.clone();
        let merger = self.merger.clone();
        let counters = self.counters.clone();

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

            let parts = match panic_trampoline({
                let partitioner = partitioner.clone();
                let ctx = ctx.clone();
                let token = token.clone();
                async move { partitioner(ctx, token).await }
            })
            .await
            {
                Ok(parts) => parts,
                Err(err) => {
                    stopwatch.fail(&err);
                    ctx.breaker.cancel();
                    let _ = err_tx.send(err);
                    return;
                }
            };

            let mut routed_outputs = Vec::new();
            let mut routed_errors = Vec::new();
            let mut routed_count = 0usize;

            for (name, part_value) in parts {
                counters.record(&name, None);
                let Some(path_flow) = paths.get(&name) else {
                    continue;
                };
                routed_count += 1;
                let branch_ctx = ctx.open_branch(node.clone(), &name);
                let (feed_tx, feed_rx) = mpsc::channel(1);
                let (flow_out, flow_err) = connect_flow(&branch_ctx, path_flow, feed_rx).await;
                feed(&branch_ctx.breaker, feed_tx, part_value).await;
                routed_outputs.push(flow_out);
                routed_errors.extend(flow_err);
            }

            let mut merged_outputs = fan_in(&ctx.breaker, routed_outputs);
            let errors_done = tokio::spawn(wait_for_pipeline(merge_errors(routed_errors)));

            let mut collected = Vec::with_capacity(routed_count);
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

            if collected.len() < routed_count {
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
        PipeShape::Partition {
            paths: &self.paths,
            counters: &self.counters,
        }
    }
}
