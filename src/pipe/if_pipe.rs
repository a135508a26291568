//! A predicate branch: `Decider` picks `TrueFlow` or `FalseFlow`, with counters tracking the
//! split.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::counters::Counters;
use crate::pipe::{connect_flow, default_label, Decider, Flow, Pipe, PipeShape, TrafficTagger};
use crate::plumbing::{feed, merge_errors, panic_trampoline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Routes each input token through `true_flow` or `false_flow` based on `decider`, tallying
/// traffic (optionally broken down by `traffic_tagger`) in [`Counters`] as it goes.
pub struct IfPipe {
    id: PipeId,
    label: String,
    decider: Decider,
    true_flow: Flow,
    false_flow: Flow,
    traffic_tagger: Option<TrafficTagger>,
    counters: Arc<Counters>,
}

impl IfPipe {
    /// Builds an `IfPipe` with a default label.
    pub fn new(decider: Decider, true_flow: Flow, false_flow: Flow) -> Self {
        IfPipe {
            id: PipeId::next(),
            label: default_label::<IfPipe>(),
            decider,
            true_flow,
            false_flow,
            traffic_tagger: None,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Breaks down the true/false counters by a traffic tag derived from the input token.
    pub fn with_traffic_tagger(mut self, tagger: TrafficTagger) -> Self {
        self.traffic_tagger = Some(tagger);
        self
    }

    /// Builds an `IfPipe` with an explicit label.
    pub fn named(label: impl Into<String>, decider: Decider, true_flow: Flow, false_flow: Flow) -> Self {
        IfPipe {
            id: PipeId::next(),
            label: label.into(),
            decider,
            true_flow,
            false_flow,
            traffic_tagger: None,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Snapshot of the true/false split, by percentage of total traffic routed so far.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

#[async_trait]
impl Pipe for IfPipe {
    async fn connect(
        &self,
        ctx: RunContext,
        mut input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>) {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let pipe_id = self.id;
        let label = self.label.clone();
        let decider = self.decider.clone();
        let true_flow = self.true_flow.clone();
        let false_flow = self.false_flow.clone();
        let traffic_tagger = self.traffic_tagger.clone();
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

            let decision = panic_trampoline({
                let decider = decider.clone();
                let ctx = ctx.clone();
                let token = token.clone();
                async move { decider(ctx, token).await }
            })
            .await;

            let take_true_branch = match decision {
                Ok(decision) => decision,
                Err(err) => {
                    stopwatch.fail(&err);
                    ctx.breaker.cancel();
                    let _ = err_tx.send(err);
                    return;
                }
            };

            let tag = match &traffic_tagger {
                Some(tagger) => {
                    match panic_trampoline({
                        let tagger = tagger.clone();
                        let ctx = ctx.clone();
                        let token = token.clone();
                        async move { tagger(ctx, token).await }
                    })
                    .await
                    {
                        Ok(tag) => Some(tag),
                        Err(err) => {
                            stopwatch.fail(&err);
                            ctx.breaker.cancel();
                            let _ = err_tx.send(err);
                            return;
                        }
                    }
                }
                None => None,
            };

            let branch_name = if take_true_branch { "true" } else { "false" };
            counters.record(branch_name, tag.as_deref());

            let qualified_branch_name = format!("{label}#{branch_name}");
            let branch_ctx = ctx.open_branch(node.clone(), &qualified_branch_name);
            let flow = if take_true_branch { &true_flow } else { &false_flow };
            let (feed_tx, feed_rx) = mpsc::channel(1);
            let (mut flow_out, flow_err) = connect_flow(&branch_ctx, flow, feed_rx).await;
            let mut flow_err = merge_errors(flow_err);
            feed(&branch_ctx.breaker, feed_tx, token).await;

            tokio::select! {
                value = flow_out.recv() => {
                    if let Some(value) = value {
                        stopwatch.done();
                        feed(&ctx.breaker, out_tx, value).await;
                    } else {
                        stopwatch.cancelled();
                    }
                }
                err = flow_err.recv() => {
                    if let Some(err) = err {
                        stopwatch.fail(&err);
                        ctx.breaker.cancel();
                        let _ = err_tx.send(err);
                    } else {
                        stopwatch.cancelled();
                    }
                }
            }
        });

        (out_rx, err_rx)
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn shape(&self) -> PipeShape<'_> {
        PipeShape::If {
            true_flow: &self.true_flow,
            false_flow: &self.false_flow,
            counters: &self.counters,
        }
    }
}
