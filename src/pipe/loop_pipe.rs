//! Like [`crate::pipe::iterator::Iterator`], but sequential: one sub-token runs the inner flow
//! to completion before the next one starts.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::{connect_flow, default_label, Flow, Joiner, Pipe, PipeShape, Splitter};
use crate::plumbing::{feed, merge_errors, panic_trampoline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Fans one token out into a batch via `splitter`, runs `stream` over each element in order —
/// never more than one in flight at a time — and joins the results with `joiner`.
///
/// Running sequentially sidesteps a subtlety that bit a concurrent port of this design: each
/// iteration's flow produces exactly one output channel and one error channel, and this pipe
/// fully drains (or short-circuits on) both before starting the next iteration, so there is
/// never a set of still-running previous iterations whose error channels nobody is listening
/// to. With iterations strictly serialized, channel closure by `Sender` drop is all the cleanup
/// that's needed.
pub struct Loop {
    id: PipeId,
    label: String,
    splitter: Splitter,
    joiner: Joiner,
    stream: Flow,
}

impl Loop {
    /// Builds a `Loop` with a default label.
    pub fn new(splitter: Splitter, stream: Flow, joiner: Joiner) -> Self {
        Loop {
            id: PipeId::next(),
            label: default_label::<Loop>(),
            splitter,
            joiner,
            stream,
        }
    }

    /// Builds a `Loop` with an explicit label.
    pub fn named(label: impl Into<String>, splitter: Splitter, stream: Flow, joiner: Joiner) -> Self {
        Loop {
            id: PipeId::next(),
            label: label.into(),
            splitter,
            joiner,
            stream,
        }
    }
}

#[async_trait]
impl Pipe for Loop {
    async fn connect(
        &self,
        ctx: RunContext,
        mut input: mpsc::Receiver<Value>,
    ) -> (mpsc::Receiver<Value>, mpsc::UnboundedReceiver<PipelineError>) {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let pipe_id = self.id;
        let label = self.label.clone();
        let splitter = self.splitter.clone();
        let joiner = self.joiner.clone();
        let stream = self.stream.clone();

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

            let split_result = panic_trampoline({
                let splitter = splitter.clone();
                let ctx = ctx.clone();
                let token = token.clone();
                async move { splitter(ctx, token).await }
            })
            .await;

            let sub_tokens = match split_result {
                Ok(tokens) => tokens,
                Err(err) => {
                    stopwatch.fail(&err);
                    ctx.breaker.cancel();
                    let _ = err_tx.send(err);
                    return;
                }
            };

            let total = sub_tokens.len();
            let mut collected = Vec::with_capacity(total);
            let mut failed = false;
            let mut starved = false;

            for (index, sub_token) in sub_tokens.into_iter().enumerate() {
                let branch_name = format!("{label}#{index}");
                let branch_ctx = ctx
                    .open_branch(node.clone(), &branch_name)
                    .with_iterator_parent(token.clone());
                let (feed_tx, feed_rx) = mpsc::channel(1);
                let (mut flow_out, flow_err) = connect_flow(&branch_ctx, &stream, feed_rx).await;
                let mut flow_err = merge_errors(flow_err);
                feed(&branch_ctx.breaker, feed_tx, sub_token).await;

                tokio::select! {
                    value = flow_out.recv() => match value {
                        Some(value) => collected.push(value),
                        None => {
                            starved = true;
                        }
                    },
                    err = flow_err.recv() => match err {
                        Some(err) => {
                            stopwatch.fail(&err);
                            ctx.breaker.cancel();
                            let _ = err_tx.send(err);
                            failed = true;
                        }
                        None => {
                            starved = true;
                        }
                    },
                }

                if failed || starved {
                    break;
                }
            }

            if failed {
                return;
            }

            if starved || collected.len() < total {
                stopwatch.cancelled();
                return;
            }

            let join_result = panic_trampoline({
                let joiner = joiner.clone();
                let ctx = ctx.clone();
                async move { joiner(ctx, token, collected).await }
            })
            .await;

            match join_result {
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
        PipeShape::Loop { stream: &self.stream }
    }
}
