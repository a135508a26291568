//! Splits one input token into many, runs an inner flow over each with bounded parallelism, and
//! joins the results back into one output token.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::breaker::cancelled;
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::pipe::{connect_flow, default_label, Flow, Joiner, Pipe, PipeShape, Splitter, Tagger};
use crate::plumbing::{fan_in, feed, merge_errors, panic_trampoline, wait_for_pipeline};
use crate::tracer::{PipeId, Stopwatch};
use crate::value::Value;

/// Fans one token out into a dynamically-sized batch, runs `stream` over every element, and
/// joins the batch's results back together.
///
/// Results are gathered **chunk by chunk**, in chunk order; within a chunk (the unit of
/// parallelism bounded by `max_p`), sub-token completion order is whatever `tokio` schedules —
/// the [`Joiner`] must correlate results by content (e.g. a product id carried on the value),
/// never by position. The demo enrichment pipeline's own joiner does exactly this.
pub struct Iterator {
    id: PipeId,
    label: String,
    splitter: Splitter,
    joiner: Joiner,
    tagger: Option<Tagger>,
    stream: Flow,
    max_p: Option<usize>,
}

impl Iterator {
    /// Builds an `Iterator` with a default label and unbounded parallelism (one chunk holding
    /// every sub-token).
    pub fn new(splitter: Splitter, stream: Flow, joiner: Joiner) -> Self {
        Iterator {
            id: PipeId::next(),
            label: default_label::<Iterator>(),
            splitter,
            joiner,
            tagger: None,
            stream,
            max_p: None,
        }
    }

    /// Caps concurrent in-flight sub-tokens at `max_p`, running the batch in chunks.
    pub fn with_max_p(mut self, max_p: usize) -> Self {
        self.max_p = Some(max_p);
        self
    }

    /// Labels each sub-token's branch for tracing; defaults to its index in the batch.
    pub fn with_tagger(mut self, tagger: Tagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Builds an `Iterator` with an explicit label.
    pub fn named(label: impl Into<String>, splitter: Splitter, stream: Flow, joiner: Joiner) -> Self {
        Iterator {
            id: PipeId::next(),
            label: label.into(),
            splitter,
            joiner,
            tagger: None,
            stream,
            max_p: None,
        }
    }
}

#[async_trait]
impl Pipe for Iterator {
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
        let tagger = self.tagger.clone();
        let stream = self.stream.clone();
        let chunk_size = self.max_p;

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
            let chunk_size = chunk_size.unwrap_or(total.max(1));
            let mut collected = Vec::with_capacity(total);
            let mut failed = false;
            let mut starved = false;

            for (chunk_index, chunk) in sub_tokens.chunks(chunk_size.max(1)).enumerate() {
                let chunk_len = chunk.len();
                let mut chunk_outputs = Vec::with_capacity(chunk.len());
                let mut chunk_errors = Vec::with_capacity(chunk.len());

                for (offset, sub_token) in chunk.iter().enumerate() {
                    let tag = match &tagger {
                        Some(tagger) => {
                            match panic_trampoline({
                                let tagger = tagger.clone();
                                let ctx = ctx.clone();
                                let sub_token = sub_token.clone();
                                async move { tagger(ctx, sub_token).await }
                            })
                            .await
                            {
                                Ok(tag) => tag,
                                Err(err) => {
                                    stopwatch.fail(&err);
                                    ctx.breaker.cancel();
                                    let _ = err_tx.send(err);
                                    return;
                                }
                            }
                        }
                        None => (chunk_index * chunk_size + offset).to_string(),
                    };
                    let branch_name = format!("{label}#{tag}");
                    let branch_ctx = ctx
                        .open_branch(node.clone(), &branch_name)
                        .with_iterator_parent(token.clone());
                    let (feed_tx, feed_rx) = mpsc::channel(1);
                    let (flow_out, flow_err) = connect_flow(&branch_ctx, &stream, feed_rx).await;
                    feed(&branch_ctx.breaker, feed_tx, sub_token.clone()).await;
                    chunk_outputs.push(flow_out);
                    chunk_errors.extend(flow_err);
                }

                let mut merged_outputs = fan_in(&ctx.breaker, chunk_outputs);
                let errors_done = tokio::spawn(wait_for_pipeline(merge_errors(chunk_errors)));

                let mut chunk_collected = Vec::with_capacity(chunk_len);
                while let Some(value) = merged_outputs.recv().await {
                    chunk_collected.push(value);
                }
                if let Some(err) = errors_done.await.ok().flatten() {
                    stopwatch.fail(&err);
                    ctx.breaker.cancel();
                    let _ = err_tx.send(err);
                    failed = true;
                    break;
                }

                let chunk_received = chunk_collected.len();
                collected.extend(chunk_collected);

                if chunk_received < chunk_len {
                    starved = true;
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
        PipeShape::Iterator {
            stream: &self.stream,
            max_p: self.max_p,
        }
    }
}
