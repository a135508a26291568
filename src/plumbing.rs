//! Channel plumbing shared by every pipe kind: feeding a value in, fanning several streams into
//! one, merging error channels, draining the first error, and the panic trampoline every pipe
//! body runs inside.
//!
//! Channel closure is never an explicit step here. Every function below returns as soon as its
//! `Sender` is dropped (by falling out of scope), and Rust's ownership model does the rest —
//! there is no `defer close(ch)` anywhere in this crate because there doesn't need to be.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::Future;
use futures::FutureExt;
use tokio::sync::mpsc;

use crate::breaker::{cancelled, Breaker};
use crate::error::PipelineError;
use crate::value::Value;

/// Sends `value` on `tx`, or abandons the send if the breaker cancels first.
pub async fn feed(breaker: &Breaker, tx: mpsc::Sender<Value>, value: Value) {
    let mut cancel_rx = breaker.subscribe();
    tokio::select! {
        _ = tx.send(value) => {}
        _ = cancelled(&mut cancel_rx) => {}
    }
}

/// Multiplexes several data receivers into one. Spawns one forwarding task per input; the
/// returned receiver closes once every input has closed or the breaker cancels.
pub fn fan_in(breaker: &Breaker, receivers: Vec<mpsc::Receiver<Value>>) -> mpsc::Receiver<Value> {
    let (tx, rx) = mpsc::channel(receivers.len().max(1));
    for mut input in receivers {
        let tx = tx.clone();
        let mut cancel_rx = breaker.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    item = input.recv() => match item {
                        Some(value) => {
                            if tx.send(value).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = cancelled(&mut cancel_rx) => break,
                }
            }
        });
    }
    rx
}

/// Multiplexes several error receivers into one, the error-channel analogue of [`fan_in`].
pub fn merge_errors(receivers: Vec<mpsc::UnboundedReceiver<PipelineError>>) -> mpsc::UnboundedReceiver<PipelineError> {
    let (tx, rx) = mpsc::unbounded_channel();
    for mut input in receivers {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(err) = input.recv().await {
                if tx.send(err).is_err() {
                    break;
                }
            }
        });
    }
    rx
}

/// Drains `errors` for its first item, discarding the channel (and, by dropping it, every
/// sender's remaining backlog) afterwards. Returns `None` if the channel closed with nothing
/// sent.
pub async fn wait_for_pipeline(mut errors: mpsc::UnboundedReceiver<PipelineError>) -> Option<PipelineError> {
    errors.recv().await
}

/// Runs `body` under a panic trampoline: a recovered panic becomes a
/// [`PipelineError::Panic`] with the literal prefix `panic recovered: `, and is never allowed to
/// unwind past this call. Generic over the success type so it covers resolvers (`Value`),
/// splitters (`Vec<Value>`), deciders (`bool`), and every other user-supplied stage closure.
pub async fn panic_trampoline<T, F>(body: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>> + Send,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(PipelineError::Panic(describe_panic_payload(payload))),
    }
}

fn describe_panic_payload(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fan_in_forwards_all_inputs() {
        let (breaker, _rx) = Breaker::new();
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, rx_b) = mpsc::channel(4);
        tx_a.send(Value::Int(1)).await.unwrap();
        tx_b.send(Value::Int(2)).await.unwrap();
        drop(tx_a);
        drop(tx_b);

        let mut merged = fan_in(&breaker, vec![rx_a, rx_b]);
        let mut seen = vec![];
        while let Some(v) = merged.recv().await {
            seen.push(v.as_int().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn panic_trampoline_converts_panic_to_error() {
        let result = panic_trampoline::<(), _>(async { panic!("boom") }).await;
        let err = result.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.to_string(), "panic recovered: boom");
    }

    #[tokio::test]
    async fn wait_for_pipeline_returns_first_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(PipelineError::Cancelled("a".into())).unwrap();
        tx.send(PipelineError::Cancelled("b".into())).unwrap();
        let first = wait_for_pipeline(rx).await.unwrap();
        assert_eq!(first.to_string(), "cancelled: a");
    }
}
