//! Per-run cancellation handle.
//!
//! A [`Breaker`] offers two distinct signals: `cancel`, which tears down the whole run, and
//! `early_exit`, a one-shot delivery of a final value that lets the sink short-circuit the
//! remaining flow. Both are cooperative: pipes observe them at their next channel send or
//! receive, they are never forcibly preempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::sync::oneshot;

use crate::value::Value;

/// Cancellation + one-shot early-exit handle shared by every task spawned during a run.
#[derive(Clone)]
pub struct Breaker {
    cancel_tx: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
    early_exit_tx: Arc<Mutex<Option<oneshot::Sender<Value>>>>,
}

impl Breaker {
    /// Creates a fresh breaker and the receiver that observes its (at most one) early-exit value.
    pub fn new() -> (Self, oneshot::Receiver<Value>) {
        let (cancel_tx, _) = broadcast::channel(16);
        let (early_exit_tx, early_exit_rx) = oneshot::channel();
        (
            Breaker {
                cancel_tx,
                cancelled: Arc::new(AtomicBool::new(false)),
                early_exit_tx: Arc::new(Mutex::new(Some(early_exit_tx))),
            },
            early_exit_rx,
        )
    }

    /// Terminates the whole run. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.cancel_tx.send(());
    }

    /// True once [`Breaker::cancel`] has been called at least once.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Subscribes to the cancellation signal. Call this before starting work so the signal isn't
    /// missed; each subscriber gets its own lagged receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.cancel_tx.subscribe()
    }

    /// Delivers `value` to the sink instead of the normal output channel. Only the first call
    /// has any effect; later calls are silently dropped, per the one-shot contract.
    pub fn early_exit(&self, value: Value) {
        if let Some(tx) = self.early_exit_tx.lock().unwrap().take() {
            let _ = tx.send(value);
        }
    }
}

/// Waits for the cancellation signal to fire, or returns immediately (never) if it already has.
///
/// Meant to be used as one arm of a `tokio::select!` alongside a channel operation, so a pipe can
/// abandon an in-flight send/receive as soon as the run is cancelled.
pub async fn cancelled(rx: &mut broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn early_exit_is_one_shot() {
        let (breaker, rx) = Breaker::new();
        breaker.early_exit(Value::Str("first".into()));
        breaker.early_exit(Value::Str("second".into()));
        let got = rx.await.unwrap();
        assert_eq!(got.as_str().unwrap(), "first");
    }

    #[tokio::test]
    async fn cancel_wakes_subscribers() {
        let (breaker, _rx) = Breaker::new();
        let mut sub = breaker.subscribe();
        breaker.cancel();
        cancelled(&mut sub).await;
    }
}
