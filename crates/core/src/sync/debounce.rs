//! Trailing-edge coalescing task.
//!
//! `schedule` replaces the pending value and pushes the deadline out by one
//! window; only the last value scheduled inside a quiet window is delivered.
//! A dedicated worker owns the timer so callers never block.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

/// Receiver of coalesced values.
#[async_trait]
pub trait DebounceTarget<T: Send + 'static>: Send + Sync + 'static {
    async fn fire(&self, value: T);
}

enum Command<T> {
    Schedule(T),
    Cancel,
    Flush(oneshot::Sender<()>),
}

/// Handle to a running debounce worker. Dropping it delivers any pending value.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(name: &'static str, window: Duration, target: Arc<dyn DebounceTarget<T>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(name, window, target, rx));
        Self { tx }
    }

    /// Replace the pending value and restart the quiet window.
    pub fn schedule(&self, value: T) {
        if self.tx.send(Command::Schedule(value)).is_err() {
            debug!("[Debounce] Worker stopped, dropping scheduled value");
        }
    }

    /// Drop the pending value, if any.
    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }

    /// Deliver the pending value now and wait until the target has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn worker<T: Send + 'static>(
    name: &'static str,
    window: Duration,
    target: Arc<dyn DebounceTarget<T>>,
    mut rx: mpsc::UnboundedReceiver<Command<T>>,
) {
    let mut pending: Option<T> = None;

    // Deadline far in the future while idle.
    let far_future = Instant::now() + Duration::from_secs(365 * 24 * 3600);
    let mut deadline = far_future;

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(Command::Schedule(value)) => {
                        pending = Some(value);
                        deadline = Instant::now() + window;
                    }
                    Some(Command::Cancel) => {
                        pending = None;
                        deadline = far_future;
                    }
                    Some(Command::Flush(done)) => {
                        deadline = far_future;
                        if let Some(value) = pending.take() {
                            target.fire(value).await;
                        }
                        let _ = done.send(());
                    }
                    None => {
                        if let Some(value) = pending.take() {
                            target.fire(value).await;
                        }
                        break;
                    }
                }
            }
            () = sleep_until(deadline), if pending.is_some() => {
                deadline = far_future;
                if let Some(value) = pending.take() {
                    target.fire(value).await;
                }
            }
        }
    }

    debug!("[Debounce] {} worker finished", name);
}
