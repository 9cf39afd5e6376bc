//! Per-check recurring timers feeding a single stream of due checks.
//!
//! Every registered check gets its own suspended task, so one check's slow
//! probe or long interval never delays another's due-delivery. The timer
//! is re-armed only after the due check has been handed to the consumer:
//! the interval measures "became due" to "becomes due again", and probe
//! duration is additive to the effective period.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::check::Check;

/// Registry of active per-check timers.
///
/// Cancellation is a per-check one-shot signal raced against the timer
/// with `select!`; whichever is ready first wins, so a `stop` can never
/// leak a timer or double-deliver a due check.
pub struct Scheduler {
    due_tx: mpsc::Sender<Arc<Check>>,
    timers: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl Scheduler {
    /// Create the scheduler and the stream of due checks its consumer
    /// reads from. The channel holds a single element: a due check is
    /// handed off, not queued.
    pub fn new() -> (Self, mpsc::Receiver<Arc<Check>>) {
        let (due_tx, due_rx) = mpsc::channel(1);
        let scheduler = Scheduler {
            due_tx,
            timers: Mutex::new(HashMap::new()),
        };
        (scheduler, due_rx)
    }

    /// Register `check` and arm its first timer. Scheduling a key that is
    /// already registered cancels the existing timer and replaces it.
    pub fn schedule(&self, check: Arc<Check>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let replaced = self
            .timers
            .lock()
            .unwrap()
            .insert(check.key.clone(), cancel_tx);
        if replaced.is_some() {
            debug!(check = %check.key, "rescheduled, prior timer cancelled");
        }

        let due_tx = self.due_tx.clone();
        tokio::spawn(run_timer(check, due_tx, cancel_rx));
    }

    /// Cancel the pending timer for `key` and deregister it. A no-op if
    /// the key is not scheduled.
    pub fn stop(&self, key: &str) {
        // Dropping the sender resolves the timer task's cancel branch.
        self.timers.lock().unwrap().remove(key);
    }

    /// Cancel every pending timer.
    pub fn stop_all(&self) {
        self.timers.lock().unwrap().clear();
    }

    /// Number of currently scheduled checks.
    pub fn len(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.lock().unwrap().is_empty()
    }
}

async fn run_timer(
    check: Arc<Check>,
    due_tx: mpsc::Sender<Arc<Check>>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    loop {
        let timer = tokio::time::sleep(check.interval);
        tokio::pin!(timer);

        tokio::select! {
            _ = &mut timer => {
                // Still racing cancellation while the hand-off is pending,
                // so a stopped check cannot deliver one last time.
                tokio::select! {
                    sent = due_tx.send(check.clone()) => {
                        if sent.is_err() {
                            // Consumer is gone; monitoring is shutting down.
                            break;
                        }
                    }
                    _ = &mut cancel_rx => break,
                }
            }
            _ = &mut cancel_rx => break,
        }
    }
}
