use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Coalesces bursts of signals into one action run.
///
/// The action runs `window` after the last signal of a burst. Cancelling
/// the token drops any pending run and stops the task.
pub struct Debouncer {
    trigger: DebounceTrigger,
}

/// Cheap handle for signalling a [`Debouncer`].
#[derive(Clone)]
pub struct DebounceTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl DebounceTrigger {
    pub fn fire(&self) {
        let _ = self.tx.send(());
    }
}

impl Debouncer {
    /// Starts the debounce task on the current `LocalSet`.
    pub fn spawn<F>(window: Duration, cancel: CancellationToken, mut action: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        tokio::task::spawn_local(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    signal = rx.recv() => {
                        if signal.is_none() {
                            return;
                        }
                    }
                }
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        signal = rx.recv() => {
                            if signal.is_none() {
                                return;
                            }
                        }
                        _ = tokio::time::sleep(window) => break,
                    }
                }
                action();
            }
        });
        Self {
            trigger: DebounceTrigger { tx },
        }
    }

    pub fn fire(&self) {
        self.trigger.fire();
    }

    pub fn trigger(&self) -> DebounceTrigger {
        self.trigger.clone()
    }
}
