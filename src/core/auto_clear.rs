/*
 * Deferred clipboard clearing. Every successful copy schedules its own clear on
 * a background thread; a later copy does not cancel an earlier pending clear,
 * so an older timer can wipe newer, unrelated clipboard content. The owner can
 * cancel everything still pending with `cancel_pending_clears`, and dropping the
 * scheduler cancels as well.
 *
 * Nothing keeps the process alive for a pending clear: if the process exits
 * inside the delay window, the clear never happens.
 */
use crate::core::clipboard_backend::ClipboardBackendOperations;
use crate::core::models::ClipboardBuffer;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const AUTO_CLEAR_DELAY: Duration = Duration::from_secs(60);

struct PendingClear {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct AutoClearScheduler {
    delay: Duration,
    pending: Mutex<Vec<PendingClear>>,
}

impl AutoClearScheduler {
    pub fn new() -> Self {
        Self::with_delay(AUTO_CLEAR_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        AutoClearScheduler {
            delay,
            pending: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&self, backend: Arc<dyn ClipboardBackendOperations>, buffer: ClipboardBuffer) {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let delay = self.delay;
        let spawn_result = thread::Builder::new()
            .name("clipbard-auto-clear".to_string())
            .spawn(move || match cancelled.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => match backend.clear() {
                    Ok(()) => log::debug!("AutoClear: Cleared clipboard buffer {buffer}."),
                    Err(e) => log::warn!("AutoClear: Failed to clear buffer {buffer}: {e}"),
                },
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::trace!("AutoClear: Pending clear for buffer {buffer} cancelled.");
                }
            });

        match spawn_result {
            Ok(handle) => {
                let mut pending = self.lock_pending();
                pending.retain(|p| !p.handle.is_finished());
                pending.push(PendingClear { cancel, handle });
                log::debug!(
                    "AutoClear: Scheduled clear of buffer {buffer} in {:?} ({} pending).",
                    delay,
                    pending.len()
                );
            }
            Err(e) => log::warn!("AutoClear: Could not start timer thread: {e}"),
        }
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        let mut pending = self.lock_pending();
        pending.retain(|p| !p.handle.is_finished());
        pending.len()
    }

    /// Cancels every clear that has not fired yet and waits for the timers to exit.
    pub fn cancel_pending_clears(&self) -> usize {
        let drained: Vec<PendingClear> = self.lock_pending().drain(..).collect();
        let mut cancelled = 0;
        for pending in drained {
            if pending.cancel.send(()).is_ok() {
                cancelled += 1;
            }
            if pending.handle.join().is_err() {
                log::error!("AutoClear: Timer thread panicked.");
            }
        }
        if cancelled > 0 {
            log::debug!("AutoClear: Cancelled {cancelled} pending clear(s).");
        }
        cancelled
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<PendingClear>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AutoClearScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AutoClearScheduler {
    fn drop(&mut self) {
        self.cancel_pending_clears();
    }
}
