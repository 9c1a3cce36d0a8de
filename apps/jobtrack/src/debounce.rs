//! Trailing-edge debounce for bursty writes.
//!
//! Each `trigger` replaces the pending action and restarts the delay, so
//! only the last action of a burst runs. An action that already started is
//! left to finish.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

const WAITING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

struct Pending {
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl Pending {
    /// Cancels the action unless it is already running.
    fn cancel(self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(WAITING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.handle.abort();
        }
        cancelled
    }
}

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Pending>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` after the delay, dropping whatever was pending.
    /// Must be called from within a tokio runtime.
    pub fn trigger<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(WAITING));
        let task_state = Arc::clone(&state);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_state
                .compare_exchange(WAITING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            action.await;
        });

        let previous = self.lock().replace(Pending { state, handle });
        if let Some(previous) = previous {
            if previous.cancel() {
                debug!("debounced action superseded");
            }
        }
    }

    /// Drops the pending action, if it hasn't started.
    pub fn cancel(&self) -> bool {
        self.lock().take().is_some_and(Pending::cancel)
    }

    /// True while an action is waiting out its delay.
    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|p| {
            p.state.load(Ordering::Acquire) == WAITING && !p.handle.is_finished()
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = self
            .pending
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            pending.cancel();
        }
    }
}
