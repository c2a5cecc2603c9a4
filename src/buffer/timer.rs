// ABOUTME: Per-file debounce timer handle for deferred persistence
// Arming spawns a task that reports back when the deadline passes; dropping cancels it

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

/// Reported to the owner of a buffer when its persist deadline expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistDue {
    /// File the timer was armed for.
    pub path: String,
    /// Matches the timer that fired; older generations are stale.
    pub generation: u64,
}

/// Scheduled persist for one open file. Replacing or dropping the handle
/// aborts the task, so at most one timer per file can ever fire.
#[derive(Debug)]
pub struct PersistTimer {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl PersistTimer {
    /// Spawn a task that reports on `due_tx` after `delay`.
    pub fn arm(
        path: String,
        generation: u64,
        delay: Duration,
        due_tx: mpsc::UnboundedSender<PersistDue>,
    ) -> Self {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            if due_tx.send(PersistDue { path, generation }).is_err() {
                debug!("Persist timer {} fired after its owner was dropped", generation);
            }
        });

        Self {
            generation,
            deadline,
            handle,
        }
    }

    /// Generation this timer was armed with.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Instant the timer fires.
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Cancel the timer. Cancelling an already-fired timer is a no-op.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PersistTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
