//! Keep-alive token for the hosting execution context
//!
//! Pausing cancels every timer and stops the live session, leaving the
//! supervisor with nothing scheduled. A host that tears its runtime down
//! once everything looks idle would lose a paused supervisor, so the
//! supervisor holds an [`ActivityGuard`] for the duration of a pause. The
//! host can observe the guard count or await [`ActivityTracker::idle`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Counts outstanding keep-alive guards
#[derive(Clone)]
pub struct ActivityTracker {
    held: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            held: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Acquire a keep-alive guard; the tracker is busy until it is dropped
    pub fn guard(&self) -> ActivityGuard {
        self.held.fetch_add(1, Ordering::SeqCst);
        ActivityGuard {
            held: self.held.clone(),
            notify: self.notify.clone(),
        }
    }

    /// Number of guards currently held
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Resolves once no guards are held
    pub async fn idle(&self) {
        loop {
            let released = self.notify.notified();
            if self.held() == 0 {
                return;
            }
            released.await;
        }
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the hosting context alive while held
pub struct ActivityGuard {
    held: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if self.held.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}
