//! Counted completion barrier.

use std::sync::Arc;
use tokio::sync::watch;

/// Counts in-flight builds and wakes waiters when the count returns to zero.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    count: Arc<watch::Sender<usize>>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Register one build. The build counts as finished when the guard drops.
    pub fn enter(&self) -> BarrierGuard {
        self.count.send_modify(|count| *count += 1);
        BarrierGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until no registered build is left. Returns at once if none is.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one build as in flight until dropped.
#[derive(Debug)]
pub struct BarrierGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.count.send_modify(|count| *count -= 1);
    }
}
