//! Shared cancellation signal for a run.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable stop signal. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // Only errors when the sender is dropped, and `self` holds it.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Runs `fut` unless cancellation is requested first.
    ///
    /// Returns `None` without polling `fut` when already cancelled, and drops
    /// the in-flight future if cancellation arrives while it is pending.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
