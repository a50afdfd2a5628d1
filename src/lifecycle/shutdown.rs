//! Cancellation of pending payments.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};

/// Fans a single cancel request out to every payment flow waiting on it.
///
/// Only the first `trigger` sends; later calls report that cancellation was
/// already requested so the caller can escalate.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Receiver for one payment flow.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Request cancellation. Returns `false` if it was already requested.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::debug!(listeners = listeners, "Cancellation requested");
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation is requested on `rx`'s channel.
    ///
    /// A closed channel means nobody can cancel any more, so it never resolves.
    pub async fn cancelled(rx: &mut broadcast::Receiver<()>) {
        if let Err(RecvError::Closed) = rx.recv().await {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_every_flow() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();

        assert!(shutdown.trigger());
        assert!(shutdown.is_triggered());
        Shutdown::cancelled(&mut a).await;
        Shutdown::cancelled(&mut b).await;
    }

    #[test]
    fn test_second_trigger_reports_repeat() {
        let shutdown = Shutdown::default();
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
    }

    #[tokio::test]
    async fn test_closed_channel_never_cancels() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        drop(shutdown);

        let raced = tokio::time::timeout(Duration::from_millis(20), Shutdown::cancelled(&mut rx)).await;
        assert!(raced.is_err());
    }
}
