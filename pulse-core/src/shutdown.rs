//! A one-shot cancellation signal observed by the pipeline's wait loops
//! (spec §4.1 / §5): a flag set once from a signal handler, with a `Notify`
//! so a blocked `wait_or_poll` call wakes immediately instead of riding out
//! its full timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<ShutdownInner>,
}

#[derive(Default)]
struct ShutdownInner {
    tripped: AtomicBool,
    notify: Notify,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.inner.tripped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_tripped(&self) -> bool {
        self.inner.tripped.load(Ordering::SeqCst)
    }

    /// Resolves as soon as `trip` is called, or immediately if it already
    /// has been. Pair with `tokio::select!` alongside a bounded sleep/wait
    /// so a stage's main loop re-checks on a steady cadence either way.
    pub async fn wait(&self) {
        if self.is_tripped() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_once_tripped() {
        let flag = ShutdownFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move {
            waiter.wait().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.trip();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("wait should resolve promptly after trip")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_returns_immediately_if_already_tripped() {
        let flag = ShutdownFlag::new();
        flag.trip();
        tokio::time::timeout(Duration::from_millis(50), flag.wait())
            .await
            .expect("already-tripped flag must not block");
    }
}
