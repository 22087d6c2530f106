//! Deferred auto-rollback.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Runs an action once a deadline passes, unless disarmed first.
///
/// Each open transaction owns one guard. Disarming is a plain signal to the
/// guard task; it is safe to call after the guard already fired, including
/// from the action itself. Dropping the guard cancels it as well.
#[derive(Debug)]
pub struct TimeoutGuard {
    cancel: oneshot::Sender<()>,
    deadline: Instant,
}

impl TimeoutGuard {
    /// Spawns a task that runs `on_expiry` after `timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(timeout: Duration, on_expiry: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();
        let deadline = Instant::now() + timeout;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled => {}
                () = tokio::time::sleep_until(deadline) => on_expiry.await,
            }
        });
        Self { cancel, deadline }
    }

    /// Returns when the guard fires.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Stops the guard. A no-op if it already fired.
    pub fn disarm(self) {
        // Err means the guard task is past the select and already firing.
        let _ = self.cancel.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_timeout() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let guard = TimeoutGuard::arm(Duration::from_millis(200), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(guard.deadline() <= Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_guard_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let guard = TimeoutGuard::arm(Duration::from_millis(50), async move {
            flag.store(true, Ordering::SeqCst);
        });

        guard.disarm();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_after_firing_is_harmless() {
        let guard = TimeoutGuard::arm(Duration::from_millis(10), async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        guard.disarm();
    }
}
