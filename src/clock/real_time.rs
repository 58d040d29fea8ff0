//! Real-time clock backed by the Tokio timer.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use super::{Clock, TimerCallback, TimerHandle};

/// Wall-clock [`Clock`] implementation.
///
/// Each `set_timeout` spawns a task that sleeps for the delay and then runs
/// the callback, unless the timeout was cleared first. Requires a running
/// Tokio runtime at the time `set_timeout` is called.
///
/// This is the default clock of an interpreter; tests use
/// [`SimulatedClock`](super::SimulatedClock) instead.
#[derive(Clone, Default)]
pub struct TokioClock {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    pending: DashMap<u64, CancellationToken>,
}

impl TokioClock {
    /// Creates a new real-time clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timeouts that have not yet fired or been cleared.
    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }
}

impl Clock for TokioClock {
    fn set_timeout(&self, callback: TimerCallback, delay: Duration) -> TimerHandle {
        let id = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let token = CancellationToken::new();
        self.inner.pending.insert(id, token.clone());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Removing the entry first makes fire and clear mutually
                    // exclusive even when they race.
                    if inner.pending.remove(&id).is_some() {
                        callback();
                    }
                }
            }
        });

        TimerHandle(id)
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        if let Some((_, token)) = self.inner.pending.remove(&handle.0) {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        clock.set_timeout(
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_timeout_never_fires() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        let handle = clock.set_timeout(
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(50),
        );
        clock.clear_timeout(handle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_unknown_handle_is_noop() {
        let clock = TokioClock::new();
        clock.clear_timeout(TimerHandle(999));
    }
}
