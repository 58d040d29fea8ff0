//! # Delayed-send registry.
//!
//! Maps send ids to clock handles. A send id is the authored `id` option
//! when present, otherwise the event name.
//!
//! ## Rules
//! - Re-registering an in-use id **replaces the entry without cancelling
//!   the earlier timer**: both fire unless explicitly cancelled, and
//!   `cancel(id)` removes exactly the latest registration.
//! - `cancel` with an unknown id is silent.
//! - `cancel_all` runs on interpreter stop.

use dashmap::DashMap;

use crate::clock::{Clock, TimerHandle};

/// Registry of scheduled delayed sends, keyed by send id.
#[derive(Default)]
pub(crate) struct DelayedSends {
    entries: DashMap<String, TimerHandle>,
}

impl DelayedSends {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a scheduled send. Replaces (does not cancel) an existing
    /// entry under the same id.
    pub(crate) fn register(&self, id: String, handle: TimerHandle) {
        self.entries.insert(id, handle);
    }

    /// Cancels the latest registration under `id`. Silent if not found.
    pub(crate) fn cancel(&self, id: &str, clock: &dyn Clock) {
        if let Some((_, handle)) = self.entries.remove(id) {
            clock.clear_timeout(handle);
        }
    }

    /// Cancels every registration. Called on interpreter stop.
    pub(crate) fn cancel_all(&self, clock: &dyn Clock) {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id, clock);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::SimulatedClock;

    fn counting_timeout(
        clock: &SimulatedClock,
        fired: &Arc<AtomicUsize>,
        delay_ms: u64,
    ) -> TimerHandle {
        let fired = Arc::clone(fired);
        clock.set_timeout(
            Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(delay_ms),
        )
    }

    #[test]
    fn cancel_prevents_fire() {
        let clock = SimulatedClock::new();
        let sends = DelayedSends::new();
        let fired = Arc::new(AtomicUsize::new(0));

        sends.register("tick".into(), counting_timeout(&clock, &fired, 10));
        sends.cancel("tick", &clock);

        clock.advance(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_id_fires_both_and_cancel_removes_latest() {
        let clock = SimulatedClock::new();
        let sends = DelayedSends::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        sends.register("tick".into(), counting_timeout(&clock, &first, 10));
        sends.register("tick".into(), counting_timeout(&clock, &second, 20));

        // Without an intervening cancel, both registrations fire.
        clock.advance(Duration::from_millis(30));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_after_replacement_only_stops_latest() {
        let clock = SimulatedClock::new();
        let sends = DelayedSends::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        sends.register("tick".into(), counting_timeout(&clock, &first, 10));
        sends.register("tick".into(), counting_timeout(&clock, &second, 20));
        sends.cancel("tick", &clock);

        clock.advance(Duration::from_millis(30));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_all_clears_everything() {
        let clock = SimulatedClock::new();
        let sends = DelayedSends::new();
        let fired = Arc::new(AtomicUsize::new(0));

        sends.register("a".into(), counting_timeout(&clock, &fired, 10));
        sends.register("b".into(), counting_timeout(&clock, &fired, 20));
        sends.cancel_all(&clock);

        clock.advance(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn cancel_unknown_id_is_silent() {
        let clock = SimulatedClock::new();
        let sends = DelayedSends::new();
        sends.cancel("missing", &clock);
    }
}
