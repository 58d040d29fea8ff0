//! Deterministic clock advanced manually during tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{Clock, TimerCallback, TimerHandle};

/// Deterministic [`Clock`] for tests.
///
/// Time only moves when [`advance`](SimulatedClock::advance) is called.
/// Due timers fire synchronously inside `advance`, in deadline order
/// (registration order breaks ties), so a scenario like
///
/// ```text
/// schedule TIMER at +10ms
/// advance(5ms)   -> nothing fires
/// advance(5ms)   -> TIMER fires before advance returns
/// ```
///
/// is fully deterministic. Callbacks may schedule further timeouts; a new
/// timeout falling inside the window still being advanced fires in the same
/// `advance` call.
#[derive(Clone, Default)]
pub struct SimulatedClock {
    inner: Arc<Mutex<SimInner>>,
}

#[derive(Default)]
struct SimInner {
    now: Duration,
    next_id: u64,
    next_seq: u64,
    timers: Vec<SimTimer>,
}

struct SimTimer {
    id: u64,
    seq: u64,
    due: Duration,
    callback: TimerCallback,
}

impl SimulatedClock {
    /// Creates a clock anchored at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of timeouts that have not yet fired or been cleared.
    pub fn pending(&self) -> usize {
        self.lock().timers.len()
    }

    /// Advances simulated time by `duration`, firing every timer whose
    /// deadline falls inside the window.
    ///
    /// Timers fire outside the internal lock, so a callback may call back
    /// into the clock (the usual case: a fired delayed send re-enters a
    /// state that schedules the next one).
    pub fn advance(&self, duration: Duration) {
        let target = self.lock().now.saturating_add(duration);

        loop {
            let next = {
                let mut inner = self.lock();
                match earliest_due(&inner.timers, target) {
                    Some(index) => {
                        let timer = inner.timers.swap_remove(index);
                        inner.now = timer.due;
                        Some(timer.callback)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };

            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for SimulatedClock {
    fn set_timeout(&self, callback: TimerCallback, delay: Duration) -> TimerHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let due = inner.now.saturating_add(delay);
        inner.timers.push(SimTimer {
            id,
            seq,
            due,
            callback,
        });
        TimerHandle(id)
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        let mut inner = self.lock();
        inner.timers.retain(|t| t.id != handle.0);
    }
}

/// Index of the earliest timer due at or before `target`, breaking deadline
/// ties by registration order.
fn earliest_due(timers: &[SimTimer], target: Duration) -> Option<usize> {
    timers
        .iter()
        .enumerate()
        .filter(|(_, t)| t.due <= target)
        .min_by_key(|(_, t)| (t.due, t.seq))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerCallback) {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |tag: &'static str| -> TimerCallback {
            let l = Arc::clone(&l);
            Box::new(move || l.lock().unwrap().push(tag))
        };
        (log, make)
    }

    #[test]
    fn fires_in_deadline_order() {
        let clock = SimulatedClock::new();
        let (log, cb) = recorder();

        clock.set_timeout(cb("late"), Duration::from_millis(20));
        clock.set_timeout(cb("early"), Duration::from_millis(10));

        clock.advance(Duration::from_millis(30));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(clock.now(), Duration::from_millis(30));
    }

    #[test]
    fn registration_order_breaks_ties() {
        let clock = SimulatedClock::new();
        let (log, cb) = recorder();

        clock.set_timeout(cb("first"), Duration::from_millis(10));
        clock.set_timeout(cb("second"), Duration::from_millis(10));

        clock.advance(Duration::from_millis(10));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let clock = SimulatedClock::new();
        let (log, cb) = recorder();

        let handle = clock.set_timeout(cb("nope"), Duration::from_millis(10));
        clock.clear_timeout(handle);

        clock.advance(Duration::from_millis(100));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn partial_advance_does_not_fire() {
        let clock = SimulatedClock::new();
        let (log, cb) = recorder();

        clock.set_timeout(cb("timer"), Duration::from_millis(10));

        clock.advance(Duration::from_millis(5));
        assert!(log.lock().unwrap().is_empty());

        clock.advance(Duration::from_millis(5));
        assert_eq!(*log.lock().unwrap(), vec!["timer"]);
    }

    #[test]
    fn callback_may_schedule_into_same_window() {
        let clock = SimulatedClock::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let chained = {
            let clock = clock.clone();
            let fired = Arc::clone(&fired);
            Box::new(move || {
                let fired = Arc::clone(&fired);
                clock.set_timeout(
                    Box::new(move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }),
                    Duration::from_millis(5),
                );
            })
        };

        clock.set_timeout(chained, Duration::from_millis(10));

        // The chained timer lands at t=15, inside the same advance window.
        clock.advance(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
