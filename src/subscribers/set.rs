//! # ObserverSet: synchronous fan-out over multiple observers.
//!
//! [`ObserverSet`] distributes each state notification to every registered
//! observer, inline on the notifying thread. Entries are snapshotted
//! before delivery, so an observer may subscribe or unsubscribe from
//! within a callback without deadlocking; the change takes effect before
//! the next delivery.
//!
//! After completion the set refuses new work: late subscribers are
//! completed immediately and notifications stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::InterpreterError;
use crate::machine::State;

use super::Observer;

/// Identity of a registered observer, used to remove it.
pub type ObserverId = u64;

struct Entry {
    id: ObserverId,
    observer: Arc<dyn Observer>,
}

/// Owned by an interpreter; fans notifications out to observers.
#[derive(Default)]
pub(crate) struct ObserverSet {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    completed: AtomicBool,
}

impl ObserverSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers an observer and returns its id.
    ///
    /// On a completed set the observer is completed immediately and not
    /// retained.
    pub(crate) fn add(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        if self.completed.load(AtomicOrdering::SeqCst) {
            observer.complete();
            return id;
        }
        self.lock().push(Entry { id, observer });
        id
    }

    /// Removes an observer. Idempotent.
    pub(crate) fn remove(&self, id: ObserverId) {
        self.lock().retain(|e| e.id != id);
    }

    /// Delivers a state to every observer.
    pub(crate) fn next(&self, state: &State) {
        if self.completed.load(AtomicOrdering::SeqCst) {
            return;
        }
        for observer in self.snapshot() {
            observer.next(state);
        }
    }

    /// Delivers a failure to observers that handle errors.
    ///
    /// Returns `false` when none did, so the caller can fall back to the
    /// logger.
    pub(crate) fn error(&self, error: &InterpreterError) -> bool {
        let mut handled = false;
        for observer in self.snapshot() {
            if observer.handles_error() {
                observer.error(error);
                handled = true;
            }
        }
        handled
    }

    /// Completes every observer exactly once and clears the set.
    pub(crate) fn complete(&self) {
        if self.completed.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        let entries: Vec<Entry> = std::mem::take(&mut *self.lock());
        for entry in entries {
            entry.observer.complete();
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.lock().iter().map(|e| Arc::clone(&e.observer)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `subscribe`; unsubscribes explicitly.
///
/// Dropping the handle does **not** unsubscribe, matching the contract
/// that an observer stays registered until `unsubscribe` or interpreter
/// completion.
pub struct Subscription {
    set: Weak<ObserverSet>,
    id: ObserverId,
}

impl Subscription {
    pub(crate) fn new(set: &Arc<ObserverSet>, id: ObserverId) -> Self {
        Self {
            set: Arc::downgrade(set),
            id,
        }
    }

    /// Removes the observer. Idempotent; takes effect before the next
    /// delivery.
    pub fn unsubscribe(&self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::Event;
    use crate::machine::StateValue;
    use crate::subscribers::FnObserver;

    fn dummy_state() -> State {
        State {
            value: StateValue::Atomic("idle".into()),
            context: Default::default(),
            actions: Vec::new(),
            children: Default::default(),
            history_value: None,
            changed: false,
            done: false,
            event: Event::init(),
            done_data: None,
        }
    }

    #[test]
    fn complete_fires_exactly_once() {
        let set = Arc::new(ObserverSet::new());
        let completions = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);
        set.add(Arc::new(
            FnObserver::new(|_| {}).on_complete(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        set.complete();
        set.complete();
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_next_after_complete() {
        let set = Arc::new(ObserverSet::new());
        let notified = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notified);
        set.add(Arc::new(FnObserver::new(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        })));

        set.complete();
        set.next(&dummy_state());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_subscriber_is_completed_immediately() {
        let set = Arc::new(ObserverSet::new());
        set.complete();

        let completions = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&completions);
        set.add(Arc::new(
            FnObserver::new(|_| {}).on_complete(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let set = Arc::new(ObserverSet::new());
        let notified = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notified);
        let id = set.add(Arc::new(FnObserver::new(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        })));

        let sub = Subscription::new(&set, id);
        sub.unsubscribe();
        sub.unsubscribe();

        set.next(&dummy_state());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn error_reports_whether_handled() {
        let set = Arc::new(ObserverSet::new());
        let err = InterpreterError::ActionFailed {
            action: "send",
            message: "test".into(),
        };
        assert!(!set.error(&err));

        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        set.add(Arc::new(FnObserver::new(|_| {}).on_error(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })));
        assert!(set.error(&err));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
