//! # Per-actor FIFO event queue.
//!
//! One [`EventQueue`] per interpreter. Events are processed strictly in
//! send-order; raised and internal events enter the same queue at emission
//! time, so the ordering rule is pure FIFO without a priority lane.
//!
//! The queue also owns the **deferred buffer**: events sent before `start`
//! while `defer_events` is enabled wait here and are moved into the inbox
//! when the interpreter starts.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::EventEnvelope;

/// FIFO inbox plus deferred pre-start buffer.
#[derive(Default)]
pub(crate) struct EventQueue {
    inbox: Mutex<VecDeque<EventEnvelope>>,
    deferred: Mutex<Vec<EventEnvelope>>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends an envelope to the inbox.
    pub(crate) fn push(&self, envelope: EventEnvelope) {
        self.lock_inbox().push_back(envelope);
    }

    /// Pops the oldest envelope, if any.
    pub(crate) fn pop(&self) -> Option<EventEnvelope> {
        self.lock_inbox().pop_front()
    }

    /// Buffers an envelope sent before `start`.
    pub(crate) fn defer(&self, envelope: EventEnvelope) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
    }

    /// Moves every deferred envelope into the inbox, preserving send order.
    pub(crate) fn drain_deferred(&self) {
        let deferred: Vec<_> = self
            .deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut inbox = self.lock_inbox();
        inbox.extend(deferred);
    }

    /// Discards all pending and deferred envelopes.
    pub(crate) fn clear(&self) {
        self.lock_inbox().clear();
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock_inbox().is_empty()
    }

    fn lock_inbox(&self) -> std::sync::MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;

    fn env(name: &str) -> EventEnvelope {
        EventEnvelope::external(Event::new(name))
    }

    #[test]
    fn fifo_order() {
        let queue = EventQueue::new();
        queue.push(env("a"));
        queue.push(env("b"));
        queue.push(env("c"));

        assert_eq!(queue.pop().unwrap().event.name, "a");
        assert_eq!(queue.pop().unwrap().event.name, "b");
        assert_eq!(queue.pop().unwrap().event.name, "c");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn deferred_events_drain_in_send_order() {
        let queue = EventQueue::new();
        queue.defer(env("first"));
        queue.defer(env("second"));
        assert!(queue.is_empty());

        queue.drain_deferred();
        assert_eq!(queue.pop().unwrap().event.name, "first");
        assert_eq!(queue.pop().unwrap().event.name, "second");
    }

    #[test]
    fn clear_discards_everything() {
        let queue = EventQueue::new();
        queue.push(env("inbox"));
        queue.defer(env("deferred"));

        queue.clear();
        queue.drain_deferred();
        assert!(queue.pop().is_none());
    }
}
