//! # Child actor registry.
//!
//! Owned exclusively by one interpreter. Children are registered when a
//! start action (or `invoke` on state entry) spawns them, removed when a
//! stop action runs, and torn down post-order when the parent stops.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::actor_ref::ActorRef;

/// Registry of live children, keyed by child id.
#[derive(Default)]
pub(crate) struct ChildRegistry {
    children: DashMap<String, ActorRef>,
}

impl ChildRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a child, returning the previously registered one under
    /// the same id, if any. The caller stops the replaced child.
    pub(crate) fn insert(&self, id: String, child: ActorRef) -> Option<ActorRef> {
        self.children.insert(id, child)
    }

    /// Cloned handle of a child.
    ///
    /// The clone is taken out of the map before use so a child's reaction
    /// can re-enter this registry without holding a shard lock.
    pub(crate) fn get_ref(&self, id: &str) -> Option<ActorRef> {
        self.children.get(id).map(|entry| std::sync::Arc::clone(entry.value()))
    }

    /// Removes a child without stopping it.
    pub(crate) fn remove(&self, id: &str) -> Option<ActorRef> {
        self.children.remove(id).map(|(_, child)| child)
    }

    /// Stops and removes every child, in sorted id order for determinism.
    ///
    /// Each child's `stop` recursively tears down its own children first,
    /// so the overall teardown is post-order.
    pub(crate) fn stop_all(&self) {
        let mut ids: Vec<String> = self.children.iter().map(|e| e.key().clone()).collect();
        ids.sort_unstable();
        for id in ids {
            if let Some((_, child)) = self.children.remove(&id) {
                child.stop();
            }
        }
    }

    /// Sorted snapshot of the live children, as published on states.
    pub(crate) fn snapshot(&self) -> BTreeMap<String, ActorRef> {
        self.children
            .iter()
            .map(|e| (e.key().clone(), std::sync::Arc::clone(e.value())))
            .collect()
    }
}
