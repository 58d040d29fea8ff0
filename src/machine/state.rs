//! # State snapshots.
//!
//! A [`State`] is what the machine's pure `transition` returns and what
//! observers receive: the active [`StateValue`], the extended context, the
//! ordered actions still to execute, the live children, and the
//! `changed`/`done` flags.
//!
//! States serialize to a plain record (`to_record`) with `children` reduced
//! to child ids and `actions` to their labels; rehydration goes through
//! `Machine::resolve_state` with [`StartFrom::Record`](super::StartFrom),
//! which re-derives entry actions for the restored configuration.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::actions::Action;
use crate::actor_ref::ActorRef;
use crate::events::Event;

use super::StateValue;

/// Extended state: an arbitrary JSON record.
pub type Context = serde_json::Map<String, Value>;

/// One machine state as observed by subscribers.
#[derive(Clone)]
pub struct State {
    /// Tree of active state ids.
    pub value: StateValue,
    /// Extended state after all assigns folded in.
    pub context: Context,
    /// Resolved actions to execute on entering this state, in order.
    pub actions: Vec<Action>,
    /// Live child actors, keyed by id.
    pub children: BTreeMap<String, ActorRef>,
    /// Recorded history configuration, carried through serialization.
    pub history_value: Option<Value>,
    /// Whether this state differs from its predecessor.
    pub changed: bool,
    /// Whether a top-level final state is active.
    pub done: bool,
    /// The event that produced this state.
    pub event: Event,
    /// Done-data of the reached top-level final state, if any.
    pub(crate) done_data: Option<Value>,
}

impl State {
    /// True when `descriptor` (dotted, possibly partial) matches the active
    /// configuration.
    pub fn matches(&self, descriptor: &str) -> bool {
        self.value.matches(descriptor)
    }

    /// Ids of the live children, sorted.
    pub fn child_ids(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// Serializes to a plain record:
    ///
    /// ```text
    /// { "value": .., "context": .., "actions": ["send", ..],
    ///   "children": ["childActor", ..], "historyValue": ..,
    ///   "done": bool, "event": {..} }
    /// ```
    pub fn to_record(&self) -> Value {
        let mut record = serde_json::Map::new();
        record.insert(
            "value".into(),
            serde_json::to_value(&self.value).unwrap_or(Value::Null),
        );
        record.insert("context".into(), Value::Object(self.context.clone()));
        record.insert(
            "actions".into(),
            Value::Array(
                self.actions
                    .iter()
                    .map(|a| Value::String(a.as_label().to_string()))
                    .collect(),
            ),
        );
        record.insert(
            "children".into(),
            Value::Array(
                self.children
                    .keys()
                    .map(|id| Value::String(id.clone()))
                    .collect(),
            ),
        );
        record.insert(
            "historyValue".into(),
            self.history_value.clone().unwrap_or(Value::Null),
        );
        record.insert("done".into(), Value::Bool(self.done));
        record.insert(
            "event".into(),
            serde_json::to_value(&self.event).unwrap_or(Value::Null),
        );
        Value::Object(record)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("value", &self.value.dotted())
            .field("context", &self.context)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.as_label()).collect::<Vec<_>>(),
            )
            .field("children", &self.child_ids())
            .field("changed", &self.changed)
            .field("done", &self.done)
            .field("event", &self.event.name)
            .finish()
    }
}
