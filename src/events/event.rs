//! # Event records processed by the interpreter.
//!
//! An [`Event`] is a tagged record: a `name` discriminant plus an arbitrary
//! JSON payload. Strings convert to payload-less events, so
//! `interp.send("TIMER".into())` and
//! `interp.send(Event::new("TIMER"))` are equivalent.
//!
//! Platform events follow the `done.invoke.<id>` / `error.platform.<id>` /
//! `done.state.<id>` naming scheme, produced by the constructors below and
//! matched by machine definitions (e.g. an invoke's `on_done`).
//!
//! [`EventEnvelope`] is the queued form: the event plus the [`ActorRef`] of
//! the actor that sent it, which is what `respond` routes back to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actor_ref::ActorRef;

/// Name of the synthetic event that produces the initial state.
pub const INIT_EVENT: &str = "statevisor.init";

static NULL: Value = Value::Null;

/// Tagged event record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name (the `type` discriminant).
    pub name: String,
    /// Arbitrary payload; `Null` when the event carries none.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Event {
    /// Creates a payload-less event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// The synthetic initialization event.
    pub fn init() -> Self {
        Self::new(INIT_EVENT)
    }

    /// `done.invoke.<id>` — a child actor completed with `data`.
    pub fn done_invoke(id: &str, data: Value) -> Self {
        Self::new(format!("done.invoke.{id}")).with_payload(wrap_data(data))
    }

    /// `error.platform.<id>` — a child actor failed with `data`.
    pub fn error_platform(id: &str, data: Value) -> Self {
        Self::new(format!("error.platform.{id}")).with_payload(wrap_data(data))
    }

    /// `done.state.<id>` — a compound state reached its final child.
    pub fn done_state(id: &str, data: Value) -> Self {
        Self::new(format!("done.state.{id}")).with_payload(wrap_data(data))
    }

    /// The `data` field of the payload, or `Null`.
    ///
    /// Platform events carry their result here, so guards read
    /// `event.data()` rather than digging through the payload.
    pub fn data(&self) -> &Value {
        self.payload.get("data").unwrap_or(&NULL)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

fn wrap_data(data: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("data".to_string(), data);
    Value::Object(map)
}

/// An event as queued: the record plus the sender, when known.
#[derive(Clone)]
pub struct EventEnvelope {
    /// The event itself.
    pub event: Event,
    /// The actor that sent it; `None` for external and self sends.
    pub origin: Option<ActorRef>,
}

impl EventEnvelope {
    /// Wraps an event sent from outside the actor tree.
    pub fn external(event: Event) -> Self {
        Self {
            event,
            origin: None,
        }
    }

    /// Wraps an event sent by another actor.
    pub fn from_actor(event: Event, origin: ActorRef) -> Self {
        Self {
            event,
            origin: Some(origin),
        }
    }
}

impl std::fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("event", &self.event)
            .field("origin", &self.origin.as_ref().map(|o| o.id().to_string()))
            .finish()
    }
}
