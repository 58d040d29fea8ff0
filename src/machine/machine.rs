//! # Abstract machine contract.
//!
//! The interpreter drives machines exclusively through this trait; the
//! concrete [`MachineDefinition`](super::MachineDefinition) is one
//! implementation of it.

use serde_json::Value;

use crate::error::DefinitionError;
use crate::events::Event;

use super::{State, StateValue};

/// Where to resume when `start` is given an explicit initial state.
pub enum StartFrom {
    /// A live state; its carried actions are re-executed on start.
    State(Box<State>),
    /// An active-configuration tree; entry actions are re-derived.
    Value(StateValue),
    /// A state id (top-level or dotted); entry actions are re-derived.
    Id(String),
    /// A serialized state record as produced by `State::to_record`;
    /// context and history are restored, entry actions re-derived.
    Record(Value),
}

/// Pure statechart contract consumed by the interpreter.
///
/// ## Rules
/// - `initial_state` is idempotent and side-effect-free: reading it any
///   number of times spawns no actors and fires no actions.
/// - `transition` never mutates the machine or executes actions; it folds
///   context assigns and returns the rest as data.
pub trait Machine: Send + Sync + 'static {
    /// Stable machine identity.
    fn id(&self) -> &str;

    /// The machine's initial state, with its entry actions attached.
    fn initial_state(&self) -> State;

    /// Computes the state after processing `event` in `state`.
    ///
    /// Returns an unchanged state (`changed = false`, no actions) when no
    /// transition matches.
    fn transition(&self, state: &State, event: &Event) -> State;

    /// Rehydrates a state for `start(initial)`.
    fn resolve_state(&self, from: StartFrom) -> Result<State, DefinitionError>;
}
