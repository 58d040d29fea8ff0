//! # Machine layer: state model, abstract contract, definition builder.
//!
//! The interpreter consumes machines only through the [`Machine`] trait: a
//! pure `initial_state` / `transition` / `resolve_state` triple. Everything
//! else in this module is the concrete declarative layer used to author
//! machines.
//!
//! ## Contents
//! - [`StateValue`] tree of active state ids
//! - [`State`] snapshot produced by a transition (value, context, resolved
//!   actions, children, flags)
//! - [`Machine`], [`StartFrom`] the abstract contract the interpreter
//!   drives
//! - [`MachineDefinition`], [`MachineBuilder`] declarative statecharts:
//!   guarded transitions, entry/exit actions, transient (`always`)
//!   transitions, `after` delays, `invoke`, context `assign`
//!
//! ## Rules
//! - `transition` is **pure**: it folds `assign`s into the context and
//!   returns the remaining actions as data; it never executes anything.
//! - Transient transitions chain to quiescence inside a single
//!   `transition` call, so observers see only the resting state of each
//!   macrostep.
//! - `after(N)` compiles to an entry `send(.., delay: N, id)` plus an exit
//!   `cancel(id)`; `invoke` compiles to entry `start` plus exit `stop`.

mod builder;
mod definition;
mod state;
mod value;

#[allow(clippy::module_inception)]
mod machine;

pub use builder::{InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
pub use definition::MachineDefinition;
pub use machine::{Machine, StartFrom};
pub use state::{Context, State};
pub use value::StateValue;
