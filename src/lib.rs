//! # statevisor
//!
//! **Statevisor** is a statechart interpreter library.
//!
//! It executes hierarchical finite-state machines extended with internal
//! event queues, delayed/cancellable events, transient (eventless)
//! transitions, guarded transitions, context-assigning actions, and a tree
//! of communicating actors. The crate is designed as a building block for
//! higher-level orchestration: the interpreter is mechanism, recovery and
//! policy stay declarative in the machine.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Interpreter**   | Lifecycle, FIFO macrostep loop, deferred pre-start events.         | [`Interpreter`], [`interpret`], [`Status`]  |
//! | **Machines**      | Declarative statecharts with guards, `after`, `invoke`, `assign`.  | [`MachineDefinition`], [`Machine`]          |
//! | **Actions**       | Resolved send/raise/cancel/log/start/stop, expression-valued.      | [`Action`], [`SendSpec`], [`Target`]        |
//! | **Actors**        | Child behaviors: machine, future, stream, callback.                | [`Behavior`], [`ActorRef`], [`ActorHandle`] |
//! | **Clocks**        | Pluggable delayed dispatch; deterministic tests.                   | [`Clock`], [`TokioClock`], [`SimulatedClock`] |
//! | **Observation**   | Replay-latest subscriptions, transition and done listeners.        | [`Observer`], [`Subscription`]              |
//! | **Errors**        | Typed errors for the runtime and the definition layer.             | [`InterpreterError`], [`DefinitionError`]   |
//!
//! ```no_run
//! use std::time::Duration;
//! use statevisor::{interpret, InterpreterOptions, MachineDefinition};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lights = MachineDefinition::builder("lights")
//!     .initial("green")
//!     .state("green", |s| s.after(Duration::from_secs(30), "yellow"))
//!     .state("yellow", |s| s.after(Duration::from_secs(5), "red"))
//!     .state("red", |s| s.after(Duration::from_secs(30), "green"))
//!     .build()?;
//!
//! let service = interpret(lights, InterpreterOptions::default());
//! service.subscribe_fn(|state| println!("-> {}", state.value));
//! service.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! ---

mod actions;
mod actor_ref;
mod behaviors;
mod clock;
mod config;
mod core;
mod error;
mod events;
mod machine;
mod subscribers;

// ---- Public re-exports ----

pub use actions::{Action, Expr, ExprFn, Guard, SendSpec, Target};
pub use actor_ref::{ActorHandle, ActorRef};
pub use behaviors::{
    Behavior, BehaviorFuture, BehaviorStream, CallbackReceiver, CallbackSender, Disposer,
};
pub use clock::{Clock, SimulatedClock, TimerCallback, TimerHandle, TokioClock};
pub use config::{InterpreterOptions, Logger};
pub use crate::core::{Interpreter, Status};
pub use error::{DefinitionError, InterpreterError};
pub use events::{Event, EventEnvelope, INIT_EVENT};
pub use machine::{
    Context, InvokeBuilder, Machine, MachineBuilder, MachineDefinition, StartFrom, State,
    StateBuilder, StateValue, TransitionBuilder,
};
pub use subscribers::{FnObserver, Observer, ObserverId, Subscription};

use std::sync::Arc;

/// Creates an uninitialized [`Interpreter`] for `machine`.
///
/// The single entry point of the crate: configuration goes through
/// [`InterpreterOptions`], execution starts with
/// [`Interpreter::start`].
pub fn interpret<M: Machine>(machine: M, options: InterpreterOptions) -> Interpreter {
    Interpreter::new(Arc::new(machine), options)
}
