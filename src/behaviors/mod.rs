//! # Behaviors: actor templates.
//!
//! A [`Behavior`] is the declarative definition of an actor before
//! instantiation. The interpreter knows exactly four kinds — a closed
//! variant set rather than duck typing:
//!
//! - **Machine** — a nested interpreter; its top-level final state emits
//!   `done.invoke.<id>` to the parent
//! - **Future** — a lazily-created future; resolution emits
//!   `done.invoke.<id>`, failure emits `error.platform.<id>`, then the
//!   actor terminates
//! - **Stream** — a lazily-created event stream; each item is forwarded to
//!   the parent, completion emits `done.invoke.<id>`
//! - **Callback** — an imperative bridge given a sender (emissions to the
//!   parent) and a receiver (events sent to the child); may return a
//!   disposer that runs on stop
//!
//! ## Rules
//! - Factories are **lazy**: nothing runs before the owning interpreter
//!   executes the start action, so reading `initial_state` spawns nothing.
//! - Every spawned actor exposes the same capability set ([`ActorRef`]):
//!   `id`, `send`, `stop`. The kinds differ only in internal wiring.
//! - Panics inside future/stream/callback bodies are caught and surface to
//!   the parent as `error.platform.<id>`.

mod spawn;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde_json::Value;

use crate::actor_ref::ActorRef;
use crate::events::Event;
use crate::machine::Machine;

pub(crate) use spawn::{spawn_behavior, SpawnContext};

/// Future backing a [`Behavior::Future`] actor: resolves to done-data or
/// rejects with error-data.
pub type BehaviorFuture = BoxFuture<'static, Result<Value, Value>>;

/// Lazy factory for [`Behavior::Future`].
pub type FutureFactory = Arc<dyn Fn() -> BehaviorFuture + Send + Sync>;

/// Stream backing a [`Behavior::Stream`] actor.
pub type BehaviorStream = BoxStream<'static, Event>;

/// Lazy factory for [`Behavior::Stream`].
pub type StreamFactory = Arc<dyn Fn() -> BehaviorStream + Send + Sync>;

/// Inbox half handed to a callback behavior: events sent *to* the child.
pub type CallbackReceiver = tokio::sync::mpsc::UnboundedReceiver<Event>;

/// Teardown closure returned by a callback behavior, run on stop.
pub type Disposer = Box<dyn FnOnce() + Send>;

/// Factory for [`Behavior::Callback`].
pub type CallbackFactory =
    Arc<dyn Fn(CallbackSender, CallbackReceiver) -> Option<Disposer> + Send + Sync>;

/// Emission half handed to a callback behavior: events sent to the parent,
/// carrying the child as origin so the parent can `respond`.
#[derive(Clone)]
pub struct CallbackSender {
    pub(crate) parent: ActorRef,
    pub(crate) origin: ActorRef,
}

impl CallbackSender {
    /// Emits an event to the parent actor.
    pub fn send(&self, event: impl Into<Event>) {
        self.parent
            .send_from(event.into(), Arc::clone(&self.origin));
    }
}

/// Declarative actor template.
#[derive(Clone)]
pub enum Behavior {
    /// A nested statechart interpreter.
    Machine(Arc<dyn Machine>),
    /// A one-shot asynchronous computation.
    Future(FutureFactory),
    /// A stream of events forwarded to the parent.
    Stream(StreamFactory),
    /// An imperative send/receive bridge.
    Callback(CallbackFactory),
}

impl Behavior {
    /// Wraps a machine as a child-actor template.
    pub fn machine(machine: impl Machine) -> Self {
        Behavior::Machine(Arc::new(machine))
    }

    /// Wraps an already-shared machine.
    pub fn machine_shared(machine: Arc<dyn Machine>) -> Self {
        Behavior::Machine(machine)
    }

    /// Wraps a future factory. The factory runs when the actor starts,
    /// never earlier.
    pub fn future<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Behavior::Future(Arc::new(move || factory().boxed()))
    }

    /// Wraps a stream factory. The factory runs when the actor starts.
    pub fn stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: futures::Stream<Item = Event> + Send + 'static,
    {
        Behavior::Stream(Arc::new(move || factory().boxed()))
    }

    /// Wraps a callback bridge.
    pub fn callback(
        factory: impl Fn(CallbackSender, CallbackReceiver) -> Option<Disposer> + Send + Sync + 'static,
    ) -> Self {
        Behavior::Callback(Arc::new(factory))
    }

    /// Stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Behavior::Machine(_) => "machine",
            Behavior::Future(_) => "future",
            Behavior::Stream(_) => "stream",
            Behavior::Callback(_) => "callback",
        }
    }
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Behavior::{}", self.as_label())
    }
}
