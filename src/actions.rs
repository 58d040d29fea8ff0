//! # Resolved actions and expression values.
//!
//! A [`State`](crate::machine::State) carries the ordered list of
//! [`Action`]s to run on entry; the executor in [`core`](crate::core)
//! interprets them. Actions are **data**: the machine's pure `transition`
//! never executes anything itself, it only returns what should happen.
//!
//! Dynamic parts (event to send, delay, send target, log line) are
//! [`Expr`] values: either a literal or a closure evaluated against
//! `(context, event)` at action-execution time, where `event` is the one
//! that caused the state entry.
//!
//! ## Kinds
//! - `send` — enqueue on a target inbox (self by default), optionally after
//!   a delay, addressable by id for cancellation
//! - `raise` — synchronous self-send, drained within the current macrostep
//! - `cancel` — remove a pending delayed send by id
//! - `log` — evaluate a line and hand it to the interpreter's logger
//! - `start` / `stop` — child actor lifecycle
//!
//! `assign` has no action here: context updates are folded into the state
//! by the machine's pure transition before the executor ever runs.

use std::sync::Arc;
use std::time::Duration;

use crate::behaviors::Behavior;
use crate::events::Event;
use crate::machine::Context;

/// Guard predicate evaluated against `(context, event)`.
pub type Guard = Arc<dyn Fn(&Context, &Event) -> bool + Send + Sync>;

/// Closure form of an expression value.
pub type ExprFn<T> = Arc<dyn Fn(&Context, &Event) -> T + Send + Sync>;

/// A literal or a deferred computation over `(context, event)`.
pub enum Expr<T> {
    /// Fixed value.
    Value(T),
    /// Evaluated at action-execution time.
    Fn(ExprFn<T>),
}

impl<T: Clone> Expr<T> {
    /// Evaluates the expression.
    pub fn eval(&self, context: &Context, event: &Event) -> T {
        match self {
            Expr::Value(v) => v.clone(),
            Expr::Fn(f) => f(context, event),
        }
    }
}

impl<T: Clone> Clone for Expr<T> {
    fn clone(&self) -> Self {
        match self {
            Expr::Value(v) => Expr::Value(v.clone()),
            Expr::Fn(f) => Expr::Fn(Arc::clone(f)),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Value(v) => write!(f, "{v:?}"),
            Expr::Fn(_) => write!(f, "<expr>"),
        }
    }
}

/// Where a `send` delivers.
#[derive(Clone, Debug)]
pub enum Target {
    /// The sending actor itself (the default; also `#_internal`).
    Internal,
    /// The parent actor; the send is a no-op without one.
    Parent,
    /// The origin of the event being processed (`respond`).
    Origin,
    /// A child actor looked up by id.
    Child(Expr<String>),
}

/// A resolved `send` action.
#[derive(Clone, Debug)]
pub struct SendSpec {
    /// Event to deliver.
    pub event: Expr<Event>,
    /// Delivery target; self when unspecified.
    pub to: Target,
    /// Schedule through the clock instead of delivering immediately.
    pub delay: Option<Expr<Duration>>,
    /// Cancellation id; defaults to the event name.
    pub id: Option<String>,
}

impl SendSpec {
    /// Creates an immediate self-send of `event`.
    pub fn new(event: impl Into<Event>) -> Self {
        Self {
            event: Expr::Value(event.into()),
            to: Target::Internal,
            delay: None,
            id: None,
        }
    }

    /// Creates a send whose event is computed at execution time.
    pub fn from_expr(event: ExprFn<Event>) -> Self {
        Self {
            event: Expr::Fn(event),
            to: Target::Internal,
            delay: None,
            id: None,
        }
    }

    /// Sets the delivery target.
    pub fn with_target(mut self, to: Target) -> Self {
        self.to = to;
        self
    }

    /// Delays delivery by a fixed duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(Expr::Value(delay));
        self
    }

    /// Delays delivery by a duration computed at execution time.
    pub fn with_delay_expr(mut self, delay: ExprFn<Duration>) -> Self {
        self.delay = Some(Expr::Fn(delay));
        self
    }

    /// Sets the cancellation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A resolved action, ready for the executor.
#[derive(Clone, Debug)]
pub enum Action {
    /// Enqueue an event on a target inbox, possibly delayed.
    Send(SendSpec),
    /// Synchronous self-send, drained within the current macrostep.
    Raise(Expr<Event>),
    /// Cancel a pending delayed send by id. Silent if not found.
    Cancel(Expr<String>),
    /// Evaluate a line and pass it to the logger.
    Log(Expr<String>),
    /// Instantiate a behavior as a child actor under `id`.
    Start {
        /// Child registry key.
        id: String,
        /// Actor template to instantiate.
        behavior: Behavior,
    },
    /// Stop a child actor by id and remove it from the registry.
    Stop(Expr<String>),
}

impl Action {
    /// Immediate self-send.
    pub fn send(event: impl Into<Event>) -> Self {
        Action::Send(SendSpec::new(event))
    }

    /// Send with full control over target, delay, and id.
    pub fn send_spec(spec: SendSpec) -> Self {
        Action::Send(spec)
    }

    /// Send to a child actor by id.
    pub fn send_to(event: impl Into<Event>, child: impl Into<String>) -> Self {
        Action::Send(SendSpec::new(event).with_target(Target::Child(Expr::Value(child.into()))))
    }

    /// Send to the parent actor; no-op without a parent.
    pub fn send_parent(event: impl Into<Event>) -> Self {
        Action::Send(SendSpec::new(event).with_target(Target::Parent))
    }

    /// Send back to the origin of the event being processed.
    pub fn respond(event: impl Into<Event>) -> Self {
        Action::Send(SendSpec::new(event).with_target(Target::Origin))
    }

    /// Raise an event on self.
    pub fn raise(event: impl Into<Event>) -> Self {
        Action::Raise(Expr::Value(event.into()))
    }

    /// Cancel a delayed send by literal id.
    pub fn cancel(id: impl Into<String>) -> Self {
        Action::Cancel(Expr::Value(id.into()))
    }

    /// Cancel a delayed send whose id is computed at execution time.
    pub fn cancel_expr(f: impl Fn(&Context, &Event) -> String + Send + Sync + 'static) -> Self {
        Action::Cancel(Expr::Fn(Arc::new(f)))
    }

    /// Log a fixed line.
    pub fn log(message: impl Into<String>) -> Self {
        Action::Log(Expr::Value(message.into()))
    }

    /// Log a line computed at execution time.
    pub fn log_expr(f: impl Fn(&Context, &Event) -> String + Send + Sync + 'static) -> Self {
        Action::Log(Expr::Fn(Arc::new(f)))
    }

    /// Start a child actor.
    pub fn start_child(id: impl Into<String>, behavior: Behavior) -> Self {
        Action::Start {
            id: id.into(),
            behavior,
        }
    }

    /// Stop a child actor by literal id.
    pub fn stop_child(id: impl Into<String>) -> Self {
        Action::Stop(Expr::Value(id.into()))
    }

    /// Stop a child actor whose id is computed at execution time.
    pub fn stop_child_expr(f: impl Fn(&Context, &Event) -> String + Send + Sync + 'static) -> Self {
        Action::Stop(Expr::Fn(Arc::new(f)))
    }

    /// Stable label for logs and serialized state records.
    pub fn as_label(&self) -> &'static str {
        match self {
            Action::Send(_) => "send",
            Action::Raise(_) => "raise",
            Action::Cancel(_) => "cancel",
            Action::Log(_) => "log",
            Action::Start { .. } => "start",
            Action::Stop(_) => "stop",
        }
    }
}
