//! # Behavior instantiation.
//!
//! Turns a [`Behavior`] into a live [`ActorRef`]. Machine behaviors become
//! nested interpreters started synchronously; future/stream/callback
//! behaviors run on spawned tasks cancelled through a
//! [`CancellationToken`], with panics isolated and reported to the parent
//! as `error.platform.<id>`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::actor_ref::{ActorHandle, ActorRef};
use crate::clock::Clock;
use crate::config::{InterpreterOptions, Logger};
use crate::core::Interpreter;
use crate::events::Event;

use super::{Behavior, CallbackSender};

/// What a child needs from the actor spawning it.
pub(crate) struct SpawnContext {
    /// Child registry key, also the actor's identity.
    pub(crate) id: String,
    /// The spawning actor.
    pub(crate) parent: ActorRef,
    /// Clock shared down the actor tree.
    pub(crate) clock: Arc<dyn Clock>,
    /// Logger shared down the actor tree.
    pub(crate) logger: Logger,
}

/// Instantiates `behavior` and returns the child's handle.
pub(crate) fn spawn_behavior(behavior: &Behavior, ctx: SpawnContext) -> ActorRef {
    match behavior {
        Behavior::Machine(machine) => spawn_machine(Arc::clone(machine), ctx),
        Behavior::Future(factory) => spawn_future(factory(), ctx),
        Behavior::Stream(factory) => spawn_stream(factory(), ctx),
        Behavior::Callback(factory) => spawn_callback(Arc::clone(factory), ctx),
    }
}

fn spawn_machine(machine: Arc<dyn crate::machine::Machine>, ctx: SpawnContext) -> ActorRef {
    let child = Interpreter::new(
        machine,
        InterpreterOptions {
            clock: ctx.clock,
            logger: ctx.logger,
            defer_events: true,
            id: Some(ctx.id.clone()),
            parent: Some(ctx.parent),
        },
    );
    if let Err(e) = child.start() {
        eprintln!("[statevisor] child '{}' failed to start: {e}", ctx.id);
    }
    // The registry entry is what keeps a machine child alive: this handle
    // owns the nested interpreter, while the child only holds a weak link
    // back to its parent.
    Arc::new(ChildMachineHandle { child })
}

/// Owning handle for an invoked machine child.
struct ChildMachineHandle {
    child: Interpreter,
}

impl ActorHandle for ChildMachineHandle {
    fn id(&self) -> &str {
        self.child.id()
    }

    fn send(&self, event: Event) {
        let _ = self.child.send(event);
    }

    fn send_from(&self, event: Event, origin: ActorRef) {
        use crate::events::EventEnvelope;
        let _ = self
            .child
            .core
            .send_envelope(EventEnvelope::from_actor(event, origin));
    }

    fn stop(&self) {
        self.child.stop();
    }
}

/// Handle for task-backed actors (future, stream, callback).
struct TaskActorHandle {
    id: String,
    cancel: CancellationToken,
    inbox: Option<mpsc::UnboundedSender<Event>>,
}

impl ActorHandle for TaskActorHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: Event) {
        if let Some(inbox) = &self.inbox {
            let _ = inbox.send(event);
        }
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}

fn spawn_future(future: super::BehaviorFuture, ctx: SpawnContext) -> ActorRef {
    let token = CancellationToken::new();
    let handle: ActorRef = Arc::new(TaskActorHandle {
        id: ctx.id.clone(),
        cancel: token.clone(),
        inbox: None,
    });

    let child = Arc::clone(&handle);
    let parent = ctx.parent;
    let id = ctx.id;
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            outcome = AssertUnwindSafe(future).catch_unwind() => {
                let event = match outcome {
                    Ok(Ok(data)) => Event::done_invoke(&id, data),
                    Ok(Err(data)) => Event::error_platform(&id, data),
                    Err(panic) => Event::error_platform(&id, Value::String(panic_message(panic))),
                };
                parent.send_from(event, child);
            }
        }
    });

    handle
}

fn spawn_stream(mut stream: super::BehaviorStream, ctx: SpawnContext) -> ActorRef {
    let token = CancellationToken::new();
    let handle: ActorRef = Arc::new(TaskActorHandle {
        id: ctx.id.clone(),
        cancel: token.clone(),
        inbox: None,
    });

    let child = Arc::clone(&handle);
    let parent = ctx.parent;
    let id = ctx.id;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                item = stream.next() => match item {
                    Some(event) => parent.send_from(event, Arc::clone(&child)),
                    None => {
                        parent.send_from(Event::done_invoke(&id, Value::Null), child);
                        return;
                    }
                }
            }
        }
    });

    handle
}

fn spawn_callback(factory: super::CallbackFactory, ctx: SpawnContext) -> ActorRef {
    let token = CancellationToken::new();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let handle: ActorRef = Arc::new(TaskActorHandle {
        id: ctx.id.clone(),
        cancel: token.clone(),
        inbox: Some(inbox_tx),
    });

    let sender = CallbackSender {
        parent: Arc::clone(&ctx.parent),
        origin: Arc::clone(&handle),
    };
    let child = Arc::clone(&handle);
    let parent = ctx.parent;
    let id = ctx.id;
    tokio::spawn(async move {
        let disposer = std::panic::catch_unwind(AssertUnwindSafe(|| factory(sender, inbox_rx)));
        match disposer {
            Ok(disposer) => {
                token.cancelled().await;
                if let Some(dispose) = disposer {
                    if std::panic::catch_unwind(AssertUnwindSafe(dispose)).is_err() {
                        eprintln!("[statevisor] callback '{id}' panicked during dispose");
                    }
                }
            }
            Err(panic) => {
                parent.send_from(
                    Event::error_platform(&id, Value::String(panic_message(panic))),
                    child,
                );
            }
        }
    });

    handle
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "behavior panicked".to_string()
    }
}
