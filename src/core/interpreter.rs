//! # Interpreter: statechart actor facade and macrostep loop.
//!
//! [`Interpreter`] owns the runtime of one statechart actor: the event
//! queue, child registry, delayed-send registry, and observer set. It
//! drives the machine's pure `transition` through a reentrancy-guarded
//! flush loop and executes the resolved actions of each entered state.
//!
//! - Start once with [`start`](Interpreter::start) (idempotent), or resume
//!   from a restored state with [`start_from`](Interpreter::start_from)
//! - Feed events with [`send`](Interpreter::send); events sent before
//!   `start` are deferred by default
//! - Observe with [`subscribe`](Interpreter::subscribe) (replay-latest),
//!   [`on_transition`](Interpreter::on_transition), and
//!   [`on_done`](Interpreter::on_done)
//! - Tear down with [`stop`](Interpreter::stop): delays cancelled,
//!   children stopped post-order, observers completed exactly once

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;

use crate::actor_ref::{ActorHandle, ActorRef};
use crate::clock::Clock;
use crate::config::{InterpreterOptions, Logger};
use crate::error::{DefinitionError, InterpreterError};
use crate::events::{Event, EventEnvelope, EventQueue};
use crate::machine::{Machine, StartFrom, State};
use crate::subscribers::{
    ChannelObserver, FnObserver, Observer, ObserverId, ObserverSet, Subscription,
};

use super::registry::ChildRegistry;
use super::sends::DelayedSends;

/// Interpreter lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Created, not yet started. Sends are deferred or rejected.
    NotStarted,
    /// Processing events.
    Running,
    /// Stopped; state is frozen and sends are dropped.
    Stopped,
}

type DoneListener = Box<dyn Fn(&Event) + Send + Sync>;

/// A running statechart actor.
///
/// Created by [`interpret`](crate::interpret). Cheap to share through
/// [`handle`](Interpreter::handle); the `Interpreter` value itself owns the
/// actor — dropping it (for a root actor) releases the runtime.
pub struct Interpreter {
    pub(crate) core: Arc<ActorCore>,
}

/// Shared internals of one actor.
pub(crate) struct ActorCore {
    id: String,
    machine: Arc<dyn Machine>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) logger: Logger,
    defer_events: bool,
    pub(crate) parent: Option<ActorRef>,
    status: Mutex<Status>,
    state: Mutex<Option<State>>,
    pub(crate) queue: EventQueue,
    flushing: AtomicBool,
    pub(crate) children: ChildRegistry,
    pub(crate) delays: DelayedSends,
    observers: Arc<ObserverSet>,
    done_listeners: Mutex<Vec<DoneListener>>,
    weak_self: Weak<ActorCore>,
}

impl Interpreter {
    /// Creates an uninitialized interpreter for `machine`.
    pub fn new(machine: Arc<dyn Machine>, options: InterpreterOptions) -> Self {
        let id = options
            .id
            .unwrap_or_else(|| machine.id().to_string());
        let core = Arc::new_cyclic(|weak| ActorCore {
            id,
            machine,
            clock: options.clock,
            logger: options.logger,
            defer_events: options.defer_events,
            parent: options.parent,
            status: Mutex::new(Status::NotStarted),
            state: Mutex::new(None),
            queue: EventQueue::new(),
            flushing: AtomicBool::new(false),
            children: ChildRegistry::new(),
            delays: DelayedSends::new(),
            observers: Arc::new(ObserverSet::new()),
            done_listeners: Mutex::new(Vec::new()),
            weak_self: weak.clone(),
        });
        Self { core }
    }

    /// Interpreter identity.
    pub fn id(&self) -> &str {
        &self.core.id
    }

    /// Current lifecycle phase.
    pub fn status(&self) -> Status {
        *self.core.lock_status()
    }

    /// Latest published state; `None` before `start`.
    pub fn state(&self) -> Option<State> {
        self.core.lock_state().clone()
    }

    /// The machine's initial state. Pure: reading it spawns nothing.
    pub fn initial_state(&self) -> State {
        self.core.machine.initial_state()
    }

    /// The clock this interpreter schedules delayed sends on.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.core.clock)
    }

    /// Sorted snapshot of live children.
    pub fn children(&self) -> BTreeMap<String, ActorRef> {
        self.core.children.snapshot()
    }

    /// Actor handle for this interpreter, valid while it lives.
    pub fn handle(&self) -> ActorRef {
        self.core.self_ref()
    }

    /// Enters the running state exactly once; later calls are no-ops.
    ///
    /// Executes the initial state's entry actions, publishes it, then
    /// drains any deferred events.
    pub fn start(&self) -> Result<(), InterpreterError> {
        self.core.start(None)
    }

    /// Starts from an explicit initial state.
    ///
    /// Actions carried on a restored [`StartFrom::State`] are executed;
    /// for the other forms the machine re-derives the configuration's
    /// entry actions. Fails with
    /// [`InterpreterError::InvalidInitialState`] when the reference cannot
    /// be resolved.
    pub fn start_from(&self, from: StartFrom) -> Result<(), InterpreterError> {
        self.core.start(Some(from))
    }

    /// Stops the interpreter: cancels delays, stops children post-order,
    /// completes observers. Idempotent; a no-op before `start`.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Sends an event.
    ///
    /// - running: enqueue and flush
    /// - uninitialized with `defer_events` (default): buffered until start
    /// - uninitialized otherwise: [`InterpreterError::UninitializedSend`]
    /// - stopped: silently dropped
    pub fn send(&self, event: impl Into<Event>) -> Result<(), InterpreterError> {
        self.core
            .send_envelope(EventEnvelope::external(event.into()))
    }

    /// Routes an event to a child actor's inbox. The `#_internal` id
    /// routes to this interpreter itself.
    pub fn send_to(
        &self,
        child: &str,
        event: impl Into<Event>,
    ) -> Result<(), InterpreterError> {
        if child == super::executor::INTERNAL_TARGET {
            return self.send(event);
        }
        match self.core.children.get_ref(child) {
            Some(target) => {
                target.send(event.into());
                Ok(())
            }
            None => Err(InterpreterError::ActionFailed {
                action: "send",
                message: format!("unknown child '{child}'"),
            }),
        }
    }

    /// Pure query: the state `event` would produce, without mutating the
    /// interpreter or firing actions.
    pub fn next_state(&self, event: impl Into<Event>) -> State {
        let event = event.into();
        let current = self
            .state()
            .unwrap_or_else(|| self.core.machine.initial_state());
        self.core.machine.transition(&current, &event)
    }

    /// Registers an observer. If the interpreter is running, the current
    /// state is delivered synchronously before this returns.
    pub fn subscribe(&self, observer: impl Observer) -> Subscription {
        self.core.subscribe(Arc::new(observer))
    }

    /// Subscribes with a `next` closure.
    pub fn subscribe_fn(&self, next: impl Fn(&State) + Send + Sync + 'static) -> Subscription {
        self.core.subscribe(Arc::new(FnObserver::new(next)))
    }

    /// Subscribes with `next`, `error`, and `complete` closures.
    pub fn subscribe_with(
        &self,
        next: impl Fn(&State) + Send + Sync + 'static,
        error: impl Fn(&InterpreterError) + Send + Sync + 'static,
        complete: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.core.subscribe(Arc::new(
            FnObserver::new(next).on_error(error).on_complete(complete),
        ))
    }

    /// Channel-based subscription for stream-library interop.
    ///
    /// Every published state (starting with the current one, when already
    /// running) is forwarded to the returned receiver; the channel closes
    /// when the interpreter stops. Wrap it in a `ReceiverStream` to feed
    /// `futures` combinators.
    pub fn subscribe_channel(&self) -> tokio::sync::mpsc::UnboundedReceiver<State> {
        let (observer, receiver) = ChannelObserver::new();
        // The subscription handle is intentionally dropped: the channel is
        // detached by closing the receiver, or by interpreter completion.
        let _ = self.core.subscribe(Arc::new(observer));
        receiver
    }

    /// Registers a transition listener; remove it with
    /// [`off`](Interpreter::off). Replay-latest applies as for
    /// `subscribe`.
    pub fn on_transition(
        &self,
        listener: impl Fn(&State, &Event) + Send + Sync + 'static,
    ) -> ObserverId {
        let observer: Arc<dyn Observer> =
            Arc::new(FnObserver::new(move |state| listener(state, &state.event)));
        let id = self.core.observers.add(Arc::clone(&observer));
        self.core.replay_to(&observer);
        id
    }

    /// Removes a transition listener. Idempotent.
    pub fn off(&self, listener: ObserverId) {
        self.core.observers.remove(listener);
    }

    /// Registers a listener fired once when the machine reaches a
    /// top-level final state. Fires immediately when it already has.
    pub fn on_done(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> &Self {
        self.core.on_done(Box::new(listener));
        self
    }
}

impl ActorCore {
    fn lock_status(&self) -> std::sync::MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<State>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Weak actor handle for self, handed to children and timers.
    pub(crate) fn self_ref(&self) -> ActorRef {
        Arc::new(CoreHandle {
            id: self.id.clone(),
            core: self.weak_self.clone(),
        })
    }

    /// Weak self for closures (delayed-send callbacks) that must not keep
    /// the actor alive.
    pub(crate) fn downgrade(&self) -> Weak<ActorCore> {
        self.weak_self.clone()
    }

    fn start(&self, from: Option<StartFrom>) -> Result<(), InterpreterError> {
        let initial = {
            let mut status = self.lock_status();
            if *status != Status::NotStarted {
                return Ok(());
            }
            let initial = match from {
                None => self.machine.initial_state(),
                Some(from) => self
                    .machine
                    .resolve_state(from)
                    .map_err(|e| self.invalid_initial(e))?,
            };
            *status = Status::Running;
            initial
        };

        // The initial macrostep runs under the flush guard so that sends
        // from entry actions and observers are queued, not recursed into.
        self.flushing.store(true, AtomicOrdering::SeqCst);
        let done = self.commit(initial, &EventEnvelope::external(Event::init()));
        if !done {
            self.queue.drain_deferred();
            self.drain();
        }
        self.flushing.store(false, AtomicOrdering::SeqCst);
        self.flush();
        Ok(())
    }

    fn invalid_initial(&self, error: DefinitionError) -> InterpreterError {
        let state = match error {
            DefinitionError::UnknownState { state, .. } => state,
            DefinitionError::UnknownInitial { state, .. } => state,
            DefinitionError::MalformedRecord { message, .. } => message,
            other => other.to_string(),
        };
        InterpreterError::InvalidInitialState {
            state,
            machine: self.machine.id().to_string(),
        }
    }

    pub(crate) fn send_envelope(&self, envelope: EventEnvelope) -> Result<(), InterpreterError> {
        let status = *self.lock_status();
        match status {
            Status::Running => {
                self.queue.push(envelope);
                self.flush();
                Ok(())
            }
            Status::NotStarted => {
                if self.defer_events {
                    self.queue.defer(envelope);
                    Ok(())
                } else {
                    Err(InterpreterError::UninitializedSend {
                        event: envelope.event.name,
                        id: self.id.clone(),
                    })
                }
            }
            Status::Stopped => Ok(()),
        }
    }

    /// Drives the queue until quiescent. Reentrant calls (from actions or
    /// observer callbacks) return immediately; the outer flush drains what
    /// they enqueued.
    fn flush(&self) {
        // Pin the core for the duration: a reaction triggered mid-flush
        // (e.g. the parent exiting the invoking state) may drop the last
        // registry reference to this actor while it is still on the stack.
        let _keep_alive = self.weak_self.upgrade();
        while self
            .flushing
            .compare_exchange(false, true, AtomicOrdering::SeqCst, AtomicOrdering::SeqCst)
            .is_ok()
        {
            self.drain();
            self.flushing.store(false, AtomicOrdering::SeqCst);
            // An event enqueued between the final pop and the guard reset
            // would otherwise sit until the next send.
            if self.queue.is_empty() || *self.lock_status() != Status::Running {
                break;
            }
        }
    }

    fn drain(&self) {
        loop {
            if *self.lock_status() != Status::Running {
                break;
            }
            let Some(envelope) = self.queue.pop() else { break };
            let Some(current) = self.lock_state().clone() else { break };
            let next = self.machine.transition(&current, &envelope.event);
            if self.commit(next, &envelope) {
                break;
            }
        }
    }

    /// Runs one microstep's effects: executes the entered state's actions,
    /// snapshots children, publishes the state. Returns `true` when the
    /// machine reached a top-level final state (the interpreter stops).
    fn commit(&self, mut state: State, envelope: &EventEnvelope) -> bool {
        self.execute_actions(&state, envelope);
        state.children = self.children.snapshot();
        let done_data = state.done_data.clone();
        let done = state.done;
        *self.lock_state() = Some(state.clone());
        self.observers.next(&state);

        if !done {
            return false;
        }

        let done_event = Event::done_state(&self.id, done_data.clone().unwrap_or(Value::Null));
        self.fire_done(&done_event);
        if let Some(parent) = &self.parent {
            parent.send_from(
                Event::done_invoke(&self.id, done_data.unwrap_or(Value::Null)),
                self.self_ref(),
            );
        }
        self.stop();
        true
    }

    pub(crate) fn stop(&self) {
        {
            let mut status = self.lock_status();
            match *status {
                Status::Running => *status = Status::Stopped,
                Status::NotStarted | Status::Stopped => return,
            }
        }
        self.children.stop_all();
        self.delays.cancel_all(self.clock.as_ref());
        self.queue.clear();
        self.observers.complete();
    }

    fn subscribe(&self, observer: Arc<dyn Observer>) -> Subscription {
        let id = self.observers.add(Arc::clone(&observer));
        self.replay_to(&observer);
        Subscription::new(&self.observers, id)
    }

    /// Replay-latest: a late observer immediately sees the current state.
    fn replay_to(&self, observer: &Arc<dyn Observer>) {
        if *self.lock_status() != Status::Running {
            return;
        }
        if let Some(state) = self.lock_state().clone() {
            observer.next(&state);
        }
    }

    fn on_done(&self, listener: DoneListener) {
        let finished = {
            let state = self.lock_state();
            state
                .as_ref()
                .filter(|s| s.done)
                .map(|s| Event::done_state(&self.id, s.done_data.clone().unwrap_or(Value::Null)))
        };
        match finished {
            Some(done_event) => listener(&done_event),
            None => self
                .done_listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(listener),
        }
    }

    fn fire_done(&self, done_event: &Event) {
        let listeners: Vec<DoneListener> = std::mem::take(
            &mut *self
                .done_listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for listener in listeners {
            listener(done_event);
        }
    }

    /// Reports an action failure: error channel first, logger fallback.
    pub(crate) fn report_failure(&self, error: InterpreterError) {
        if !self.observers.error(&error) {
            (self.logger)(&format!("[statevisor] {error}"));
        }
    }
}

/// Weak [`ActorHandle`] onto an [`ActorCore`].
///
/// Children and timers hold these, so an actor tree never keeps a cycle of
/// strong references: the parent (or the root `Interpreter` value) owns
/// the lifetime, and sends to a dropped actor are no-ops.
pub(crate) struct CoreHandle {
    id: String,
    core: Weak<ActorCore>,
}

impl ActorHandle for CoreHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, event: Event) {
        if let Some(core) = self.core.upgrade() {
            let _ = core.send_envelope(EventEnvelope::external(event));
        }
    }

    fn send_from(&self, event: Event, origin: ActorRef) {
        if let Some(core) = self.core.upgrade() {
            let _ = core.send_envelope(EventEnvelope::from_actor(event, origin));
        }
    }

    fn stop(&self) {
        if let Some(core) = self.core.upgrade() {
            core.stop();
        }
    }
}
