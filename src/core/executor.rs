//! # Action executor.
//!
//! Interprets the resolved actions carried on an entered state. Runs
//! inside the flush loop, so anything it enqueues (raises, immediate
//! self-sends) is drained within the same macrostep; delayed sends go
//! through the clock and re-enter as fresh top-level sends.
//!
//! Failures (unknown send target, respond without an origin) are reported
//! through [`ActorCore::report_failure`] and swallowed: the interpreter is
//! mechanism, not policy, and recovery is declarative.

use std::sync::Arc;
use std::time::Duration;

use crate::actions::{Action, SendSpec, Target};
use crate::actor_ref::ActorRef;
use crate::behaviors::{spawn_behavior, SpawnContext};
use crate::error::InterpreterError;
use crate::events::{Event, EventEnvelope};
use crate::machine::State;

use super::interpreter::ActorCore;

/// Child-target id that denotes the sending actor itself.
pub(crate) const INTERNAL_TARGET: &str = "#_internal";

/// A send target resolved at schedule time, so the fired callback needs no
/// expression context.
enum DelayedTarget {
    SelfInbox,
    Parent,
    Origin(Option<ActorRef>),
    Child(String),
}

impl ActorCore {
    /// Executes the entered state's actions in order, reporting failures
    /// without aborting the rest.
    pub(crate) fn execute_actions(&self, state: &State, envelope: &EventEnvelope) {
        for action in &state.actions {
            if let Err(error) = self.execute(action, state, envelope) {
                self.report_failure(error);
            }
        }
    }

    fn execute(
        &self,
        action: &Action,
        state: &State,
        envelope: &EventEnvelope,
    ) -> Result<(), InterpreterError> {
        let context = &state.context;
        let trigger = &state.event;

        match action {
            Action::Raise(expr) => {
                // Enqueued directly: the surrounding flush drains it before
                // the macrostep yields.
                let event = expr.eval(context, trigger);
                self.queue.push(EventEnvelope::external(event));
                Ok(())
            }

            Action::Send(spec) => {
                let event = spec.event.eval(context, trigger);
                match &spec.delay {
                    None => self.deliver(&spec.to, event, state, envelope),
                    Some(delay) => {
                        let delay = delay.eval(context, trigger);
                        self.schedule(spec, event, delay, state, envelope);
                        Ok(())
                    }
                }
            }

            Action::Cancel(id) => {
                let id = id.eval(context, trigger);
                self.delays.cancel(&id, self.clock.as_ref());
                Ok(())
            }

            Action::Log(expr) => {
                (self.logger)(&expr.eval(context, trigger));
                Ok(())
            }

            Action::Start { id, behavior } => {
                let child = spawn_behavior(
                    behavior,
                    SpawnContext {
                        id: id.clone(),
                        parent: self.self_ref(),
                        clock: Arc::clone(&self.clock),
                        logger: Arc::clone(&self.logger),
                    },
                );
                // A duplicate id replaces the child; the old one is
                // stopped rather than leaked.
                if let Some(previous) = self.children.insert(id.clone(), child) {
                    previous.stop();
                }
                Ok(())
            }

            Action::Stop(id) => {
                let id = id.eval(context, trigger);
                if let Some(child) = self.children.remove(&id) {
                    child.stop();
                }
                Ok(())
            }
        }
    }

    /// Immediate delivery.
    fn deliver(
        &self,
        target: &Target,
        event: Event,
        state: &State,
        envelope: &EventEnvelope,
    ) -> Result<(), InterpreterError> {
        match target {
            Target::Internal => {
                self.queue.push(EventEnvelope::external(event));
                Ok(())
            }
            Target::Parent => {
                if let Some(parent) = &self.parent {
                    parent.send_from(event, self.self_ref());
                }
                Ok(())
            }
            Target::Origin => match &envelope.origin {
                Some(origin) => {
                    origin.send(event);
                    Ok(())
                }
                None => Err(InterpreterError::ActionFailed {
                    action: "send",
                    message: format!("respond: event '{}' has no origin", envelope.event.name),
                }),
            },
            Target::Child(id) => {
                let id = id.eval(&state.context, &state.event);
                if id == INTERNAL_TARGET {
                    self.queue.push(EventEnvelope::external(event));
                    return Ok(());
                }
                match self.children.get_ref(&id) {
                    Some(child) => {
                        child.send(event);
                        Ok(())
                    }
                    None => Err(InterpreterError::ActionFailed {
                        action: "send",
                        message: format!("unknown child '{id}'"),
                    }),
                }
            }
        }
    }

    /// Schedules a delayed send through the clock and registers it for
    /// cancellation under its send id (authored `id`, else the event
    /// name).
    fn schedule(
        &self,
        spec: &SendSpec,
        event: Event,
        delay: Duration,
        state: &State,
        envelope: &EventEnvelope,
    ) {
        let send_id = spec.id.clone().unwrap_or_else(|| event.name.clone());
        let target = match &spec.to {
            Target::Internal => DelayedTarget::SelfInbox,
            Target::Parent => DelayedTarget::Parent,
            Target::Origin => DelayedTarget::Origin(envelope.origin.clone()),
            Target::Child(id) => match id.eval(&state.context, &state.event) {
                id if id == INTERNAL_TARGET => DelayedTarget::SelfInbox,
                id => DelayedTarget::Child(id),
            },
        };

        let weak = self.downgrade();
        let callback = Box::new(move || {
            if let Some(core) = weak.upgrade() {
                core.fire_delayed(target, event);
            }
        });
        let handle = self.clock.set_timeout(callback, delay);
        self.delays.register(send_id, handle);
    }

    /// A delayed send fired: it arrives as a fresh top-level send,
    /// starting a new macrostep.
    fn fire_delayed(&self, target: DelayedTarget, event: Event) {
        match target {
            DelayedTarget::SelfInbox => {
                let _ = self.send_envelope(EventEnvelope::external(event));
            }
            DelayedTarget::Parent => {
                if let Some(parent) = &self.parent {
                    parent.send_from(event, self.self_ref());
                }
            }
            DelayedTarget::Origin(Some(origin)) => origin.send(event),
            DelayedTarget::Origin(None) => {
                self.report_failure(InterpreterError::ActionFailed {
                    action: "send",
                    message: format!("respond: delayed event '{}' has no origin", event.name),
                });
            }
            DelayedTarget::Child(id) => match self.children.get_ref(&id) {
                Some(child) => child.send(event),
                None => self.report_failure(InterpreterError::ActionFailed {
                    action: "send",
                    message: format!("unknown child '{id}'"),
                }),
            },
        }
    }
}
