//! # Fluent machine builder.
//!
//! Authors a [`MachineDefinition`] declaratively and validates it at
//! `build()` time: unknown initials, unresolvable transition targets, and
//! duplicate ids are configuration errors, raised here rather than at
//! runtime.
//!
//! ## Example
//! ```
//! use std::time::Duration;
//! use statevisor::{Action, MachineDefinition};
//!
//! let lights = MachineDefinition::builder("lights")
//!     .initial("green")
//!     .state("green", |s| s.after(Duration::from_millis(10), "yellow"))
//!     .state("yellow", |s| s.after(Duration::from_millis(10), "red"))
//!     .state("red", |s| {
//!         s.after(Duration::from_millis(10), "green")
//!             .entry(Action::log("stop"))
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(lights.initial_state().value.dotted(), "green");
//! # use statevisor::Machine;
//! ```
//!
//! Targets resolve in order: sibling of the source state, child of the
//! source state, absolute (dotted or top-level) id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::actions::{Action, ExprFn, Guard, SendSpec};
use crate::behaviors::Behavior;
use crate::error::DefinitionError;
use crate::events::Event;

use super::definition::{ActionDef, MachineDefinition, NodeKind, StateNode, TransitionDef};
use super::Context;

/// Fluent builder for [`MachineDefinition`].
pub struct MachineBuilder {
    id: String,
    initial: Option<String>,
    context: Context,
    top: Vec<(String, StateBuilder)>,
}

impl MachineBuilder {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            initial: None,
            context: Context::new(),
            top: Vec::new(),
        }
    }

    /// Names the initial top-level state. Defaults to the first declared
    /// state.
    pub fn initial(mut self, id: impl Into<String>) -> Self {
        self.initial = Some(id.into());
        self
    }

    /// Sets the initial context.
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Sets the initial context from a JSON object value; non-objects are
    /// ignored.
    pub fn context_json(mut self, value: Value) -> Self {
        if let Value::Object(map) = value {
            self.context = map;
        }
        self
    }

    /// Declares a top-level state.
    pub fn state(mut self, id: impl Into<String>, f: impl FnOnce(StateBuilder) -> StateBuilder) -> Self {
        self.top.push((id.into(), f(StateBuilder::new(false))));
        self
    }

    /// Declares a top-level final state; reaching it ends the machine.
    pub fn final_state(
        mut self,
        id: impl Into<String>,
        f: impl FnOnce(StateBuilder) -> StateBuilder,
    ) -> Self {
        self.top.push((id.into(), f(StateBuilder::new(true))));
        self
    }

    /// Validates and assembles the definition.
    pub fn build(self) -> Result<MachineDefinition, DefinitionError> {
        let machine_id = self.id;

        let initial = match (&self.initial, self.top.first()) {
            (Some(id), _) => id.clone(),
            (None, Some((first, _))) => first.clone(),
            (None, None) => {
                return Err(DefinitionError::UnknownInitial {
                    machine: machine_id,
                    state: "<none>".to_string(),
                })
            }
        };

        let mut states: HashMap<String, StateNode> = HashMap::new();
        for (segment, sb) in self.top {
            flatten(&machine_id, None, &segment, sb, &mut states)?;
        }

        if !states.contains_key(&initial) {
            return Err(DefinitionError::UnknownInitial {
                machine: machine_id,
                state: initial,
            });
        }

        let ids: HashSet<String> = states.keys().cloned().collect();
        for node in states.values_mut() {
            let source = node.id.clone();
            let parent = node.parent.clone();
            for t in node.on.iter_mut().chain(node.always.iter_mut()) {
                if let Some(raw) = t.target.take() {
                    t.target = Some(resolve_target(
                        &machine_id,
                        parent.as_deref(),
                        &source,
                        &raw,
                        &ids,
                    )?);
                }
            }
        }

        Ok(MachineDefinition {
            id: machine_id,
            initial,
            context: self.context,
            states,
        })
    }
}

/// Recursively compiles one authored state into flat nodes.
fn flatten(
    machine: &str,
    parent: Option<&str>,
    segment: &str,
    sb: StateBuilder,
    states: &mut HashMap<String, StateNode>,
) -> Result<(), DefinitionError> {
    let id = match parent {
        Some(p) => format!("{p}.{segment}"),
        None => segment.to_string(),
    };

    let mut entry = sb.entry;
    let mut exit = sb.exit;
    let mut on: Vec<TransitionDef> = sb
        .on
        .into_iter()
        .map(|(event, tb)| tb.into_def(event))
        .collect();
    let always: Vec<TransitionDef> = sb
        .always
        .into_iter()
        .map(|tb| tb.into_def(String::new()))
        .collect();

    // `after(N)` compiles to a delayed self-send on entry, its cancellation
    // on exit, and a transition on the synthetic event.
    for (delay, tb) in sb.after {
        let event_name = format!("after({}ms)#{id}", delay.as_millis());
        entry.push(ActionDef::Pure(Action::send_spec(
            SendSpec::new(Event::new(event_name.clone()))
                .with_delay(delay)
                .with_id(event_name.clone()),
        )));
        exit.push(ActionDef::Pure(Action::cancel(event_name.clone())));
        on.push(tb.into_def(event_name));
    }

    // `invoke` compiles to start-child on entry, stop-child on exit, and
    // transitions on the child's platform events.
    for invoke in sb.invokes {
        entry.push(ActionDef::Pure(Action::start_child(
            invoke.id.clone(),
            invoke.behavior,
        )));
        exit.push(ActionDef::Pure(Action::stop_child(invoke.id.clone())));
        for tb in invoke.on_done {
            on.push(tb.into_def(format!("done.invoke.{}", invoke.id)));
        }
        for tb in invoke.on_error {
            on.push(tb.into_def(format!("error.platform.{}", invoke.id)));
        }
    }

    let kind = if sb.is_final {
        NodeKind::Final { data: sb.done_data }
    } else if sb.children.is_empty() {
        NodeKind::Atomic
    } else {
        let initial_segment = match &sb.initial {
            Some(seg) => seg.clone(),
            None => sb.children[0].0.clone(),
        };
        let initial_abs = format!("{id}.{initial_segment}");
        if !sb.children.iter().any(|(seg, _)| *seg == initial_segment) {
            return Err(DefinitionError::UnknownInitial {
                machine: id,
                state: initial_segment,
            });
        }
        NodeKind::Compound {
            initial: initial_abs,
        }
    };

    let node = StateNode {
        id: id.clone(),
        parent: parent.map(str::to_string),
        kind,
        on,
        always,
        entry,
        exit,
    };

    if states.insert(id.clone(), node).is_some() {
        return Err(DefinitionError::DuplicateState {
            machine: machine.to_string(),
            state: id,
        });
    }

    for (child_segment, child_sb) in sb.children {
        flatten(machine, Some(&id), &child_segment, child_sb, states)?;
    }

    Ok(())
}

fn resolve_target(
    machine: &str,
    parent: Option<&str>,
    source: &str,
    raw: &str,
    ids: &HashSet<String>,
) -> Result<String, DefinitionError> {
    if let Some(p) = parent {
        let sibling = format!("{p}.{raw}");
        if ids.contains(&sibling) {
            return Ok(sibling);
        }
    }
    let child = format!("{source}.{raw}");
    if ids.contains(&child) {
        return Ok(child);
    }
    if ids.contains(raw) {
        return Ok(raw.to_string());
    }
    Err(DefinitionError::UnknownTarget {
        machine: machine.to_string(),
        from_state: source.to_string(),
        target: raw.to_string(),
    })
}

/// Configures one state inside [`MachineBuilder::state`].
pub struct StateBuilder {
    is_final: bool,
    initial: Option<String>,
    children: Vec<(String, StateBuilder)>,
    on: Vec<(String, TransitionBuilder)>,
    always: Vec<TransitionBuilder>,
    after: Vec<(Duration, TransitionBuilder)>,
    invokes: Vec<InvokeBuilder>,
    entry: Vec<ActionDef>,
    exit: Vec<ActionDef>,
    done_data: Option<ExprFn<Value>>,
}

impl StateBuilder {
    fn new(is_final: bool) -> Self {
        Self {
            is_final,
            initial: None,
            children: Vec::new(),
            on: Vec::new(),
            always: Vec::new(),
            after: Vec::new(),
            invokes: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            done_data: None,
        }
    }

    /// Adds a plain transition on `event` to `target`.
    pub fn on(mut self, event: impl Into<String>, target: impl Into<String>) -> Self {
        self.on
            .push((event.into(), TransitionBuilder::to(target)));
        self
    }

    /// Adds a transition on `event` with full control (guard, actions,
    /// internal).
    pub fn on_with(mut self, event: impl Into<String>, transition: TransitionBuilder) -> Self {
        self.on.push((event.into(), transition));
        self
    }

    /// Adds a transient (eventless) transition. Candidates are tried in
    /// declaration order; the interpreter never rests in a state with an
    /// enabled one.
    pub fn always(mut self, transition: TransitionBuilder) -> Self {
        self.always.push(transition);
        self
    }

    /// Shorthand for an unguarded transient transition.
    pub fn always_to(self, target: impl Into<String>) -> Self {
        self.always(TransitionBuilder::to(target))
    }

    /// Adds a delayed transition, equivalent in observable effect to an
    /// entry `send(.., delay)` plus a transition on the sent event.
    pub fn after(mut self, delay: Duration, target: impl Into<String>) -> Self {
        self.after.push((delay, TransitionBuilder::to(target)));
        self
    }

    /// `after` with full transition control.
    pub fn after_with(mut self, delay: Duration, transition: TransitionBuilder) -> Self {
        self.after.push((delay, transition));
        self
    }

    /// Appends an entry action.
    pub fn entry(mut self, action: Action) -> Self {
        self.entry.push(ActionDef::Pure(action));
        self
    }

    /// Appends a context assign run on entry.
    pub fn entry_assign(
        mut self,
        f: impl Fn(&mut Context, &Event) + Send + Sync + 'static,
    ) -> Self {
        self.entry.push(ActionDef::Assign(Arc::new(f)));
        self
    }

    /// Appends an exit action.
    pub fn exit(mut self, action: Action) -> Self {
        self.exit.push(ActionDef::Pure(action));
        self
    }

    /// Appends a context assign run on exit.
    pub fn exit_assign(mut self, f: impl Fn(&mut Context, &Event) + Send + Sync + 'static) -> Self {
        self.exit.push(ActionDef::Assign(Arc::new(f)));
        self
    }

    /// Invokes a child actor for the lifetime of this state.
    pub fn invoke(mut self, invoke: InvokeBuilder) -> Self {
        self.invokes.push(invoke);
        self
    }

    /// Names the initial child. Defaults to the first declared child.
    pub fn initial(mut self, id: impl Into<String>) -> Self {
        self.initial = Some(id.into());
        self
    }

    /// Declares a child state, making this state compound.
    pub fn child(mut self, id: impl Into<String>, f: impl FnOnce(StateBuilder) -> StateBuilder) -> Self {
        self.children.push((id.into(), f(StateBuilder::new(false))));
        self
    }

    /// Declares a final child state; reaching it raises
    /// `done.state.<parent>`.
    pub fn final_child(
        mut self,
        id: impl Into<String>,
        f: impl FnOnce(StateBuilder) -> StateBuilder,
    ) -> Self {
        self.children.push((id.into(), f(StateBuilder::new(true))));
        self
    }

    /// Done-data for a final state, computed when the state is reached.
    pub fn data(mut self, f: impl Fn(&Context, &Event) -> Value + Send + Sync + 'static) -> Self {
        self.done_data = Some(Arc::new(f));
        self
    }
}

/// Configures one transition.
pub struct TransitionBuilder {
    target: Option<String>,
    guard: Option<Guard>,
    actions: Vec<ActionDef>,
}

impl TransitionBuilder {
    /// A transition to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// An internal transition: actions run, no state is exited or entered.
    pub fn internal() -> Self {
        Self {
            target: None,
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Guards the transition; it is skipped when the predicate is false.
    pub fn guard(mut self, f: impl Fn(&Context, &Event) -> bool + Send + Sync + 'static) -> Self {
        self.guard = Some(Arc::new(f));
        self
    }

    /// Appends a transition action.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(ActionDef::Pure(action));
        self
    }

    /// Appends a context assign.
    pub fn assign(mut self, f: impl Fn(&mut Context, &Event) + Send + Sync + 'static) -> Self {
        self.actions.push(ActionDef::Assign(Arc::new(f)));
        self
    }

    fn into_def(self, event: String) -> TransitionDef {
        TransitionDef {
            event,
            target: self.target,
            guard: self.guard,
            actions: self.actions,
        }
    }
}

/// Configures an invoked child actor.
pub struct InvokeBuilder {
    id: String,
    behavior: Behavior,
    on_done: Vec<TransitionBuilder>,
    on_error: Vec<TransitionBuilder>,
}

impl InvokeBuilder {
    /// Invokes `behavior` under the given child id.
    pub fn new(id: impl Into<String>, behavior: Behavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            on_done: Vec::new(),
            on_error: Vec::new(),
        }
    }

    /// Transition taken when the child completes
    /// (`done.invoke.<id>`). May be guarded; candidates are tried in
    /// declaration order.
    pub fn on_done(mut self, transition: TransitionBuilder) -> Self {
        self.on_done.push(transition);
        self
    }

    /// Shorthand for an unguarded done transition.
    pub fn on_done_to(self, target: impl Into<String>) -> Self {
        self.on_done(TransitionBuilder::to(target))
    }

    /// Transition taken when the child fails (`error.platform.<id>`).
    pub fn on_error(mut self, transition: TransitionBuilder) -> Self {
        self.on_error.push(transition);
        self
    }

    /// Shorthand for an unguarded error transition.
    pub fn on_error_to(self, target: impl Into<String>) -> Self {
        self.on_error(TransitionBuilder::to(target))
    }
}
