//! # Declarative machine definition and its pure transition algorithm.
//!
//! [`MachineDefinition`] is the concrete [`Machine`] implementation produced
//! by the [builder](super::builder). States live in a flat map keyed by
//! absolute dotted id (`fetch.loading`); the active configuration is the
//! chain of ids from a top-level state down to a leaf.
//!
//! ## Transition resolution
//! ```text
//! transition(state, event)
//!   ├─ select: walk active chain leaf → root, first transition whose
//!   │          event name matches and whose guard passes wins
//!   ├─ apply:  exit set (leaf-first, below the source/target domain)
//!   │          → transition actions → entry set (top-down, descending
//!   │          into compound initials), assigns folded into the context
//!   │          in document order, other actions accumulated as data
//!   └─ settle: transient (`always`) transitions and internal
//!              `done.state.*` events chain until quiescent, so the
//!              returned state is the resting state of the macrostep
//! ```
//!
//! Entering a final state signals its parent (`done.state.<parent>`), or
//! marks the machine done when the final state is top-level.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use crate::actions::{Action, ExprFn, Guard};
use crate::error::DefinitionError;
use crate::events::Event;

use super::builder::MachineBuilder;
use super::machine::{Machine, StartFrom};
use super::{Context, State, StateValue};

/// Upper bound on transient chaining inside one `transition` call. A
/// machine that exceeds it has an `always` cycle.
pub(crate) const MAX_TRANSIENT_CHAIN: usize = 100;

/// Context update folded into the state during transition resolution.
pub(crate) type AssignFn = Arc<dyn Fn(&mut Context, &Event) + Send + Sync>;

/// An authored action: either resolved executor data or a pure assign.
#[derive(Clone)]
pub(crate) enum ActionDef {
    Pure(Action),
    Assign(AssignFn),
}

/// One authored transition, with its target resolved to an absolute id.
#[derive(Clone)]
pub(crate) struct TransitionDef {
    /// Event name; unused for entries in the `always` list.
    pub(crate) event: String,
    /// Absolute target id; `None` for an internal (actions-only) transition.
    pub(crate) target: Option<String>,
    pub(crate) guard: Option<Guard>,
    pub(crate) actions: Vec<ActionDef>,
}

impl TransitionDef {
    fn guard_passes(&self, context: &Context, event: &Event) -> bool {
        self.guard.as_ref().map_or(true, |g| g(context, event))
    }
}

#[derive(Clone)]
pub(crate) enum NodeKind {
    Atomic,
    Compound { initial: String },
    Final { data: Option<ExprFn<Value>> },
}

/// One state node, stored flat under its absolute id.
#[derive(Clone)]
pub(crate) struct StateNode {
    pub(crate) id: String,
    pub(crate) parent: Option<String>,
    pub(crate) kind: NodeKind,
    pub(crate) on: Vec<TransitionDef>,
    pub(crate) always: Vec<TransitionDef>,
    pub(crate) entry: Vec<ActionDef>,
    pub(crate) exit: Vec<ActionDef>,
}

/// Declarative statechart: the concrete [`Machine`] implementation.
pub struct MachineDefinition {
    pub(crate) id: String,
    pub(crate) initial: String,
    pub(crate) context: Context,
    pub(crate) states: HashMap<String, StateNode>,
}

/// Scratch space for one `transition` resolution.
struct Resolution {
    /// Absolute id of the active leaf.
    leaf: String,
    context: Context,
    actions: Vec<Action>,
    internal: VecDeque<Event>,
    done_data: Option<Value>,
    changed: bool,
    /// Whether assigns mutate the context. Disabled while re-entering a
    /// restored configuration whose serialized context already contains
    /// the folds.
    fold_assigns: bool,
}

impl Resolution {
    fn new(context: Context) -> Self {
        Self {
            leaf: String::new(),
            context,
            actions: Vec::new(),
            internal: VecDeque::new(),
            done_data: None,
            changed: false,
            fold_assigns: true,
        }
    }
}

impl MachineDefinition {
    /// Starts a fluent builder for a machine with the given id.
    pub fn builder(id: impl Into<String>) -> MachineBuilder {
        MachineBuilder::new(id)
    }

    fn node(&self, id: &str) -> Option<&StateNode> {
        self.states.get(id)
    }

    /// First matching transition for `name` on the active chain, innermost
    /// state first.
    fn select_on<'a>(
        &'a self,
        leaf: &str,
        name: &str,
        context: &Context,
        event: &Event,
    ) -> Option<(String, &'a TransitionDef)> {
        for id in ancestors_inclusive(leaf).into_iter().rev() {
            let Some(node) = self.node(&id) else { continue };
            for t in &node.on {
                if t.event == name && t.guard_passes(context, event) {
                    return Some((id, t));
                }
            }
        }
        None
    }

    /// First enabled transient transition on the active chain, innermost
    /// state first.
    fn select_always<'a>(
        &'a self,
        leaf: &str,
        context: &Context,
        event: &Event,
    ) -> Option<(String, &'a TransitionDef)> {
        for id in ancestors_inclusive(leaf).into_iter().rev() {
            let Some(node) = self.node(&id) else { continue };
            for t in &node.always {
                if t.guard_passes(context, event) {
                    return Some((id, t));
                }
            }
        }
        None
    }

    fn run_defs(&self, defs: &[ActionDef], res: &mut Resolution, event: &Event) {
        for def in defs {
            match def {
                ActionDef::Assign(f) => {
                    if res.fold_assigns {
                        f(&mut res.context, event);
                    }
                }
                ActionDef::Pure(action) => res.actions.push(action.clone()),
            }
        }
    }

    /// Applies one selected transition to the resolution.
    fn apply(&self, res: &mut Resolution, source: &str, t: &TransitionDef, event: &Event) {
        res.changed = true;
        let Some(target) = &t.target else {
            // Internal transition: actions only, no exit/entry.
            self.run_defs(&t.actions, res, event);
            return;
        };

        let domain = transition_domain(source, target);

        // Exit set: every active node strictly below the domain, leaf first.
        for id in ancestors_inclusive(&res.leaf).into_iter().rev() {
            if is_below(&id, domain.as_deref()) {
                if let Some(node) = self.node(&id) {
                    self.run_defs(&node.exit, res, event);
                }
            }
        }

        self.run_defs(&t.actions, res, event);
        self.enter_target(target, domain.as_deref(), res, event);
    }

    /// Enters `target` (every ancestor below `domain`, then the initial
    /// descent for compounds), running entry actions top-down and signaling
    /// reached final states. Updates `res.leaf`.
    fn enter_target(&self, target: &str, domain: Option<&str>, res: &mut Resolution, event: &Event) {
        let mut to_enter: Vec<String> = ancestors_inclusive(target)
            .into_iter()
            .filter(|id| is_below(id, domain))
            .collect();

        let mut leaf = target.to_string();
        while let Some(NodeKind::Compound { initial }) = self.node(&leaf).map(|n| &n.kind) {
            leaf = initial.clone();
            to_enter.push(leaf.clone());
        }

        for id in &to_enter {
            let Some(node) = self.node(id) else { continue };
            self.run_defs(&node.entry, res, event);
            if let NodeKind::Final { data } = &node.kind {
                let data = data
                    .as_ref()
                    .map(|f| f(&res.context, event))
                    .unwrap_or(Value::Null);
                match &node.parent {
                    Some(parent) => res.internal.push_back(Event::done_state(parent, data)),
                    None => res.done_data = Some(data),
                }
            }
        }

        res.leaf = leaf;
    }

    /// Chains transient transitions and internal `done.state.*` events
    /// until the configuration rests.
    fn settle(&self, res: &mut Resolution, event: &Event) {
        let mut links = 0;
        loop {
            links += 1;
            if links > MAX_TRANSIENT_CHAIN {
                debug_assert!(
                    false,
                    "machine '{}': transient transition chain exceeded {} links",
                    self.id, MAX_TRANSIENT_CHAIN
                );
                break;
            }

            if let Some((source, t)) = self.select_always(&res.leaf, &res.context, event) {
                self.apply(res, &source, t, event);
                continue;
            }

            if let Some(internal) = res.internal.pop_front() {
                if let Some((source, t)) =
                    self.select_on(&res.leaf, &internal.name, &res.context, &internal)
                {
                    self.apply(res, &source, t, &internal);
                }
                continue;
            }

            break;
        }
    }

    fn is_top_level_final(&self, leaf: &str) -> bool {
        !leaf.contains('.')
            && matches!(
                self.node(leaf).map(|n| &n.kind),
                Some(NodeKind::Final { .. })
            )
    }

    /// Builds a state with a freshly entered configuration rooted at
    /// `leaf`, used for the initial state and for restored states.
    ///
    /// A restored configuration re-derives its pure entry actions (so
    /// delayed sends and invokes are re-armed) but skips assigns: the
    /// restored context already contains their folds.
    fn resolve_fresh(
        &self,
        leaf: &str,
        context: Context,
        history_value: Option<Value>,
        fold_assigns: bool,
    ) -> Result<State, DefinitionError> {
        if self.node(leaf).is_none() {
            return Err(DefinitionError::UnknownState {
                machine: self.id.clone(),
                state: leaf.to_string(),
            });
        }

        let event = Event::init();
        let mut res = Resolution::new(context);
        res.fold_assigns = fold_assigns;
        self.enter_target(leaf, None, &mut res, &event);
        res.fold_assigns = true;
        self.settle(&mut res, &event);

        Ok(State {
            value: leaf_to_value(&res.leaf),
            done: self.is_top_level_final(&res.leaf),
            context: res.context,
            actions: res.actions,
            children: Default::default(),
            history_value,
            changed: false,
            event,
            done_data: res.done_data,
        })
    }
}

impl Machine for MachineDefinition {
    fn id(&self) -> &str {
        &self.id
    }

    fn initial_state(&self) -> State {
        // The initial id is validated at build time, so this cannot fail.
        self.resolve_fresh(&self.initial, self.context.clone(), None, true)
            .unwrap_or_else(|_| State {
                value: leaf_to_value(&self.initial),
                context: self.context.clone(),
                actions: Vec::new(),
                children: Default::default(),
                history_value: None,
                changed: false,
                done: false,
                event: Event::init(),
                done_data: None,
            })
    }

    fn transition(&self, state: &State, event: &Event) -> State {
        let leaf = state.value.dotted();
        let mut res = Resolution::new(state.context.clone());
        res.leaf = leaf;

        match self.select_on(&res.leaf, &event.name, &res.context, event) {
            Some((source, t)) => {
                self.apply(&mut res, &source, t, event);
                self.settle(&mut res, event);
                State {
                    value: leaf_to_value(&res.leaf),
                    done: self.is_top_level_final(&res.leaf),
                    context: res.context,
                    actions: res.actions,
                    children: state.children.clone(),
                    history_value: state.history_value.clone(),
                    changed: res.changed,
                    event: event.clone(),
                    done_data: res.done_data,
                }
            }
            None => State {
                value: state.value.clone(),
                context: state.context.clone(),
                actions: Vec::new(),
                children: state.children.clone(),
                history_value: state.history_value.clone(),
                changed: false,
                done: state.done,
                event: event.clone(),
                done_data: None,
            },
        }
    }

    fn resolve_state(&self, from: StartFrom) -> Result<State, DefinitionError> {
        match from {
            StartFrom::State(state) => {
                let leaf = state.value.dotted();
                if self.node(&leaf).is_none() {
                    return Err(DefinitionError::UnknownState {
                        machine: self.id.clone(),
                        state: leaf,
                    });
                }
                Ok(*state)
            }
            StartFrom::Value(value) => {
                self.resolve_fresh(&value.dotted(), self.context.clone(), None, false)
            }
            StartFrom::Id(id) => self.resolve_fresh(&id, self.context.clone(), None, false),
            StartFrom::Record(record) => {
                let malformed = |message: &str| DefinitionError::MalformedRecord {
                    machine: self.id.clone(),
                    message: message.to_string(),
                };
                let value: StateValue = record
                    .get("value")
                    .cloned()
                    .ok_or_else(|| malformed("missing 'value'"))
                    .and_then(|v| {
                        serde_json::from_value(v).map_err(|e| malformed(&e.to_string()))
                    })?;
                let context = match record.get("context") {
                    None | Some(Value::Null) => self.context.clone(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(_) => return Err(malformed("'context' is not an object")),
                };
                let history_value = record
                    .get("historyValue")
                    .filter(|v| !v.is_null())
                    .cloned();
                self.resolve_fresh(&value.dotted(), context, history_value, false)
            }
        }
    }
}

/// Prefix ids of `leaf`, root first: `a.b.c` → `[a, a.b, a.b.c]`.
fn ancestors_inclusive(leaf: &str) -> Vec<String> {
    if leaf.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, b) in leaf.bytes().enumerate() {
        if b == b'.' {
            out.push(leaf[..i].to_string());
        }
    }
    out.push(leaf.to_string());
    out
}

/// True when `id` lies strictly below `domain` (`None` means the root, so
/// everything qualifies).
fn is_below(id: &str, domain: Option<&str>) -> bool {
    match domain {
        None => true,
        Some(d) => id.len() > d.len() && id.starts_with(d) && id.as_bytes()[d.len()] == b'.',
    }
}

/// Deepest proper ancestor shared by `source` and `target`: the transition
/// domain. `None` means the domain is the machine root.
///
/// A self-transition (or a transition into a descendant) uses the source's
/// parent, so the source state is exited and re-entered.
fn transition_domain(source: &str, target: &str) -> Option<String> {
    let s: Vec<&str> = source.split('.').collect();
    let t: Vec<&str> = target.split('.').collect();
    let mut k = 0;
    while k < s.len() && k < t.len() && s[k] == t[k] {
        k += 1;
    }
    if k == s.len() || k == t.len() {
        k = k.saturating_sub(1);
    }
    if k == 0 {
        None
    } else {
        Some(s[..k].join("."))
    }
}

/// Converts an absolute leaf id into the active-configuration tree.
fn leaf_to_value(leaf: &str) -> StateValue {
    StateValue::from(leaf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_chains() {
        assert_eq!(ancestors_inclusive("a"), vec!["a"]);
        assert_eq!(ancestors_inclusive("a.b.c"), vec!["a", "a.b", "a.b.c"]);
        assert!(ancestors_inclusive("").is_empty());
    }

    #[test]
    fn domain_of_siblings_is_parent() {
        assert_eq!(
            transition_domain("fetch.idle", "fetch.loading"),
            Some("fetch".to_string())
        );
    }

    #[test]
    fn domain_of_top_level_siblings_is_root() {
        assert_eq!(transition_domain("green", "yellow"), None);
    }

    #[test]
    fn self_transition_exits_the_source() {
        // Domain is the parent, so the source is in the exit set.
        assert_eq!(transition_domain("green", "green"), None);
        assert_eq!(
            transition_domain("fetch.idle", "fetch.idle"),
            Some("fetch".to_string())
        );
    }

    #[test]
    fn below_respects_segment_boundaries() {
        assert!(is_below("fetch.idle", Some("fetch")));
        assert!(!is_below("fetcher", Some("fetch")));
        assert!(!is_below("fetch", Some("fetch")));
        assert!(is_below("anything", None));
    }
}
