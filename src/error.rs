//! # Error types used by the interpreter and the definition layer.
//!
//! This module defines two main error enums:
//!
//! - [`InterpreterError`] errors raised by the interpreter runtime itself.
//! - [`DefinitionError`] errors raised while building or resolving a machine
//!   definition.
//!
//! Both types provide helper methods `as_label` for logs/metrics.
//!
//! Post-stop sends and double-stops are deliberately **not** errors: the
//! interpreter drops them silently (see the lifecycle rules in
//! [`core`](crate::core)).

use thiserror::Error;

/// # Errors produced by the interpreter runtime.
///
/// These represent misuse of the interpreter surface or failures while
/// executing resolved actions.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    /// `send` was called before `start` while event deferral is disabled.
    #[error("event '{event}' sent to uninitialized interpreter '{id}' (defer_events = false)")]
    UninitializedSend {
        /// Name of the rejected event.
        event: String,
        /// Identity of the interpreter that rejected it.
        id: String,
    },

    /// The initial state passed to `start` (or referenced by the machine)
    /// does not exist in the definition.
    #[error("initial state '{state}' not found in machine '{machine}'")]
    InvalidInitialState {
        /// The missing state id.
        state: String,
        /// The machine id.
        machine: String,
    },

    /// A resolved action could not be applied (unknown send target, respond
    /// without an origin, ...).
    ///
    /// Reported to the observers' error channel, or to the logger when no
    /// observer handles errors; the interpreter keeps running.
    #[error("action '{action}' failed: {message}")]
    ActionFailed {
        /// Stable action label (`send`, `cancel`, ...).
        action: &'static str,
        /// Human-readable failure description.
        message: String,
    },
}

impl InterpreterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            InterpreterError::UninitializedSend { .. } => "interpreter_uninitialized_send",
            InterpreterError::InvalidInitialState { .. } => "interpreter_invalid_initial_state",
            InterpreterError::ActionFailed { .. } => "interpreter_action_failed",
        }
    }
}

/// # Errors produced while building or resolving a machine definition.
///
/// These are configuration errors: they are raised at machine construction
/// (`build()`) or when resolving a restored state, and are fatal to that
/// machine instance.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The configured initial state does not exist.
    #[error("machine '{machine}': initial state '{state}' does not exist")]
    UnknownInitial {
        /// The machine (or compound state) that names the initial.
        machine: String,
        /// The missing state id.
        state: String,
    },

    /// A transition targets a state that does not exist.
    #[error("machine '{machine}': transition from '{from_state}' targets unknown state '{target}'")]
    UnknownTarget {
        machine: String,
        from_state: String,
        target: String,
    },

    /// Two sibling states share the same id.
    #[error("machine '{machine}': duplicate state id '{state}'")]
    DuplicateState { machine: String, state: String },

    /// A state id passed to `resolve_state` does not exist.
    #[error("machine '{machine}': cannot resolve unknown state '{state}'")]
    UnknownState { machine: String, state: String },

    /// A serialized state record is structurally invalid.
    #[error("machine '{machine}': malformed state record: {message}")]
    MalformedRecord { machine: String, message: String },
}

impl DefinitionError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            DefinitionError::UnknownInitial { .. } => "definition_unknown_initial",
            DefinitionError::UnknownTarget { .. } => "definition_unknown_target",
            DefinitionError::DuplicateState { .. } => "definition_duplicate_state",
            DefinitionError::UnknownState { .. } => "definition_unknown_state",
            DefinitionError::MalformedRecord { .. } => "definition_malformed_record",
        }
    }
}
