//! # Core observer trait.
//!
//! `Observer` is the extension point for watching an interpreter's state.
//! Observers are called synchronously from the flush loop, so
//! implementations should hand heavy work elsewhere and return.

use crate::error::InterpreterError;
use crate::machine::State;

/// Contract for state observers.
///
/// ## Contract
/// - `next` runs once per processed event, in processing order.
/// - `error` receives action-execution failures; when no registered
///   observer handles errors, failures go to the interpreter's logger
///   instead.
/// - `complete` runs exactly once, when the interpreter stops.
pub trait Observer: Send + Sync + 'static {
    /// Handles one state notification.
    fn next(&self, state: &State);

    /// Handles an action-execution failure.
    fn error(&self, error: &InterpreterError) {
        let _ = error;
    }

    /// Handles interpreter completion.
    fn complete(&self) {}

    /// Whether this observer consumes `error` notifications. Failures are
    /// logged instead when no subscribed observer does.
    fn handles_error(&self) -> bool {
        false
    }
}

type NextFn = Box<dyn Fn(&State) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&InterpreterError) + Send + Sync>;
type CompleteFn = Box<dyn Fn() + Send + Sync>;

/// Closure-backed [`Observer`], used by `subscribe_fn` and
/// `subscribe_with`.
pub struct FnObserver {
    next: NextFn,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl FnObserver {
    /// Observer with only a `next` handler.
    pub fn new(next: impl Fn(&State) + Send + Sync + 'static) -> Self {
        Self {
            next: Box::new(next),
            error: None,
            complete: None,
        }
    }

    /// Attaches an error handler.
    pub fn on_error(mut self, f: impl Fn(&InterpreterError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Attaches a completion handler.
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl Observer for FnObserver {
    fn next(&self, state: &State) {
        (self.next)(state);
    }

    fn error(&self, error: &InterpreterError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    fn complete(&self) {
        if let Some(f) = &self.complete {
            f();
        }
    }

    fn handles_error(&self) -> bool {
        self.error.is_some()
    }
}
