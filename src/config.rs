//! # Interpreter configuration.
//!
//! [`InterpreterOptions`] defines per-instance dependencies and behavior:
//! the clock used for delayed sends, the logger that receives `log` action
//! output, pre-start event deferral, the interpreter identity, and the
//! parent link when running as a child actor.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use statevisor::{InterpreterOptions, SimulatedClock};
//!
//! let clock = SimulatedClock::new();
//! let opts = InterpreterOptions::default()
//!     .with_clock(Arc::new(clock.clone()))
//!     .with_id("lights")
//!     .with_defer_events(false);
//! ```

use std::sync::Arc;

use crate::actor_ref::ActorRef;
use crate::clock::{Clock, TokioClock};

/// Sink for `log` action output.
///
/// A plain function per instance, never a process-wide logger. The default
/// writes lines to stdout.
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-instance interpreter configuration.
///
/// All fields have sane defaults; `interpret(machine, options)` recognizes
/// exactly these options.
#[derive(Clone)]
pub struct InterpreterOptions {
    /// Clock used for delayed sends. Defaults to the real-time
    /// [`TokioClock`].
    pub clock: Arc<dyn Clock>,
    /// Receives evaluated `log` action output. Defaults to stdout.
    pub logger: Logger,
    /// Buffer events sent before `start` instead of failing. Default `true`.
    pub defer_events: bool,
    /// Identity override; defaults to the machine id.
    pub id: Option<String>,
    /// Parent actor when this interpreter runs as a child.
    pub parent: Option<ActorRef>,
}

impl Default for InterpreterOptions {
    /// Provides a default configuration:
    /// - `clock = TokioClock` (real time)
    /// - `logger = stdout`
    /// - `defer_events = true`
    /// - `id = None` (machine id)
    /// - `parent = None`
    fn default() -> Self {
        Self {
            clock: Arc::new(TokioClock::new()),
            logger: Arc::new(|msg| println!("{msg}")),
            defer_events: true,
            id: None,
            parent: None,
        }
    }
}

impl InterpreterOptions {
    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the logger.
    pub fn with_logger(mut self, logger: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Enables or disables pre-start event deferral.
    pub fn with_defer_events(mut self, defer: bool) -> Self {
        self.defer_events = defer;
        self
    }

    /// Overrides the interpreter identity.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the parent actor link.
    pub fn with_parent(mut self, parent: ActorRef) -> Self {
        self.parent = Some(parent);
        self
    }
}
