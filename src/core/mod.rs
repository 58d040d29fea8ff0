//! # Interpreter core: lifecycle, macrostep loop, action execution.
//!
//! This module contains the embedded runtime of a statechart actor. The
//! public API re-exported from here is [`Interpreter`] and [`Status`];
//! everything else is an internal building block the interpreter wires
//! together.
//!
//! ## Files & responsibilities
//! - **interpreter.rs**: public facade; owns the runtime (event queue,
//!   child registry, delayed-send registry, observer set), drives the
//!   reentrancy-guarded flush loop, manages the
//!   uninitialized → running → stopped lifecycle.
//! - **executor.rs**: interprets resolved actions (send/raise/cancel/log/
//!   start/stop), schedules delayed sends through the clock, reports
//!   failures to the observers' error channel or the logger.
//! - **registry.rs**: child actor registry; post-order teardown on stop.
//! - **sends.rs**: delayed-send registry keyed by send id; cancellation.
//!
//! ## Event data-plane (who produces & who consumes)
//!
//! Producers (push onto the queue):
//! - **External callers** → `send` / `send_to`
//! - **Executor** → `raise`, immediate self-`send`
//! - **Clock** → fired delayed sends (fresh top-level sends)
//! - **Child behaviors** → `done.invoke.<id>`, `error.platform.<id>`,
//!   forwarded stream items, callback emissions
//!
//! Consumer: the flush loop, strictly FIFO, one macrostep at a time.
//!
//! ## Wiring (module-level flow)
//! ```text
//! send(event)
//!   ├─ running        → queue.push → flush()
//!   ├─ uninitialized  → deferred buffer (defer_events) | error
//!   └─ stopped        → dropped
//!
//! flush()                              // reentrancy-guarded
//!   loop {
//!     event = queue.pop() else break
//!     next  = machine.transition(state, event)     // pure
//!     executor.run(next.actions)       // may push events, spawn/stop
//!     │                                // children, schedule delays
//!     state = next (+ children snapshot)
//!     observers.next(state)
//!     if next.done { parent ← done.invoke.<id>; on_done; stop(); break }
//!   }
//!
//! stop()
//!   ├─ children.stop_all()             // post-order: children first
//!   ├─ delays.cancel_all(clock)
//!   ├─ queue.clear()
//!   └─ observers.complete()            // exactly once
//! ```
//!
//! ## Rules
//! - At most one flush runs per interpreter at any instant; a `send` from
//!   inside an action or observer callback only enqueues.
//! - Events are processed strictly in send-order; raised events enqueue at
//!   emission time (no priority lane).
//! - Delayed events re-enter through `send`, starting a new macrostep.
//! - Double-stop and stop-before-start are silent no-ops.

mod executor;
mod interpreter;
mod registry;
mod sends;

pub use interpreter::{Interpreter, Status};
