//! # Clock abstraction for delayed event dispatch.
//!
//! The interpreter never sleeps on its own: every delayed send goes through
//! a [`Clock`], which schedules a one-shot callback and hands back a
//! [`TimerHandle`] for cancellation.
//!
//! ## Contents
//! - [`Clock`] the scheduling contract (`set_timeout` / `clear_timeout`)
//! - [`TokioClock`] real-time implementation backed by `tokio::time`
//! - [`SimulatedClock`] deterministic implementation advanced manually in
//!   tests
//!
//! ## Rules
//! - A callback fires **at most once**; `clear_timeout` before the deadline
//!   prevents it from ever firing.
//! - `clear_timeout` with an unknown or already-fired handle is a no-op.
//! - The clock is shared between an interpreter and its children, so
//!   implementations must be safe to call from multiple threads.

mod real_time;
mod simulated;

use std::time::Duration;

pub use real_time::TokioClock;
pub use simulated::SimulatedClock;

/// One-shot callback scheduled on a clock.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle identifying a scheduled timeout.
///
/// Handles are only meaningful to the clock that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// Scheduling contract for delayed sends.
///
/// The interpreter holds the clock as a per-instance dependency (never a
/// process-wide singleton) and uses it for `after` transitions and
/// `send(..., delay)` actions.
pub trait Clock: Send + Sync + 'static {
    /// Schedules `callback` to run once after `delay`.
    fn set_timeout(&self, callback: TimerCallback, delay: Duration) -> TimerHandle;

    /// Cancels a scheduled timeout. No-op if the handle is unknown or the
    /// callback already fired.
    fn clear_timeout(&self, handle: TimerHandle);
}
