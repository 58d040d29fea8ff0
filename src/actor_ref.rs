//! # Actor capability handle.
//!
//! Defines the core [`ActorHandle`] trait for addressable event-processing
//! entities.
//!
//! - **[`ActorHandle`]** — trait exposing the capability set an actor grants
//!   to other actors: identity, event intake, teardown
//! - **[`ActorRef`]** — shared handle (`Arc<dyn ActorHandle>`) for passing
//!   actors across the runtime
//!
//! ## Rules
//! - The **parent owns the lifetime**: any other holder of an [`ActorRef`]
//!   must assume the actor may already be stopped under it. Sends to a
//!   stopped actor are dropped, never errors.
//! - `send` is fire-and-forget. Delivery failures (stopped actor, closed
//!   inbox) are swallowed by the implementation.

use std::sync::Arc;

use crate::events::Event;

/// Shared handle to an actor.
///
/// Type alias for `Arc<dyn ActorHandle>`, used throughout the runtime for:
/// - Parent/child links between interpreters and spawned behaviors
/// - Routing `respond` back to an event's origin
/// - Cloning actor references cheaply
pub type ActorRef = Arc<dyn ActorHandle>;

/// Capability set an actor exposes to the rest of the system.
///
/// Implemented by the interpreter itself (machine actors) and by the
/// task-backed behaviors (future, stream, callback).
pub trait ActorHandle: Send + Sync + 'static {
    /// Returns the actor's stable identity.
    fn id(&self) -> &str;

    /// Delivers an event to the actor's inbox.
    ///
    /// Fire-and-forget: events sent to a stopped actor are dropped.
    fn send(&self, event: Event);

    /// Delivers an event carrying the sender's identity.
    ///
    /// Used by child actors so the receiver can `respond` to the origin.
    /// The default implementation drops the origin; interpreter-backed
    /// actors override it to preserve it.
    fn send_from(&self, event: Event, origin: ActorRef) {
        let _ = origin;
        self.send(event);
    }

    /// Stops the actor. Idempotent; stopping an already-stopped actor is a
    /// no-op.
    fn stop(&self);
}
