//! # Subscribers: observation of interpreter state.
//!
//! This module groups the observer contract and the fan-out set an
//! interpreter owns.
//!
//! ## Contents
//! - [`Observer`] next/error/complete contract
//! - [`FnObserver`] closure adapter behind `subscribe_fn` /
//!   `subscribe_with`
//! - [`ObserverSet`] synchronous fan-out with replay-latest semantics
//! - [`Subscription`] unsubscribe handle
//! - `ChannelObserver` channel bridge behind `subscribe_channel`, for
//!   stream-library interop
//!
//! ## What it guarantees
//! - Subscribing after `start` delivers the current state synchronously,
//!   before `subscribe` returns.
//! - Observers see exactly one `next` per processed event, in processing
//!   order.
//! - `complete` fires exactly once, on interpreter stop; no deliveries
//!   follow it.
//! - Unsubscribe is idempotent and takes effect before the next delivery.
//!
//! ## What it does **not** guarantee
//! - No queueing or backpressure: observers run inline on the flushing
//!   thread and should return quickly.

mod channel;
mod observer;
mod set;

pub use observer::{FnObserver, Observer};
pub use set::{ObserverId, Subscription};

pub(crate) use channel::ChannelObserver;
pub(crate) use set::ObserverSet;
