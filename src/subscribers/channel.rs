//! # Channel-backed observer for stream interop.
//!
//! Bridges the synchronous observer contract onto a `tokio` channel so
//! stream libraries can consume interpreter states
//! (`UnboundedReceiverStream`, `StreamExt` combinators, select loops).
//! The channel closes when the interpreter completes.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::machine::State;

use super::Observer;

/// Observer that forwards each state into an unbounded channel.
///
/// Dropping the sender on `complete` is what closes the receiver, so
/// consumers observe interpreter stop as end-of-stream.
pub(crate) struct ChannelObserver {
    sender: Mutex<Option<mpsc::UnboundedSender<State>>>,
}

impl ChannelObserver {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<State>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<State>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Observer for ChannelObserver {
    fn next(&self, state: &State) {
        if let Some(sender) = self.lock().as_ref() {
            let _ = sender.send(state.clone());
        }
    }

    fn complete(&self) {
        self.lock().take();
    }
}
