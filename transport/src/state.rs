//! The lifecycle of a connection.

use std::{
    fmt,
    sync::{Mutex, MutexGuard},
};
use tokio::sync::watch;
use tracing::debug;

use crate::errors::TransportError;

/// The state of a connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionState {
    /// The connection was not started yet.
    Unconnected,
    /// The version exchange or the first key exchange is running.
    Connecting,
    /// The first key exchange finished and packets can be exchanged.
    Established,
    /// A disconnect message is being sent to the other party.
    SelfDisconnecting,
    /// The other party sent a disconnect message.
    PeerDisconnected,
    /// The connection was closed without an error.
    Closed,
    /// The connection ended because of an error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` if the connection can never leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::PeerDisconnected | ConnectionState::Closed | ConnectionState::Failed
        )
    }

    /// Returns `true` if the connection may go from `self` to `next`.
    fn allows(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unconnected, Connecting)
                | (Connecting, Established)
                | (Connecting | Established, SelfDisconnecting | PeerDisconnected)
                | (
                    Unconnected | Connecting | Established | SelfDisconnecting,
                    Closed | Failed
                )
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Unconnected => write!(f, "unconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Established => write!(f, "established"),
            ConnectionState::SelfDisconnecting => write!(f, "disconnecting"),
            ConnectionState::PeerDisconnected => write!(f, "disconnected by peer"),
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    /// The first error that ended the connection.
    error: Option<TransportError>,
    /// Whether the first key exchange finished at some point.
    established: bool,
}

/// Holds the connection state and the error that ended the connection.
///
/// The first terminal state and the first error win, later attempts to change them are ignored.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<Inner>,
    /// Publishes every state change.
    changes: watch::Sender<ConnectionState>,
}

impl StateCell {
    /// Creates a new cell in the `Unconnected` state.
    pub(crate) fn new() -> StateCell {
        let (changes, _) = watch::channel(ConnectionState::Unconnected);

        StateCell {
            inner: Mutex::new(Inner {
                state: ConnectionState::Unconnected,
                error: None,
                established: false,
            }),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current state.
    pub(crate) fn get(&self) -> ConnectionState {
        self.lock().state
    }

    /// Changes the state if the transition is allowed and returns whether it happened.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let mut inner = self.lock();

        if !inner.state.allows(next) {
            return false;
        }

        debug!(from = %inner.state, to = %next, "connection state changed");
        inner.state = next;
        inner.established |= next == ConnectionState::Established;
        self.changes.send_replace(next);

        true
    }

    /// Returns `true` once the connection was established, even if it ended since.
    pub(crate) fn was_established(&self) -> bool {
        self.lock().established
    }

    /// Records the error that ended the connection, unless one was recorded before.
    pub(crate) fn record_error(&self, error: TransportError) {
        let mut inner = self.lock();

        if inner.error.is_none() {
            inner.error = Some(error);
        }
    }

    /// Records `error` and moves to the `PeerDisconnected` state.
    pub(crate) fn peer_disconnected(&self, error: TransportError) {
        self.record_error(error);
        self.transition(ConnectionState::PeerDisconnected);
    }

    /// Returns the error that ended the connection, if any.
    pub(crate) fn error(&self) -> Option<TransportError> {
        self.lock().error.clone()
    }

    /// Returns the error to report for operations on a connection that is not established.
    pub(crate) fn unavailable(&self) -> TransportError {
        self.error().unwrap_or(TransportError::NotConnected)
    }

    /// Returns a receiver for the state changes.
    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.changes.subscribe()
    }

    /// Returns how the connection ended, once it is in a terminal state.
    pub(crate) fn outcome(&self) -> Option<Result<(), TransportError>> {
        let inner = self.lock();

        match inner.state {
            ConnectionState::Closed => Some(Ok(())),
            ConnectionState::Failed | ConnectionState::PeerDisconnected => Some(Err(inner
                .error
                .clone()
                .unwrap_or(TransportError::NotConnected))),
            _ => None,
        }
    }

    /// Waits until the connection is in a terminal state and returns how it ended.
    pub(crate) async fn wait_terminal(&self) -> Result<(), TransportError> {
        let mut changes = self.subscribe();

        loop {
            if let Some(outcome) = self.outcome() {
                return outcome;
            }

            if changes.changed().await.is_err() {
                return Err(self.unavailable());
            }
        }
    }
}
