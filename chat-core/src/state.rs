//! Connection state machine for parley.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the lifecycle of the single persistent connection. The state machine takes
//! events as input and produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening sockets, sleeping, running callbacks) is performed
//! by chat-client, not by this module.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket and no pending reconnect.
    Disconnected,
    /// A socket is being opened.
    Connecting {
        /// Consecutive failures before this attempt (0 for a fresh connect).
        attempt: u32,
    },
    /// The socket is open and frames flow.
    Open {
        /// Consecutive failures that preceded this connection.
        failures: u32,
    },
    /// The socket was lost, waiting for the reconnect timer.
    Reconnecting {
        /// Consecutive failures so far.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event, policy: &ReconnectPolicy) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting { attempt: 0 }, vec![Action::Connect])
            }

            // From Connecting
            (Self::Connecting { attempt }, Event::ConnectSucceeded) => (
                Self::Open { failures: attempt },
                vec![
                    Action::RunOnOpen,
                    Action::SchedulePresence,
                    Action::EmitEvent(ConnectionEvent::Opened),
                ],
            ),
            (Self::Connecting { attempt }, Event::ConnectFailed { error }) => {
                schedule_retry(attempt.saturating_add(1), error, policy)
            }
            (Self::Connecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected),
                ],
            ),

            // From Open
            (Self::Open { failures }, Event::Closed { reason, uptime }) => {
                let attempt = if policy.is_stable(uptime) {
                    1
                } else {
                    failures.saturating_add(1)
                };
                schedule_retry(attempt, reason, policy)
            }
            (Self::Open { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected),
                ],
            ),

            // From Reconnecting
            (Self::Reconnecting { attempt }, Event::ReconnectTimer) => {
                (Self::Connecting { attempt }, vec![Action::Connect])
            }
            (Self::Reconnecting { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CancelReconnect,
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Disconnected),
                ],
            ),

            // Connect while a socket is open or in flight is a guard, not an
            // error; every other unmatched pair is ignored as well.
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the socket is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Check if a connection is being established or re-established.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::Open { .. } => "open",
            Self::Reconnecting { .. } => "reconnecting",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_retry(
    attempt: u32,
    error: String,
    policy: &ReconnectPolicy,
) -> (ConnectionState, Vec<Action>) {
    if policy.is_tripped(attempt) {
        let delay = policy.delay_for(attempt);
        // Counting restarts after the cooldown so backoff begins from base again
        return (
            ConnectionState::Reconnecting { attempt: 0 },
            vec![
                Action::EmitEvent(ConnectionEvent::CircuitOpen {
                    failures: attempt,
                    cooldown: delay,
                }),
                Action::StartReconnectTimer { delay },
            ],
        );
    }

    let delay = policy.delay_for(attempt);
    (
        ConnectionState::Reconnecting { attempt },
        vec![
            Action::EmitEvent(ConnectionEvent::Lost {
                reason: error,
                attempt,
                retry_in: delay,
            }),
            Action::StartReconnectTimer { delay },
        ],
    )
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller requested a connection.
    ConnectRequested,
    /// The transport opened a socket.
    ConnectSucceeded,
    /// The transport failed to open a socket.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// An open socket closed or errored.
    Closed {
        /// Reason for the close.
        reason: String,
        /// How long the socket had been open.
        uptime: Duration,
    },
    /// Caller requested a disconnect.
    DisconnectRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects. The client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a socket.
    Connect,
    /// Close the socket.
    Disconnect,
    /// Invoke the caller's on-open callback.
    RunOnOpen,
    /// Schedule the delayed presence announcement.
    SchedulePresence,
    /// Start a timer for reconnection.
    StartReconnectTimer {
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Emit an event to the application.
    EmitEvent(ConnectionEvent),
}

/// Connection events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket is open.
    Opened,
    /// The socket was lost or could not be opened; a retry is scheduled.
    Lost {
        /// Why the socket was lost.
        reason: String,
        /// Consecutive failures so far.
        attempt: u32,
        /// Delay until the next attempt.
        retry_in: Duration,
    },
    /// Too many consecutive failures; waiting out the cooldown.
    CircuitOpen {
        /// Consecutive failures that opened the breaker.
        failures: u32,
        /// Delay until the next attempt.
        cooldown: Duration,
    },
    /// Disconnected on request.
    Disconnected,
}
