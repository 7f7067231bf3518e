//! Connection status state machine.
//!
//! This module provides the authoritative connection state for the
//! subsystem: the [`ConnectionStatus`] enum, its transition rules, and the
//! [`StatusCell`] that holds the single live instance.
//!
//! # States
//!
//! - `NotConnected`: no reader attached; carries the failure reason when the
//!   previous attempt or connection ended in an error
//! - `Connecting`: a connect request is in flight
//! - `Connected`: a reader is attached and usable
//!
//! # Valid Transitions
//!
//! - NotConnected → Connecting (connect request issued)
//! - Connecting → Connected (hardware success callback)
//! - Connecting → NotConnected (failure callback or out-of-band disconnect)
//! - Connected → NotConnected (disconnect, requested or unexpected)
//! - NotConnected → NotConnected (reason refresh; e.g. a late disconnect
//!   report arriving while already disconnected)
//!
//! Only the connection coordinator mutates the cell; every other component
//! reads immutable snapshots through a watch receiver, so observers never
//! see a torn update.

use crate::error::{ConnectionError, Result};
use cardlink_core::constants::MAX_STATUS_HISTORY;
use cardlink_terminal::ConnectedReader;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Connection state of the card reader subsystem.
///
/// Exactly one instance is authoritative at any time, owned by the
/// connection coordinator. Every failure cause (rejection, timeout, user
/// cancel, unexpected drop) collapses into `NotConnected` with the SDK's
/// human-readable message as the reason; callers treat that as a normal
/// outcome requiring user-facing messaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No reader is connected. `reason` carries the failure message when the
    /// previous attempt or connection ended in an error.
    NotConnected { reason: Option<String> },

    /// A connection attempt is in flight.
    Connecting,

    /// A reader is connected.
    Connected(ConnectedReader),
}

impl ConnectionStatus {
    /// The initial state: not connected, no failure reported.
    pub fn idle() -> Self {
        Self::NotConnected { reason: None }
    }

    /// Short state name for logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotConnected { .. } => "NotConnected",
            Self::Connecting => "Connecting",
            Self::Connected(_) => "Connected",
        }
    }

    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_connection::status::ConnectionStatus;
    ///
    /// let idle = ConnectionStatus::idle();
    /// assert!(idle.can_transition_to(&ConnectionStatus::Connecting));
    /// assert!(!ConnectionStatus::Connecting.can_transition_to(&ConnectionStatus::Connecting));
    /// ```
    pub fn can_transition_to(&self, target: &ConnectionStatus) -> bool {
        matches!(
            (self, target),
            // From NotConnected
            (
                ConnectionStatus::NotConnected { .. },
                ConnectionStatus::Connecting | ConnectionStatus::NotConnected { .. }
            )
            // From Connecting
            | (
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected(_) | ConnectionStatus::NotConnected { .. }
            )
            // From Connected
            | (ConnectionStatus::Connected(_), ConnectionStatus::NotConnected { .. })
        )
    }

    /// Whether no reader is connected.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected { reason: None } => write!(f, "NotConnected"),
            Self::NotConnected {
                reason: Some(reason),
            } => write!(f, "NotConnected ({reason})"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected(reader) => write!(f, "Connected ({reader})"),
        }
    }
}

/// A recorded status transition, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// State the cell left.
    pub from: &'static str,

    /// State the cell entered.
    pub to: &'static str,

    /// When the transition happened.
    pub at: Instant,
}

/// The single authoritative holder of [`ConnectionStatus`].
///
/// Watch-backed: writers go through [`StatusCell::transition`], which
/// validates the edge against the state machine; readers subscribe and see
/// consistent snapshots. Clones share the same underlying cell.
#[derive(Debug, Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<ConnectionStatus>>,
    history: Arc<Mutex<VecDeque<StatusTransition>>>,
}

impl StatusCell {
    /// Create a cell in the initial `NotConnected` state.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(ConnectionStatus::idle())),
            history: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Snapshot of the current status.
    pub fn current(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Apply a status transition.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::InvalidTransition` and leaves the cell
    /// unchanged if the edge is not part of the state machine.
    pub fn transition(&self, to: ConnectionStatus) -> Result<()> {
        let mut applied = Ok(());
        self.tx.send_if_modified(|current| {
            if current.can_transition_to(&to) {
                let record = StatusTransition {
                    from: current.name(),
                    to: to.name(),
                    at: Instant::now(),
                };
                debug!(from = record.from, to = record.to, "connection status transition");
                self.record(record);
                *current = to.clone();
                true
            } else {
                warn!(
                    from = current.name(),
                    to = to.name(),
                    "rejected invalid status transition"
                );
                applied = Err(ConnectionError::InvalidTransition {
                    from: current.name(),
                    to: to.name(),
                });
                false
            }
        });
        applied
    }

    fn record(&self, transition: StatusTransition) {
        let mut history = self.history.lock().expect("status history lock poisoned");
        if history.len() == MAX_STATUS_HISTORY {
            history.pop_front();
        }
        history.push_back(transition);
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> Vec<StatusTransition> {
        self.history
            .lock()
            .expect("status history lock poisoned")
            .iter()
            .copied()
            .collect()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_core::ReaderModel;

    fn connected() -> ConnectionStatus {
        ConnectionStatus::Connected(ConnectedReader::new(
            "CHB204909005823",
            ReaderModel::Chipper2X,
        ))
    }

    #[test]
    fn test_valid_transitions() {
        let idle = ConnectionStatus::idle();
        assert!(idle.can_transition_to(&ConnectionStatus::Connecting));
        assert!(idle.can_transition_to(&ConnectionStatus::NotConnected {
            reason: Some("late report".to_string())
        }));

        assert!(ConnectionStatus::Connecting.can_transition_to(&connected()));
        assert!(ConnectionStatus::Connecting.can_transition_to(&ConnectionStatus::idle()));

        assert!(connected().can_transition_to(&ConnectionStatus::idle()));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!ConnectionStatus::idle().can_transition_to(&connected()));
        assert!(!ConnectionStatus::Connecting.can_transition_to(&ConnectionStatus::Connecting));
        assert!(!connected().can_transition_to(&ConnectionStatus::Connecting));
        assert!(!connected().can_transition_to(&connected()));
    }

    #[test]
    fn test_cell_applies_and_records_transitions() {
        let cell = StatusCell::new();
        assert_eq!(cell.current(), ConnectionStatus::idle());

        cell.transition(ConnectionStatus::Connecting).unwrap();
        cell.transition(connected()).unwrap();
        cell.transition(ConnectionStatus::idle()).unwrap();

        let names: Vec<(&str, &str)> = cell.history().iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            names,
            vec![
                ("NotConnected", "Connecting"),
                ("Connecting", "Connected"),
                ("Connected", "NotConnected"),
            ]
        );
    }

    #[test]
    fn test_cell_rejects_invalid_transition() {
        let cell = StatusCell::new();

        let result = cell.transition(connected());
        assert_eq!(
            result,
            Err(ConnectionError::InvalidTransition {
                from: "NotConnected",
                to: "Connected",
            })
        );
        // Cell unchanged, nothing recorded.
        assert_eq!(cell.current(), ConnectionStatus::idle());
        assert!(cell.history().is_empty());
    }

    #[test]
    fn test_invalid_transition_does_not_wake_subscribers() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();
        rx.borrow_and_update();

        let _ = cell.transition(connected());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_history_is_bounded() {
        let cell = StatusCell::new();
        for _ in 0..(MAX_STATUS_HISTORY) {
            cell.transition(ConnectionStatus::Connecting).unwrap();
            cell.transition(ConnectionStatus::idle()).unwrap();
        }
        assert_eq!(cell.history().len(), MAX_STATUS_HISTORY);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::idle().to_string(), "NotConnected");
        assert_eq!(
            ConnectionStatus::NotConnected {
                reason: Some("timeout".to_string())
            }
            .to_string(),
            "NotConnected (timeout)"
        );
        assert_eq!(ConnectionStatus::Connecting.to_string(), "Connecting");
    }

    #[test]
    fn test_status_serialization() {
        let status = ConnectionStatus::NotConnected {
            reason: Some("timeout".to_string()),
        };
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: ConnectionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
