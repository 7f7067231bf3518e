//! Error types for the connection layer.
//!
//! These errors cover precondition violations on the caller-facing contract.
//! Hardware failures never appear here: they surface as
//! [`ConnectionStatus::NotConnected`](crate::status::ConnectionStatus) with
//! the SDK's message as the reason, which callers treat as a normal outcome
//! rather than an exceptional condition.

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Errors that reject a connection-layer request up front.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// A connection attempt is already in flight. Callers serialize
    /// connection attempts; there is no internal queue.
    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,

    /// A reader is already connected.
    #[error("Reader already connected: {serial}")]
    AlreadyConnected { serial: String },

    /// The candidate belongs to a superseded discovery session and may no
    /// longer be present.
    #[error("Reader {serial} was found by a superseded discovery run")]
    StaleReader { serial: String },

    /// A status transition violated the connection state machine.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl ConnectionError {
    /// Create a new already-connected error.
    pub fn already_connected(serial: impl Into<String>) -> Self {
        Self::AlreadyConnected {
            serial: serial.into(),
        }
    }

    /// Create a new stale-reader error.
    pub fn stale_reader(serial: impl Into<String>) -> Self {
        Self::StaleReader {
            serial: serial.into(),
        }
    }
}
