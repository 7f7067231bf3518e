//! Error types for terminal operations.
//!
//! This module defines the error type produced at the hardware-SDK boundary.
//! Every failure the SDK reports through a callback is converted into a
//! [`TerminalError`] so that upper layers can log and test against structured
//! variants, while the externally visible contract stays a human-readable
//! message string (the `Display` output).

/// Result type alias for terminal operations.
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Errors reported by the hardware terminal SDK.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalError {
    /// Operation timed out after the specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Bluetooth transport failure while scanning or connecting.
    #[error("Bluetooth error: {message}")]
    Bluetooth { message: String },

    /// The reader rejected the request because it is in use elsewhere.
    #[error("Reader busy: {serial}")]
    ReaderBusy { serial: String },

    /// The platform rejected the location the connection was bound to.
    #[error("Invalid location: {location}")]
    InvalidLocation { location: String },

    /// The reader dropped off mid-operation.
    #[error("Reader disconnected: {message}")]
    Disconnected { message: String },

    /// The operation was cancelled before the hardware produced a result.
    #[error("Operation cancelled")]
    Cancelled,

    /// Any other SDK-reported failure, carried as the SDK's own message.
    #[error("{message}")]
    Sdk { message: String },
}

impl TerminalError {
    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new Bluetooth transport error.
    pub fn bluetooth(message: impl Into<String>) -> Self {
        Self::Bluetooth {
            message: message.into(),
        }
    }

    /// Create a new reader-busy error.
    pub fn reader_busy(serial: impl Into<String>) -> Self {
        Self::ReaderBusy {
            serial: serial.into(),
        }
    }

    /// Create a new invalid-location error.
    pub fn invalid_location(location: impl Into<String>) -> Self {
        Self::InvalidLocation {
            location: location.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Create a generic SDK error with the SDK's own message.
    pub fn sdk(message: impl Into<String>) -> Self {
        Self::Sdk {
            message: message.into(),
        }
    }
}
