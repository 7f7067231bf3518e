//! Telemetry relay.
//!
//! Pure forwarding of the four passive reader channels to subscribers. The
//! relay holds no state of its own and performs no filtering or buffering
//! beyond the latest-value semantics of the underlying watch channels: a new
//! subscriber immediately observes the most recent value, then every change
//! from there on. Telemetry delivery never touches the connection status.

use cardlink_terminal::listener::ReaderStatusListener;
use cardlink_terminal::types::{
    BatteryStatus, ReaderDisplayMessage, SoftwareUpdateAvailability, SoftwareUpdateStatus,
};
use std::sync::Arc;
use tokio::sync::watch;

/// Read-only fan-out of the passive reader telemetry channels.
///
/// Cheap to clone and to create; every accessor returns an independent
/// receiver positioned at the latest value.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cardlink_connection::telemetry::TelemetryRelay;
/// use cardlink_terminal::listener::ReaderStatusListener;
/// use cardlink_terminal::transport::ReaderEventListener;
/// use cardlink_terminal::types::BatteryStatus;
///
/// let listener = Arc::new(ReaderStatusListener::new());
/// let relay = TelemetryRelay::new(Arc::clone(&listener));
///
/// listener.on_battery_status(BatteryStatus::reading(0.42, false));
///
/// // Late subscribers replay the latest value.
/// assert_eq!(relay.battery_status().borrow().level(), Some(0.42));
/// ```
#[derive(Debug, Clone)]
pub struct TelemetryRelay {
    listener: Arc<ReaderStatusListener>,
}

impl TelemetryRelay {
    /// Create a relay over the passive listener.
    pub fn new(listener: Arc<ReaderStatusListener>) -> Self {
        Self { listener }
    }

    /// Software update installation progress.
    pub fn software_update_status(&self) -> watch::Receiver<SoftwareUpdateStatus> {
        self.listener.update_status_events()
    }

    /// Software update availability.
    pub fn software_update_availability(&self) -> watch::Receiver<SoftwareUpdateAvailability> {
        self.listener.update_availability_events()
    }

    /// Battery readings.
    pub fn battery_status(&self) -> watch::Receiver<BatteryStatus> {
        self.listener.battery_status_events()
    }

    /// Reader display prompts; `None` when no message is shown.
    pub fn display_messages(&self) -> watch::Receiver<Option<ReaderDisplayMessage>> {
        self.listener.display_message_events()
    }
}
