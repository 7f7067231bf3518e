//! Passive reader telemetry listener.
//!
//! [`ReaderStatusListener`] is the single implementation of
//! [`ReaderEventListener`](crate::transport::ReaderEventListener) in the
//! subsystem. It turns each telemetry callback into the latest value of a
//! watch channel, which gives every channel the required semantics for free:
//! multicast, infinite, and replayable-to-latest for subscribers that arrive
//! late.
//!
//! The listener also holds the only transient connection bookkeeping in the
//! subsystem. When a connection attempt is abandoned mid-handshake, the
//! stall-recovery watcher calls [`ReaderStatusListener::reset_connection_state`]
//! to return every channel to its initial value, because the partial state
//! describes a reader that is no longer present.

use crate::types::{
    BatteryStatus, ReaderDisplayMessage, SoftwareUpdateAvailability, SoftwareUpdateStatus,
};
use crate::transport::ReaderEventListener;
use tokio::sync::watch;
use tracing::debug;

/// Watch-backed passive listener for reader telemetry.
///
/// # Examples
///
/// ```
/// use cardlink_terminal::listener::ReaderStatusListener;
/// use cardlink_terminal::transport::ReaderEventListener;
/// use cardlink_terminal::types::BatteryStatus;
///
/// let listener = ReaderStatusListener::new();
/// let mut battery = listener.battery_status_events();
///
/// // Hardware callback arrives...
/// listener.on_battery_status(BatteryStatus::reading(0.8, false));
///
/// // ...and the latest value is immediately visible to subscribers.
/// assert_eq!(battery.borrow_and_update().level(), Some(0.8));
/// ```
#[derive(Debug)]
pub struct ReaderStatusListener {
    update_status: watch::Sender<SoftwareUpdateStatus>,
    update_availability: watch::Sender<SoftwareUpdateAvailability>,
    battery_status: watch::Sender<BatteryStatus>,
    display_message: watch::Sender<Option<ReaderDisplayMessage>>,
}

impl ReaderStatusListener {
    /// Create a listener with every channel at its initial value.
    pub fn new() -> Self {
        Self {
            update_status: watch::Sender::new(SoftwareUpdateStatus::Unknown),
            update_availability: watch::Sender::new(SoftwareUpdateAvailability::Unknown),
            battery_status: watch::Sender::new(BatteryStatus::Unknown),
            display_message: watch::Sender::new(None),
        }
    }

    /// Subscribe to software update progress events.
    pub fn update_status_events(&self) -> watch::Receiver<SoftwareUpdateStatus> {
        self.update_status.subscribe()
    }

    /// Subscribe to software update availability events.
    pub fn update_availability_events(&self) -> watch::Receiver<SoftwareUpdateAvailability> {
        self.update_availability.subscribe()
    }

    /// Subscribe to battery status events.
    pub fn battery_status_events(&self) -> watch::Receiver<BatteryStatus> {
        self.battery_status.subscribe()
    }

    /// Subscribe to reader display message events. `None` means no message
    /// is currently shown.
    pub fn display_message_events(&self) -> watch::Receiver<Option<ReaderDisplayMessage>> {
        self.display_message.subscribe()
    }

    /// Reset all transient connection bookkeeping to initial values.
    ///
    /// Called when the reader the state described is gone: after a
    /// disconnect, or by the stall-recovery watcher when a connection attempt
    /// is abandoned mid-handshake.
    pub fn reset_connection_state(&self) {
        debug!("resetting reader listener connection state");
        self.update_status.send_replace(SoftwareUpdateStatus::Unknown);
        self.update_availability
            .send_replace(SoftwareUpdateAvailability::Unknown);
        self.battery_status.send_replace(BatteryStatus::Unknown);
        self.display_message.send_replace(None);
    }

    /// Clear only the current display message.
    ///
    /// Idempotent: clearing when no message is set leaves the channel value
    /// unchanged and does not wake subscribers spuriously.
    pub fn reset_display_message(&self) {
        self.display_message.send_if_modified(|current| {
            if current.is_some() {
                *current = None;
                true
            } else {
                false
            }
        });
    }
}

impl Default for ReaderStatusListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderEventListener for ReaderStatusListener {
    fn on_update_status(&self, status: SoftwareUpdateStatus) {
        self.update_status.send_replace(status);
    }

    fn on_update_availability(&self, availability: SoftwareUpdateAvailability) {
        self.update_availability.send_replace(availability);
    }

    fn on_battery_status(&self, status: BatteryStatus) {
        self.battery_status.send_replace(status);
    }

    fn on_display_message(&self, message: ReaderDisplayMessage) {
        self.display_message.send_replace(Some(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_start_at_initial_values() {
        let listener = ReaderStatusListener::new();

        assert_eq!(
            *listener.update_status_events().borrow(),
            SoftwareUpdateStatus::Unknown
        );
        assert_eq!(
            *listener.update_availability_events().borrow(),
            SoftwareUpdateAvailability::Unknown
        );
        assert_eq!(*listener.battery_status_events().borrow(), BatteryStatus::Unknown);
        assert_eq!(*listener.display_message_events().borrow(), None);
    }

    #[test]
    fn test_events_replay_latest_to_late_subscriber() {
        let listener = ReaderStatusListener::new();

        listener.on_update_availability(SoftwareUpdateAvailability::Available);
        listener.on_display_message(ReaderDisplayMessage::RetryCard);

        // Subscribing after the fact still sees the latest value.
        assert_eq!(
            *listener.update_availability_events().borrow(),
            SoftwareUpdateAvailability::Available
        );
        assert_eq!(
            *listener.display_message_events().borrow(),
            Some(ReaderDisplayMessage::RetryCard)
        );
    }

    #[test]
    fn test_reset_connection_state_clears_everything() {
        let listener = ReaderStatusListener::new();

        listener.on_update_status(SoftwareUpdateStatus::Installing { progress: 0.4 });
        listener.on_update_availability(SoftwareUpdateAvailability::Available);
        listener.on_battery_status(BatteryStatus::reading(0.9, true));
        listener.on_display_message(ReaderDisplayMessage::InsertCard);

        listener.reset_connection_state();

        assert_eq!(
            *listener.update_status_events().borrow(),
            SoftwareUpdateStatus::Unknown
        );
        assert_eq!(
            *listener.update_availability_events().borrow(),
            SoftwareUpdateAvailability::Unknown
        );
        assert_eq!(*listener.battery_status_events().borrow(), BatteryStatus::Unknown);
        assert_eq!(*listener.display_message_events().borrow(), None);
    }

    #[test]
    fn test_reset_display_message_is_idempotent() {
        let listener = ReaderStatusListener::new();
        let mut messages = listener.display_message_events();
        messages.borrow_and_update();

        // Nothing set: reset must not produce a spurious change notification.
        listener.reset_display_message();
        assert!(!messages.has_changed().unwrap());

        listener.on_display_message(ReaderDisplayMessage::SwipeCard);
        listener.reset_display_message();
        assert_eq!(*messages.borrow_and_update(), None);

        listener.reset_display_message();
        assert!(!messages.has_changed().unwrap());
    }
}
