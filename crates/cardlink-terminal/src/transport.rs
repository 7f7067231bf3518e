//! The hardware SDK surface and its callback contracts.
//!
//! The terminal SDK is an opaque capability: it scans for readers, connects,
//! disconnects, and reports everything else back through callbacks. This
//! module pins that surface down as the [`TerminalTransport`] trait plus one
//! callback trait per callback family, and provides the [`AnyTerminal`] enum
//! wrapper used for concrete dispatch over the available backends.
//!
//! # Enum Dispatch Pattern
//!
//! Backends are wrapped in the [`AnyTerminal`] enum rather than boxed trait
//! objects, following the same dispatch pattern used for device backends
//! elsewhere in this workspace:
//! - Zero-cost dispatch (no vtable on the hot callback paths)
//! - Type-safe extensibility
//! - Support for feature flags (conditional compilation per SDK backend)
//!
//! # Callback Contracts
//!
//! Every callback is delivered at most once per logical event, and the
//! bridging layer in [`crate::source`] converts each one into exactly one
//! internal event:
//! - [`DiscoveryListener`] receives repeated `on_update` calls followed by
//!   exactly one terminal `on_success`/`on_failure`.
//! - [`ConnectCallback`] and [`DisconnectCallback`] are single-shot: the
//!   transport invokes exactly one of the two consuming methods.
//! - [`ReaderEventListener`] is the passive listener registered with
//!   Bluetooth connections; it may fire any number of times in any order.
//! - [`TerminalListener`] receives out-of-band session events, currently
//!   unexpected disconnects.

use crate::error::TerminalError;
use crate::types::{
    BatteryStatus, ConnectedReader, DiscoveredReader, ReaderDisplayMessage, SoftwareUpdateAvailability,
    SoftwareUpdateStatus,
};
use cardlink_core::{DeviceClass, LocationId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Connection configuration, selected by the candidate's device class.
///
/// Built-in (COTS) readers connect with the local-mobile configuration; all
/// other readers connect over Bluetooth and additionally register the
/// passive listener for telemetry. Both variants bind the connection to a
/// business location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// External reader over Bluetooth.
    Bluetooth {
        /// Location the connection is registered to.
        location_id: LocationId,
    },

    /// Built-in reader on the host device.
    LocalMobile {
        /// Location the connection is registered to.
        location_id: LocationId,
    },
}

impl ConnectionConfig {
    /// Build the configuration appropriate for the given device class.
    pub fn for_class(class: DeviceClass, location_id: LocationId) -> Self {
        match class {
            DeviceClass::BuiltIn => Self::LocalMobile { location_id },
            DeviceClass::External => Self::Bluetooth { location_id },
        }
    }

    /// Location the connection is bound to.
    pub fn location_id(&self) -> &LocationId {
        match self {
            Self::Bluetooth { location_id } | Self::LocalMobile { location_id } => location_id,
        }
    }
}

/// Callbacks for one discovery run.
pub trait DiscoveryListener: Send + Sync {
    /// A fresh snapshot of the readers currently visible to the scan.
    fn on_update(&self, readers: Vec<DiscoveredReader>);

    /// The run finished normally. Terminal; no further callbacks follow.
    fn on_success(&self);

    /// The run failed. Terminal; no further callbacks follow.
    fn on_failure(&self, error: TerminalError);
}

/// Single-shot callback for a connect request.
///
/// The transport invokes exactly one of the two methods. Both consume the
/// callback, which makes delivering a second outcome unrepresentable.
pub trait ConnectCallback: Send {
    /// The reader is connected; `reader` is the live handle.
    fn on_success(self: Box<Self>, reader: ConnectedReader);

    /// The connection attempt failed.
    fn on_failure(self: Box<Self>, error: TerminalError);
}

/// Single-shot callback for a disconnect request.
pub trait DisconnectCallback: Send {
    /// The hardware confirmed the disconnection.
    fn on_success(self: Box<Self>);

    /// The hardware could not confirm the disconnection.
    fn on_failure(self: Box<Self>, error: TerminalError);
}

/// Passive listener for reader telemetry.
///
/// Registered alongside Bluetooth connections; delivers software-update,
/// battery, and display-message events independently of the connect and
/// disconnect calls.
pub trait ReaderEventListener: Send + Sync {
    /// Software update installation progress changed.
    fn on_update_status(&self, status: SoftwareUpdateStatus);

    /// Software update availability changed.
    fn on_update_availability(&self, availability: SoftwareUpdateAvailability);

    /// A new battery reading arrived.
    fn on_battery_status(&self, status: BatteryStatus);

    /// The reader asks the app to show a prompt.
    fn on_display_message(&self, message: ReaderDisplayMessage);
}

/// Out-of-band session events from the terminal SDK.
pub trait TerminalListener: Send + Sync {
    /// The reader dropped off without a disconnect request, possibly in the
    /// middle of a connection handshake.
    fn on_unexpected_disconnect(&self, error: TerminalError);
}

/// The opaque hardware SDK capability.
///
/// All methods are non-blocking: results arrive through the supplied
/// callbacks. The hardware enforces at most one discovery run per device
/// class and at most one active connection; callers uphold those invariants,
/// the transport does not re-check them.
pub trait TerminalTransport: Send + Sync {
    /// Begin one discovery run for the given device class.
    ///
    /// Events are delivered to `listener` until a terminal callback fires or
    /// the returned token is cancelled. Cancelling the token stops the
    /// hardware scan; no callbacks are delivered afterwards.
    fn discover_readers(
        &self,
        class: DeviceClass,
        simulated: bool,
        listener: Arc<dyn DiscoveryListener>,
    ) -> CancellationToken;

    /// Connect to an external reader over Bluetooth, registering the passive
    /// listener for telemetry. Exactly one `callback` method fires.
    fn connect_bluetooth(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
        reader_listener: Arc<dyn ReaderEventListener>,
    );

    /// Connect to the built-in reader of the host device. Exactly one
    /// `callback` method fires.
    fn connect_local_mobile(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
    );

    /// Disconnect the currently connected reader. Exactly one `callback`
    /// method fires.
    fn disconnect_reader(&self, callback: Box<dyn DisconnectCallback>);

    /// Register the listener for out-of-band session events. At most one
    /// listener is active; a second registration replaces the first.
    fn set_terminal_listener(&self, listener: Arc<dyn TerminalListener>);
}

/// Enum wrapper for terminal backend dispatch.
///
/// # Examples
///
/// ```
/// use cardlink_terminal::mock::MockTerminal;
/// use cardlink_terminal::transport::AnyTerminal;
///
/// let (terminal, _handle) = MockTerminal::new();
/// let any_terminal = AnyTerminal::Mock(terminal);
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTerminal {
    /// Mock terminal for development and testing.
    Mock(crate::mock::MockTerminal),
    // Planned variants, behind the sdk-* feature flags:
    // - Stripe(StripeTerminal) - Stripe Terminal SDK backend
    // - Adyen(AdyenTerminal) - Adyen POS SDK backend
}

impl TerminalTransport for AnyTerminal {
    fn discover_readers(
        &self,
        class: DeviceClass,
        simulated: bool,
        listener: Arc<dyn DiscoveryListener>,
    ) -> CancellationToken {
        match self {
            Self::Mock(terminal) => terminal.discover_readers(class, simulated, listener),
        }
    }

    fn connect_bluetooth(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
        reader_listener: Arc<dyn ReaderEventListener>,
    ) {
        match self {
            Self::Mock(terminal) => {
                terminal.connect_bluetooth(reader, location_id, callback, reader_listener)
            }
        }
    }

    fn connect_local_mobile(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
    ) {
        match self {
            Self::Mock(terminal) => terminal.connect_local_mobile(reader, location_id, callback),
        }
    }

    fn disconnect_reader(&self, callback: Box<dyn DisconnectCallback>) {
        match self {
            Self::Mock(terminal) => terminal.disconnect_reader(callback),
        }
    }

    fn set_terminal_listener(&self, listener: Arc<dyn TerminalListener>) {
        match self {
            Self::Mock(terminal) => terminal.set_terminal_listener(listener),
        }
    }
}
