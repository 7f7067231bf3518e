//! Hardware terminal boundary for the Cardlink card-reader subsystem.
//!
//! This crate pins down the external payment-terminal SDK as an opaque,
//! callback-oriented capability and converts that surface into the internal
//! event model the rest of the subsystem consumes. It is the only crate that
//! knows the SDK exists; everything above it sees awaitable operations and
//! subscribable channels.
//!
//! # Design Philosophy
//!
//! - **One callback, one event**: every callback the SDK delivers is
//!   converted into exactly one internal event. Nothing is dropped silently;
//!   a torn-down callback still produces a terminal outcome so subscribers
//!   are never left waiting.
//! - **Cancellation reaches the hardware**: abandoning a discovery sequence
//!   cancels the scan itself, not just the consumption of its events.
//! - **Enum dispatch over backends**: terminal backends are wrapped in the
//!   [`AnyTerminal`](transport::AnyTerminal) enum for concrete, zero-cost
//!   dispatch, with feature flags as the evolution path for real SDK
//!   integrations.
//!
//! # Components
//!
//! - [`transport`] — the SDK surface: [`TerminalTransport`](transport::TerminalTransport)
//!   plus one callback trait per callback family.
//! - [`source`] — [`ReaderEventSource`](source::ReaderEventSource), the
//!   callback-to-stream bridge: discovery runs, awaitable connect and
//!   disconnect, out-of-band disconnect events, and candidate generation
//!   stamping.
//! - [`listener`] — [`ReaderStatusListener`](listener::ReaderStatusListener),
//!   the watch-backed passive listener carrying software-update, battery,
//!   and display-message telemetry.
//! - [`mock`] — [`MockTerminal`](mock::MockTerminal) and its scripting
//!   handle for development and testing without reader hardware.
//!
//! # Examples
//!
//! ```no_run
//! use cardlink_core::DeviceClass;
//! use cardlink_terminal::mock::MockTerminal;
//! use cardlink_terminal::source::ReaderEventSource;
//! use cardlink_terminal::transport::AnyTerminal;
//!
//! # async fn example() {
//! let (terminal, _handle) = MockTerminal::new();
//! let source = ReaderEventSource::new(AnyTerminal::Mock(terminal));
//!
//! let generation = source.advance_generation();
//! let mut run = source.discover(DeviceClass::External, false, generation);
//! while let Some(status) = run.recv().await {
//!     println!("discovery: {:?}", status);
//! }
//! # }
//! ```

pub mod error;
pub mod listener;
pub mod mock;
pub mod source;
pub mod transport;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Result, TerminalError};
pub use listener::ReaderStatusListener;
pub use source::{DiscoveryRun, ReaderEventSource};
pub use transport::{AnyTerminal, ConnectionConfig, TerminalTransport};
pub use types::{
    BatteryStatus, ConnectedReader, DiscoverStatus, DiscoveredReader, ReaderDisplayMessage,
    SoftwareUpdateAvailability, SoftwareUpdateStatus,
};
