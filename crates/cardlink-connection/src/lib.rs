//! Reader discovery and connection coordination for the Cardlink subsystem.
//!
//! This crate sits on top of the terminal boundary
//! ([`cardlink-terminal`](cardlink_terminal)) and provides the three
//! caller-facing components of the card-reader core:
//!
//! - [`DiscoveryEngine`](discovery::DiscoveryEngine) — runs one or two
//!   discovery runs per session based on a [`DiscoveryFilter`](discovery::DiscoveryFilter)
//!   and produces a unified, filtered, cancellable stream of
//!   [`DiscoveryEvent`](discovery::DiscoveryEvent)s.
//! - [`ConnectionManager`](manager::ConnectionManager) — owns the single
//!   authoritative [`ConnectionStatus`](status::ConnectionStatus), drives
//!   connect/disconnect requests, and supervises stall recovery for
//!   handshakes abandoned through side channels.
//! - [`TelemetryRelay`](telemetry::TelemetryRelay) — forwards software
//!   update, battery, and display-message telemetry to subscribers without
//!   ever touching the connection status.
//!
//! # Typical flow
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardlink_connection::discovery::{DiscoveryEngine, DiscoveryEvent, DiscoveryFilter};
//! use cardlink_connection::manager::ConnectionManager;
//! use cardlink_core::LocationId;
//! use cardlink_terminal::mock::MockTerminal;
//! use cardlink_terminal::source::ReaderEventSource;
//! use cardlink_terminal::transport::AnyTerminal;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (terminal, _handle) = MockTerminal::new();
//! let source = Arc::new(ReaderEventSource::new(AnyTerminal::Mock(terminal)));
//! let engine = DiscoveryEngine::new(Arc::clone(&source));
//! let manager = ConnectionManager::new(Arc::clone(&source));
//!
//! // Discover...
//! let mut stream = engine.discover(DiscoveryFilter::Unspecified, false);
//! let mut candidate = None;
//! while let Some(event) = stream.recv().await {
//!     if let DiscoveryEvent::ReadersFound(readers) = event {
//!         candidate = readers.into_iter().next();
//!     }
//! }
//!
//! // ...then connect the chosen reader to a location.
//! if let Some(reader) = candidate {
//!     let location = LocationId::new("loc_D2PnsNMVW3kdSE")?;
//!     manager.start_connection(reader, location).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! All failures are terminal events on their streams, never faults thrown
//! past the subsystem boundary: a discovery run ends with
//! `DiscoveryEvent::Failed(message)`, a connection attempt ends in
//! `ConnectionStatus::NotConnected { reason }`. The reason strings are the
//! hardware SDK's human-readable messages, passed through unmodified.

pub mod discovery;
pub mod error;
pub mod manager;
pub mod status;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use discovery::{DiscoveryEngine, DiscoveryEvent, DiscoveryFilter, DiscoveryStream};
pub use error::{ConnectionError, Result};
pub use manager::ConnectionManager;
pub use status::{ConnectionStatus, StatusCell, StatusTransition};
pub use telemetry::TelemetryRelay;
