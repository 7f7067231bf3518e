//! Shared test harness for connection flow integration tests.
//!
//! Wires a scripted mock terminal through the full stack: mock terminal →
//! event source → discovery engine / connection manager / telemetry relay,
//! the same shape the subsystem has in production with a real SDK backend.

use cardlink_connection::discovery::{DiscoveryEngine, DiscoveryEvent, DiscoveryStream};
use cardlink_connection::manager::ConnectionManager;
use cardlink_connection::status::ConnectionStatus;
use cardlink_connection::telemetry::TelemetryRelay;
use cardlink_core::{LocationId, ReaderModel};
use cardlink_terminal::mock::{MockTerminal, MockTerminalHandle};
use cardlink_terminal::source::ReaderEventSource;
use cardlink_terminal::transport::AnyTerminal;
use cardlink_terminal::types::{ConnectedReader, DiscoveredReader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The fully wired subsystem over a scripted mock terminal.
pub struct Harness {
    pub handle: MockTerminalHandle,
    pub engine: DiscoveryEngine,
    pub manager: ConnectionManager,
    pub telemetry: TelemetryRelay,
}

/// Build the subsystem the way production wiring does.
pub fn harness() -> Harness {
    // RUST_LOG=debug surfaces the coordinator's transition logs when a
    // scenario fails.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let (terminal, handle) = MockTerminal::new();
    let source = Arc::new(ReaderEventSource::new(AnyTerminal::Mock(terminal)));
    let engine = DiscoveryEngine::new(Arc::clone(&source));
    let manager = ConnectionManager::new(Arc::clone(&source));
    let telemetry = manager.telemetry();

    Harness {
        handle,
        engine,
        manager,
        telemetry,
    }
}

/// Bluetooth reader candidate used across scenarios ("reader A").
pub fn reader_a() -> DiscoveredReader {
    DiscoveredReader::new(test_data::READER_A_SERIAL, ReaderModel::Chipper2X)
        .with_battery_level(0.82)
}

/// Built-in reader candidate used across scenarios ("reader B").
pub fn reader_b() -> DiscoveredReader {
    DiscoveredReader::new(test_data::READER_B_SERIAL, ReaderModel::CotsDevice)
}

/// The connected handle the hardware returns for reader A.
pub fn connected_reader_a() -> ConnectedReader {
    ConnectedReader::new(test_data::READER_A_SERIAL, ReaderModel::Chipper2X)
        .with_battery_level(0.81)
        .with_firmware_version("1.00.03.34")
}

pub fn location(raw: &str) -> LocationId {
    LocationId::new(raw).expect("valid test location")
}

/// Drain a discovery stream to its end.
pub async fn collect_events(mut stream: DiscoveryStream) -> Vec<DiscoveryEvent> {
    let mut events = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
    })
    .await;
    drained.expect("discovery stream did not terminate");
    events
}

/// All candidates surfaced by a collected event sequence, in arrival order.
pub fn found_serials(events: &[DiscoveryEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            DiscoveryEvent::ReadersFound(readers) => Some(readers),
            _ => None,
        })
        .flatten()
        .map(|reader| reader.serial().to_string())
        .collect()
}

/// Wait until the connection status matches `predicate`.
pub async fn wait_for_status(
    rx: &mut watch::Receiver<ConnectionStatus>,
    predicate: impl Fn(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|status| predicate(status)))
        .await
        .expect("timed out waiting for connection status")
        .expect("status channel closed")
        .clone()
}

/// Poll until `condition` holds. The mock resolves callbacks on spawned
/// tasks, so their side effects are not visible synchronously.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

/// Common test data used across multiple tests.
pub mod test_data {
    /// Serial of the external Bluetooth reader ("reader A").
    pub const READER_A_SERIAL: &str = "CHB204909005823";

    /// Serial of the built-in reader ("reader B").
    pub const READER_B_SERIAL: &str = "host-device";

    /// Location bound to successful connections.
    pub const LOCATION_1: &str = "loc-1";

    /// Location used for the failing COTS connection scenario.
    pub const LOCATION_2: &str = "loc-2";

    /// Failure message the hardware reports in the timeout scenario.
    pub const MSG_TIMEOUT: &str = "timeout";
}
