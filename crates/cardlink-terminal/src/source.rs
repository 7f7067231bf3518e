//! Callback-to-stream bridging over the terminal transport.
//!
//! [`ReaderEventSource`] is the single translation boundary between the
//! SDK's callback surface and the internal event model. Each callback family
//! is paired with the channel that carries it:
//!
//! ```text
//! DiscoveryListener ──► unbounded mpsc ──► DiscoveryRun::recv()
//! ConnectCallback   ──► oneshot        ──► connect().await
//! DisconnectCallback──► oneshot        ──► disconnect().await
//! ReaderEventListener ► watch channels ──► ReaderStatusListener subscribers
//! TerminalListener  ──► unbounded mpsc ──► unexpected-disconnect consumer
//! ```
//!
//! Every callback becomes exactly one internal event; none are dropped
//! silently. A transport that tears a callback down without invoking it
//! still produces a terminal outcome (an error for connects, `false` for
//! disconnects, channel end for discovery) so no subscriber is ever left
//! waiting.

use crate::error::{Result, TerminalError};
use crate::listener::ReaderStatusListener;
use crate::transport::{
    AnyTerminal, ConnectCallback, ConnectionConfig, DisconnectCallback, DiscoveryListener,
    TerminalListener, TerminalTransport,
};
use crate::types::{ConnectedReader, DiscoverStatus, DiscoveredReader};
use cardlink_core::DeviceClass;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One live discovery run.
///
/// Yields the run's [`DiscoverStatus`] events in order: `Started` first,
/// then any number of `FoundReaders` snapshots, then one terminal event.
/// Dropping the run cancels the underlying hardware scan, so abandoning a
/// sequence can never leave an orphaned scan behind.
#[derive(Debug)]
pub struct DiscoveryRun {
    class: DeviceClass,
    generation: u64,
    rx: mpsc::UnboundedReceiver<DiscoverStatus>,
    token: CancellationToken,
}

impl DiscoveryRun {
    /// Receive the next event of this run.
    ///
    /// Returns `None` once the run is over and all events were consumed, or
    /// if the transport tore the scan down without a terminal callback.
    pub async fn recv(&mut self) -> Option<DiscoverStatus> {
        self.rx.recv().await
    }

    /// Device class this run scans for.
    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Discovery generation the run's candidates are stamped with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token that stops the hardware scan when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for DiscoveryRun {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Bridges one discovery run's callbacks onto its channel, stamping
/// candidates with the run's generation on the way through.
struct ChannelDiscoveryListener {
    tx: mpsc::UnboundedSender<DiscoverStatus>,
    generation: u64,
}

impl DiscoveryListener for ChannelDiscoveryListener {
    fn on_update(&self, mut readers: Vec<DiscoveredReader>) {
        for reader in &mut readers {
            reader.stamp_generation(self.generation);
        }
        // A closed channel means the run was dropped; the scan is already
        // being cancelled through the token.
        let _ = self.tx.send(DiscoverStatus::FoundReaders(readers));
    }

    fn on_success(&self) {
        let _ = self.tx.send(DiscoverStatus::Success);
    }

    fn on_failure(&self, error: TerminalError) {
        let _ = self.tx.send(DiscoverStatus::Failure(error));
    }
}

/// Single-shot connect callback resolving a oneshot channel.
struct OneshotConnect {
    tx: oneshot::Sender<Result<ConnectedReader>>,
}

impl ConnectCallback for OneshotConnect {
    fn on_success(self: Box<Self>, reader: ConnectedReader) {
        let _ = self.tx.send(Ok(reader));
    }

    fn on_failure(self: Box<Self>, error: TerminalError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Single-shot disconnect callback resolving a oneshot channel.
struct OneshotDisconnect {
    tx: oneshot::Sender<std::result::Result<(), TerminalError>>,
}

impl DisconnectCallback for OneshotDisconnect {
    fn on_success(self: Box<Self>) {
        let _ = self.tx.send(Ok(()));
    }

    fn on_failure(self: Box<Self>, error: TerminalError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Forwards out-of-band terminal events onto an internal channel.
struct TerminalEvents {
    tx: mpsc::UnboundedSender<TerminalError>,
}

impl TerminalListener for TerminalEvents {
    fn on_unexpected_disconnect(&self, error: TerminalError) {
        if self.tx.send(error).is_err() {
            warn!("unexpected disconnect reported with no consumer attached");
        }
    }
}

/// The Reader Event Source: owns the terminal backend and converts its
/// callback surface into awaitable operations and subscribable channels.
///
/// There is exactly one instance per hardware session. Discovery runs for
/// different device classes may execute concurrently; two concurrent runs of
/// the same class are a caller invariant (the discovery engine serializes
/// them), matching what the hardware supports.
///
/// # Examples
///
/// ```no_run
/// use cardlink_core::DeviceClass;
/// use cardlink_terminal::mock::MockTerminal;
/// use cardlink_terminal::source::ReaderEventSource;
/// use cardlink_terminal::transport::AnyTerminal;
///
/// # async fn example() {
/// let (terminal, _handle) = MockTerminal::new();
/// let source = ReaderEventSource::new(AnyTerminal::Mock(terminal));
///
/// let generation = source.advance_generation();
/// let mut run = source.discover(DeviceClass::External, false, generation);
/// while let Some(status) = run.recv().await {
///     println!("discovery: {:?}", status);
/// }
/// # }
/// ```
pub struct ReaderEventSource {
    terminal: AnyTerminal,
    listener: Arc<ReaderStatusListener>,
    generation: AtomicU64,
    disconnect_events: Mutex<Option<mpsc::UnboundedReceiver<TerminalError>>>,
}

impl ReaderEventSource {
    /// Create the event source over a terminal backend.
    ///
    /// Registers itself as the backend's terminal listener so out-of-band
    /// disconnects are captured from the very first callback.
    pub fn new(terminal: AnyTerminal) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        terminal.set_terminal_listener(Arc::new(TerminalEvents { tx }));

        Self {
            terminal,
            listener: Arc::new(ReaderStatusListener::new()),
            generation: AtomicU64::new(0),
            disconnect_events: Mutex::new(Some(rx)),
        }
    }

    /// The passive telemetry listener shared with the terminal backend.
    pub fn status_listener(&self) -> Arc<ReaderStatusListener> {
        Arc::clone(&self.listener)
    }

    /// Start a new discovery generation and return its id.
    ///
    /// Candidates stamped with an older generation are stale: they describe
    /// readers from a superseded scan and must not be connectable.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current discovery generation.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a candidate belongs to the current discovery generation.
    pub fn is_current(&self, reader: &DiscoveredReader) -> bool {
        reader.generation() == self.current_generation()
    }

    /// Begin a single discovery run for `class` under `generation`.
    ///
    /// The run's `Started` event is emitted before the transport is invoked,
    /// so it always precedes any result the scan produces.
    pub fn discover(&self, class: DeviceClass, simulated: bool, generation: u64) -> DiscoveryRun {
        debug!(%class, simulated, generation, "starting discovery run");

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(DiscoverStatus::Started);

        let listener = Arc::new(ChannelDiscoveryListener { tx, generation });
        let token = self.terminal.discover_readers(class, simulated, listener);

        DiscoveryRun {
            class,
            generation,
            rx,
            token,
        }
    }

    /// Connect to a discovered reader with the given configuration.
    ///
    /// Suspends until the single terminal callback fires. Bluetooth
    /// configurations additionally register the passive listener with the
    /// backend, which is how telemetry starts flowing for external readers.
    pub async fn connect(
        &self,
        reader: &DiscoveredReader,
        config: ConnectionConfig,
    ) -> Result<ConnectedReader> {
        debug!(reader = %reader, config = ?config, "issuing connect request");

        let (tx, rx) = oneshot::channel();
        let callback = Box::new(OneshotConnect { tx });

        match config {
            ConnectionConfig::Bluetooth { location_id } => self.terminal.connect_bluetooth(
                reader,
                location_id,
                callback,
                self.listener.clone(),
            ),
            ConnectionConfig::LocalMobile { location_id } => {
                self.terminal
                    .connect_local_mobile(reader, location_id, callback)
            }
        }

        match rx.await {
            Ok(result) => result,
            // The transport dropped the callback without invoking it. Still
            // produce a terminal outcome so the caller is never left waiting.
            Err(_) => Err(TerminalError::sdk("connect ended without a result")),
        }
    }

    /// Disconnect the currently connected reader.
    ///
    /// Always resolves. Returns whether the hardware confirmed the
    /// disconnection; from the subsystem's point of view the reader is no
    /// longer connected either way.
    pub async fn disconnect(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        self.terminal
            .disconnect_reader(Box::new(OneshotDisconnect { tx }));

        match rx.await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                warn!(%error, "hardware reported disconnect failure");
                false
            }
            Err(_) => {
                warn!("disconnect ended without a result");
                false
            }
        }
    }

    /// Take the channel of out-of-band disconnect events.
    ///
    /// The channel can be taken once; the connection coordinator consumes it
    /// for the lifetime of the session.
    pub fn take_unexpected_disconnects(&self) -> Option<mpsc::UnboundedReceiver<TerminalError>> {
        self.disconnect_events
            .lock()
            .expect("disconnect event channel lock poisoned")
            .take()
    }
}

impl std::fmt::Debug for ReaderEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderEventSource")
            .field("generation", &self.current_generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTerminal;
    use crate::types::BatteryStatus;
    use cardlink_core::{LocationId, ReaderModel};

    fn source_with_handle() -> (ReaderEventSource, crate::mock::MockTerminalHandle) {
        let (terminal, handle) = MockTerminal::new();
        (ReaderEventSource::new(AnyTerminal::Mock(terminal)), handle)
    }

    fn bluetooth_reader() -> DiscoveredReader {
        DiscoveredReader::new("CHB204909005823", ReaderModel::Chipper2X)
    }

    #[tokio::test]
    async fn test_discovery_run_orders_started_first() {
        let (source, handle) = source_with_handle();
        handle.discovery_succeeds(DeviceClass::External, vec![vec![bluetooth_reader()]]);

        let generation = source.advance_generation();
        let mut run = source.discover(DeviceClass::External, false, generation);

        assert_eq!(run.recv().await, Some(DiscoverStatus::Started));
        let found = run.recv().await.unwrap();
        assert!(matches!(found, DiscoverStatus::FoundReaders(ref readers) if readers.len() == 1));
        assert_eq!(run.recv().await, Some(DiscoverStatus::Success));
        assert_eq!(run.recv().await, None);
    }

    #[tokio::test]
    async fn test_discovery_stamps_candidate_generation() {
        let (source, handle) = source_with_handle();
        handle.discovery_succeeds(DeviceClass::External, vec![vec![bluetooth_reader()]]);

        let generation = source.advance_generation();
        let mut run = source.discover(DeviceClass::External, false, generation);

        run.recv().await; // Started
        let Some(DiscoverStatus::FoundReaders(readers)) = run.recv().await else {
            panic!("expected FoundReaders");
        };
        assert_eq!(readers[0].generation(), generation);
        assert!(source.is_current(&readers[0]));

        // A newer generation supersedes the candidate.
        source.advance_generation();
        assert!(!source.is_current(&readers[0]));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_terminal() {
        let (source, handle) = source_with_handle();
        handle.discovery_fails(DeviceClass::BuiltIn, TerminalError::timeout(5000));

        let generation = source.advance_generation();
        let mut run = source.discover(DeviceClass::BuiltIn, true, generation);

        assert_eq!(run.recv().await, Some(DiscoverStatus::Started));
        assert_eq!(
            run.recv().await,
            Some(DiscoverStatus::Failure(TerminalError::timeout(5000)))
        );
        assert_eq!(run.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_run_cancels_scan() {
        let (source, handle) = source_with_handle();
        handle.discovery_hangs(DeviceClass::External, vec![]);

        let generation = source.advance_generation();
        let run = source.discover(DeviceClass::External, false, generation);
        drop(run);

        handle.wait_for_discovery_cancelled(DeviceClass::External).await;
    }

    #[tokio::test]
    async fn test_connect_bluetooth_success() {
        let (source, handle) = source_with_handle();
        let connected = ConnectedReader::new("CHB204909005823", ReaderModel::Chipper2X);
        handle.connect_succeeds(connected.clone());

        let location = LocationId::new("loc_1").unwrap();
        let result = source
            .connect(
                &bluetooth_reader(),
                ConnectionConfig::Bluetooth {
                    location_id: location,
                },
            )
            .await;

        assert_eq!(result, Ok(connected));
        // Bluetooth connects register the passive listener with the backend.
        assert!(handle.reader_listener_registered());
    }

    #[tokio::test]
    async fn test_connect_failure_carries_sdk_message() {
        let (source, handle) = source_with_handle();
        handle.connect_fails(TerminalError::sdk("timeout"));

        let location = LocationId::new("loc_2").unwrap();
        let reader = DiscoveredReader::new("host-device", ReaderModel::CotsDevice);
        let result = source
            .connect(
                &reader,
                ConnectionConfig::LocalMobile {
                    location_id: location,
                },
            )
            .await;

        assert_eq!(result, Err(TerminalError::sdk("timeout")));
        // Local-mobile connects do not register the passive listener.
        assert!(!handle.reader_listener_registered());
    }

    #[tokio::test]
    async fn test_disconnect_resolves_on_both_outcomes() {
        let (source, handle) = source_with_handle();

        handle.disconnect_succeeds();
        assert!(source.disconnect().await);

        handle.disconnect_fails(TerminalError::disconnected("already gone"));
        assert!(!source.disconnect().await);
    }

    #[tokio::test]
    async fn test_unexpected_disconnects_are_forwarded() {
        let (source, handle) = source_with_handle();
        let mut events = source.take_unexpected_disconnects().unwrap();

        // The channel can only be taken once.
        assert!(source.take_unexpected_disconnects().is_none());

        handle.report_unexpected_disconnect(TerminalError::disconnected("reader powered off"));
        assert_eq!(
            events.recv().await,
            Some(TerminalError::disconnected("reader powered off"))
        );
    }

    #[tokio::test]
    async fn test_telemetry_flows_through_status_listener() {
        let (source, handle) = source_with_handle();
        handle.connect_succeeds(ConnectedReader::new("CHB204909005823", ReaderModel::Chipper2X));

        let location = LocationId::new("loc_1").unwrap();
        source
            .connect(
                &bluetooth_reader(),
                ConnectionConfig::Bluetooth {
                    location_id: location,
                },
            )
            .await
            .unwrap();

        handle.emit_battery_status(BatteryStatus::reading(0.66, true));
        assert_eq!(
            source.status_listener().battery_status_events().borrow().level(),
            Some(0.66)
        );
    }
}
