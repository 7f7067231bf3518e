//! Mock terminal implementation for testing and development.
//!
//! This module provides a simulated terminal SDK that can be controlled
//! programmatically for testing without physical reader hardware. Following
//! the mock-plus-handle convention of this workspace, construction returns a
//! pair: the [`MockTerminal`] is handed to the event source as the backend,
//! and the [`MockTerminalHandle`] stays with the test to script discovery
//! runs, queue connect/disconnect outcomes, and fire telemetry callbacks.
//!
//! # Examples
//!
//! ```
//! use cardlink_core::{DeviceClass, ReaderModel};
//! use cardlink_terminal::mock::MockTerminal;
//! use cardlink_terminal::source::ReaderEventSource;
//! use cardlink_terminal::transport::AnyTerminal;
//! use cardlink_terminal::types::DiscoveredReader;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (terminal, handle) = MockTerminal::new();
//!     let source = ReaderEventSource::new(AnyTerminal::Mock(terminal));
//!
//!     let reader = DiscoveredReader::new("CHB204909005823", ReaderModel::Chipper2X);
//!     handle.discovery_succeeds(DeviceClass::External, vec![vec![reader]]);
//!
//!     let generation = source.advance_generation();
//!     let mut run = source.discover(DeviceClass::External, false, generation);
//!     while let Some(status) = run.recv().await {
//!         println!("discovery: {:?}", status);
//!     }
//! }
//! ```

use crate::error::TerminalError;
use crate::transport::{
    ConnectCallback, DisconnectCallback, DiscoveryListener, ReaderEventListener, TerminalListener,
    TerminalTransport,
};
use crate::types::{
    BatteryStatus, ConnectedReader, DiscoveredReader, ReaderDisplayMessage,
    SoftwareUpdateAvailability, SoftwareUpdateStatus,
};
use cardlink_core::{DeviceClass, LocationId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Which connect entry point a request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectKind {
    /// `connect_bluetooth` (external readers).
    Bluetooth,

    /// `connect_local_mobile` (built-in readers).
    LocalMobile,
}

/// A recorded connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Serial of the reader the request targeted.
    pub serial: String,

    /// Location the connection was bound to.
    pub location_id: String,

    /// Entry point the request came through.
    pub kind: ConnectKind,
}

/// A recorded discovery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// Device class the scan was started for.
    pub class: DeviceClass,

    /// Whether simulated readers were requested.
    pub simulated: bool,
}

/// Scripted lifecycle of one discovery run.
#[derive(Debug, Clone)]
struct DiscoveryScript {
    /// Snapshots delivered via `on_update`, in order.
    updates: Vec<Vec<DiscoveredReader>>,

    /// Terminal outcome; `None` keeps the scan running until cancelled.
    outcome: Option<Result<(), TerminalError>>,
}

/// Scripted outcome of one connect request.
enum ConnectOutcome {
    Success(ConnectedReader),
    Failure(TerminalError),
    /// Keep the request in flight: the callback is parked and never invoked,
    /// simulating a handshake that has not produced a result yet.
    Hold,
}

#[derive(Default)]
struct MockState {
    discovery_scripts: HashMap<DeviceClass, VecDeque<DiscoveryScript>>,
    discovery_requests: Vec<DiscoveryRequest>,
    cancelled_discoveries: HashSet<DeviceClass>,
    connect_outcomes: VecDeque<ConnectOutcome>,
    connect_requests: Vec<ConnectRequest>,
    held_connects: Vec<Box<dyn ConnectCallback>>,
    disconnect_outcomes: VecDeque<Result<(), TerminalError>>,
    reader_listener: Option<Arc<dyn ReaderEventListener>>,
    terminal_listener: Option<Arc<dyn TerminalListener>>,
}

struct Shared {
    state: Mutex<MockState>,
    cancelled: Notify,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock terminal state lock poisoned")
    }
}

/// Mock terminal SDK backend.
///
/// Discovery scripts are played back on a spawned task, so the mock must be
/// driven from within a tokio runtime. Connect and disconnect callbacks fire
/// synchronously when an outcome is scripted, and are parked when the
/// outcome is [`MockTerminalHandle::hold_next_connect`].
pub struct MockTerminal {
    shared: Arc<Shared>,
}

impl MockTerminal {
    /// Create a new mock terminal.
    ///
    /// Returns a tuple of (MockTerminal, MockTerminalHandle) where the
    /// handle scripts the terminal's behavior.
    pub fn new() -> (Self, MockTerminalHandle) {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            cancelled: Notify::new(),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockTerminalHandle { shared },
        )
    }
}

impl fmt::Debug for MockTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTerminal").finish_non_exhaustive()
    }
}

impl TerminalTransport for MockTerminal {
    fn discover_readers(
        &self,
        class: DeviceClass,
        simulated: bool,
        listener: Arc<dyn DiscoveryListener>,
    ) -> CancellationToken {
        let token = CancellationToken::new();

        let script = {
            let mut state = self.shared.lock();
            state.discovery_requests.push(DiscoveryRequest { class, simulated });
            state
                .discovery_scripts
                .get_mut(&class)
                .and_then(VecDeque::pop_front)
                // Unscripted scans finish immediately without results.
                .unwrap_or(DiscoveryScript {
                    updates: vec![],
                    outcome: Some(Ok(())),
                })
        };

        let shared = Arc::clone(&self.shared);
        let task_token = token.clone();
        tokio::spawn(async move {
            let record_cancelled = |shared: &Shared| {
                shared.lock().cancelled_discoveries.insert(class);
                shared.cancelled.notify_waiters();
            };

            for update in script.updates {
                if task_token.is_cancelled() {
                    record_cancelled(&shared);
                    return;
                }
                listener.on_update(update);
                tokio::task::yield_now().await;
            }

            match script.outcome {
                Some(Ok(())) => listener.on_success(),
                Some(Err(error)) => listener.on_failure(error),
                None => {
                    // Scan keeps running until the caller cancels it.
                    task_token.cancelled().await;
                    record_cancelled(&shared);
                }
            }
        });

        token
    }

    fn connect_bluetooth(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
        reader_listener: Arc<dyn ReaderEventListener>,
    ) {
        let outcome = {
            let mut state = self.shared.lock();
            state.reader_listener = Some(reader_listener);
            state.connect_requests.push(ConnectRequest {
                serial: reader.serial().to_string(),
                location_id: location_id.to_string(),
                kind: ConnectKind::Bluetooth,
            });
            state.connect_outcomes.pop_front()
        };
        self.resolve_connect(outcome, callback);
    }

    fn connect_local_mobile(
        &self,
        reader: &DiscoveredReader,
        location_id: LocationId,
        callback: Box<dyn ConnectCallback>,
    ) {
        let outcome = {
            let mut state = self.shared.lock();
            state.connect_requests.push(ConnectRequest {
                serial: reader.serial().to_string(),
                location_id: location_id.to_string(),
                kind: ConnectKind::LocalMobile,
            });
            state.connect_outcomes.pop_front()
        };
        self.resolve_connect(outcome, callback);
    }

    fn disconnect_reader(&self, callback: Box<dyn DisconnectCallback>) {
        let outcome = self.shared.lock().disconnect_outcomes.pop_front();
        match outcome {
            Some(Ok(())) => callback.on_success(),
            Some(Err(error)) => callback.on_failure(error),
            None => callback.on_failure(TerminalError::sdk("no scripted disconnect outcome")),
        }
    }

    fn set_terminal_listener(&self, listener: Arc<dyn TerminalListener>) {
        self.shared.lock().terminal_listener = Some(listener);
    }
}

impl MockTerminal {
    fn resolve_connect(&self, outcome: Option<ConnectOutcome>, callback: Box<dyn ConnectCallback>) {
        match outcome {
            Some(ConnectOutcome::Success(reader)) => callback.on_success(reader),
            Some(ConnectOutcome::Failure(error)) => callback.on_failure(error),
            Some(ConnectOutcome::Hold) => self.shared.lock().held_connects.push(callback),
            None => callback.on_failure(TerminalError::sdk("no scripted connect outcome")),
        }
    }
}

/// Handle for scripting a mock terminal.
///
/// Clones share the same scripted state.
#[derive(Clone)]
pub struct MockTerminalHandle {
    shared: Arc<Shared>,
}

impl MockTerminalHandle {
    /// Script a discovery run that delivers `updates` then succeeds.
    pub fn discovery_succeeds(&self, class: DeviceClass, updates: Vec<Vec<DiscoveredReader>>) {
        self.push_script(
            class,
            DiscoveryScript {
                updates,
                outcome: Some(Ok(())),
            },
        );
    }

    /// Script a discovery run that delivers no results and fails.
    pub fn discovery_fails(&self, class: DeviceClass, error: TerminalError) {
        self.push_script(
            class,
            DiscoveryScript {
                updates: vec![],
                outcome: Some(Err(error)),
            },
        );
    }

    /// Script a discovery run that delivers `updates` and then keeps
    /// scanning until cancelled.
    pub fn discovery_hangs(&self, class: DeviceClass, updates: Vec<Vec<DiscoveredReader>>) {
        self.push_script(
            class,
            DiscoveryScript {
                updates,
                outcome: None,
            },
        );
    }

    fn push_script(&self, class: DeviceClass, script: DiscoveryScript) {
        self.shared
            .lock()
            .discovery_scripts
            .entry(class)
            .or_default()
            .push_back(script);
    }

    /// Queue a successful outcome for the next connect request.
    pub fn connect_succeeds(&self, reader: ConnectedReader) {
        self.shared
            .lock()
            .connect_outcomes
            .push_back(ConnectOutcome::Success(reader));
    }

    /// Queue a failed outcome for the next connect request.
    pub fn connect_fails(&self, error: TerminalError) {
        self.shared
            .lock()
            .connect_outcomes
            .push_back(ConnectOutcome::Failure(error));
    }

    /// Park the next connect request without a result, simulating a
    /// handshake still in flight.
    pub fn hold_next_connect(&self) {
        self.shared
            .lock()
            .connect_outcomes
            .push_back(ConnectOutcome::Hold);
    }

    /// Queue a successful outcome for the next disconnect request.
    pub fn disconnect_succeeds(&self) {
        self.shared.lock().disconnect_outcomes.push_back(Ok(()));
    }

    /// Queue a failed outcome for the next disconnect request.
    pub fn disconnect_fails(&self, error: TerminalError) {
        self.shared.lock().disconnect_outcomes.push_back(Err(error));
    }

    /// Report an out-of-band reader disconnect through the terminal
    /// listener, if one is registered.
    pub fn report_unexpected_disconnect(&self, error: TerminalError) {
        let listener = self.shared.lock().terminal_listener.clone();
        if let Some(listener) = listener {
            listener.on_unexpected_disconnect(error);
        }
    }

    /// Fire a software update status callback. Returns whether a passive
    /// listener was registered to receive it.
    pub fn emit_update_status(&self, status: SoftwareUpdateStatus) -> bool {
        self.with_reader_listener(|listener| listener.on_update_status(status))
    }

    /// Fire a software update availability callback. Returns whether a
    /// passive listener was registered to receive it.
    pub fn emit_update_availability(&self, availability: SoftwareUpdateAvailability) -> bool {
        self.with_reader_listener(|listener| listener.on_update_availability(availability))
    }

    /// Fire a battery status callback. Returns whether a passive listener
    /// was registered to receive it.
    pub fn emit_battery_status(&self, status: BatteryStatus) -> bool {
        self.with_reader_listener(|listener| listener.on_battery_status(status))
    }

    /// Fire a display message callback. Returns whether a passive listener
    /// was registered to receive it.
    pub fn emit_display_message(&self, message: ReaderDisplayMessage) -> bool {
        self.with_reader_listener(|listener| listener.on_display_message(message))
    }

    fn with_reader_listener(&self, f: impl FnOnce(&dyn ReaderEventListener)) -> bool {
        let listener = self.shared.lock().reader_listener.clone();
        match listener {
            Some(listener) => {
                f(listener.as_ref());
                true
            }
            None => false,
        }
    }

    /// Whether a passive reader listener has been registered by a Bluetooth
    /// connect request.
    pub fn reader_listener_registered(&self) -> bool {
        self.shared.lock().reader_listener.is_some()
    }

    /// All discovery requests seen so far, in order.
    pub fn discovery_requests(&self) -> Vec<DiscoveryRequest> {
        self.shared.lock().discovery_requests.clone()
    }

    /// All connect requests seen so far, in order.
    pub fn connect_requests(&self) -> Vec<ConnectRequest> {
        self.shared.lock().connect_requests.clone()
    }

    /// Whether a discovery run for `class` has been cancelled.
    pub fn discovery_cancelled(&self, class: DeviceClass) -> bool {
        self.shared.lock().cancelled_discoveries.contains(&class)
    }

    /// Wait until a discovery run for `class` has been cancelled.
    pub async fn wait_for_discovery_cancelled(&self, class: DeviceClass) {
        loop {
            let notified = self.shared.cancelled.notified();
            if self.discovery_cancelled(class) {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for MockTerminalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTerminalHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_core::ReaderModel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct RecordingListener {
        tx: mpsc::UnboundedSender<String>,
    }

    impl DiscoveryListener for RecordingListener {
        fn on_update(&self, readers: Vec<DiscoveredReader>) {
            let _ = self.tx.send(format!("update:{}", readers.len()));
        }

        fn on_success(&self) {
            let _ = self.tx.send("success".to_string());
        }

        fn on_failure(&self, error: TerminalError) {
            let _ = self.tx.send(format!("failure:{}", error));
        }
    }

    struct CountingCallback {
        calls: Arc<AtomicUsize>,
        tx: mpsc::UnboundedSender<Result<ConnectedReader, TerminalError>>,
    }

    impl ConnectCallback for CountingCallback {
        fn on_success(self: Box<Self>, reader: ConnectedReader) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.tx.send(Ok(reader));
        }

        fn on_failure(self: Box<Self>, error: TerminalError) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.tx.send(Err(error));
        }
    }

    fn reader() -> DiscoveredReader {
        DiscoveredReader::new("CHB204909005823", ReaderModel::Chipper2X)
    }

    #[tokio::test]
    async fn test_scripted_discovery_plays_back_in_order() {
        let (terminal, handle) = MockTerminal::new();
        handle.discovery_succeeds(DeviceClass::External, vec![vec![reader()], vec![]]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        terminal.discover_readers(
            DeviceClass::External,
            false,
            Arc::new(RecordingListener { tx }),
        );

        assert_eq!(rx.recv().await.unwrap(), "update:1");
        assert_eq!(rx.recv().await.unwrap(), "update:0");
        assert_eq!(rx.recv().await.unwrap(), "success");
    }

    #[tokio::test]
    async fn test_unscripted_discovery_succeeds_empty() {
        let (terminal, handle) = MockTerminal::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        terminal.discover_readers(DeviceClass::BuiltIn, true, Arc::new(RecordingListener { tx }));

        assert_eq!(rx.recv().await.unwrap(), "success");
        assert_eq!(
            handle.discovery_requests(),
            vec![DiscoveryRequest {
                class: DeviceClass::BuiltIn,
                simulated: true
            }]
        );
    }

    #[tokio::test]
    async fn test_hanging_discovery_records_cancellation() {
        let (terminal, handle) = MockTerminal::new();
        handle.discovery_hangs(DeviceClass::External, vec![]);

        let (tx, _rx) = mpsc::unbounded_channel();
        let token = terminal.discover_readers(
            DeviceClass::External,
            false,
            Arc::new(RecordingListener { tx }),
        );

        assert!(!handle.discovery_cancelled(DeviceClass::External));
        token.cancel();
        handle.wait_for_discovery_cancelled(DeviceClass::External).await;
        assert!(handle.discovery_cancelled(DeviceClass::External));
    }

    #[tokio::test]
    async fn test_connect_invokes_exactly_one_callback() {
        let (terminal, handle) = MockTerminal::new();
        handle.connect_fails(TerminalError::sdk("timeout"));

        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        terminal.connect_local_mobile(
            &DiscoveredReader::new("host-device", ReaderModel::CotsDevice),
            LocationId::new("loc_2").unwrap(),
            Box::new(CountingCallback {
                calls: Arc::clone(&calls),
                tx,
            }),
        );

        assert_eq!(rx.recv().await.unwrap(), Err(TerminalError::sdk("timeout")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.connect_requests()[0].kind, ConnectKind::LocalMobile);
        assert_eq!(handle.connect_requests()[0].location_id, "loc_2");
    }

    #[tokio::test]
    async fn test_held_connect_parks_callback() {
        let (terminal, handle) = MockTerminal::new();
        handle.hold_next_connect();

        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        terminal.connect_bluetooth(
            &reader(),
            LocationId::new("loc_1").unwrap(),
            Box::new(CountingCallback {
                calls: Arc::clone(&calls),
                tx,
            }),
            Arc::new(crate::listener::ReaderStatusListener::new()),
        );

        // The callback is parked: no outcome, but the listener registration
        // already happened, as with a real in-flight handshake.
        assert!(rx.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(handle.reader_listener_registered());
    }

    #[tokio::test]
    async fn test_telemetry_requires_registered_listener() {
        let (_terminal, handle) = MockTerminal::new();
        assert!(!handle.emit_battery_status(BatteryStatus::reading(0.5, false)));
    }
}
