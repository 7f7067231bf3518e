//! Connection coordinator.
//!
//! [`ConnectionManager`] owns the authoritative [`ConnectionStatus`], issues
//! connect and disconnect requests to the event source, and reconciles the
//! status with what the hardware reports asynchronously: terminal connect
//! callbacks, disconnect confirmations, and out-of-band disconnects that
//! arrive through the terminal listener instead of the primary callback.
//!
//! # Attempt supervision
//!
//! Every connection attempt gets a uuid and a cancellation token. While the
//! attempt is in flight a stall watcher observes status changes; if the
//! status moves to `NotConnected` while that attempt is still the active one
//! (the hardware abandoned the handshake through a side channel), the
//! watcher resets the passive listener's transient state and terminates.
//! The watcher's token is cancelled as soon as its own attempt reaches a
//! terminal callback-driven state, so a watcher can never outlive its
//! attempt or race a later attempt's watcher.
//!
//! # Caller contract
//!
//! Callers serialize connection attempts: a connect request while already
//! `Connecting` or `Connected` is rejected, never queued. A connect request
//! issued while a disconnect is pending waits for the disconnect's terminal
//! callback (the two operations are serialized internally).

use crate::error::{ConnectionError, Result};
use crate::status::{ConnectionStatus, StatusCell, StatusTransition};
use crate::telemetry::TelemetryRelay;
use cardlink_core::LocationId;
use cardlink_terminal::listener::ReaderStatusListener;
use cardlink_terminal::source::ReaderEventSource;
use cardlink_terminal::transport::ConnectionConfig;
use cardlink_terminal::types::DiscoveredReader;
use cardlink_terminal::TerminalError;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bookkeeping for the connection attempt currently in flight.
struct Attempt {
    id: Uuid,
    watcher: CancellationToken,
}

/// Coordinates reader connections over the event source.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cardlink_connection::manager::ConnectionManager;
/// use cardlink_core::LocationId;
/// use cardlink_terminal::mock::MockTerminal;
/// use cardlink_terminal::source::ReaderEventSource;
/// use cardlink_terminal::transport::AnyTerminal;
/// use cardlink_terminal::types::DiscoveredReader;
/// use cardlink_core::ReaderModel;
///
/// # async fn example() -> cardlink_connection::error::Result<()> {
/// let (terminal, _handle) = MockTerminal::new();
/// let source = Arc::new(ReaderEventSource::new(AnyTerminal::Mock(terminal)));
/// let manager = ConnectionManager::new(source);
///
/// let reader = DiscoveredReader::new("CHB204909005823", ReaderModel::Chipper2X);
/// let location = LocationId::new("loc_1").expect("valid location");
///
/// let mut status = manager.status_events();
/// manager.start_connection(reader, location).await?;
///
/// // The outcome arrives as a status change, driven by the hardware
/// // callback.
/// status.changed().await.ok();
/// println!("status: {}", manager.status());
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    source: Arc<ReaderEventSource>,
    listener: Arc<ReaderStatusListener>,
    status: StatusCell,
    /// Serializes connect and disconnect operations against each other:
    /// a disconnect runs to completion before the next connect proceeds.
    op_lock: tokio::sync::Mutex<()>,
    attempt: Arc<Mutex<Option<Attempt>>>,
    pump: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create the coordinator over an event source.
    ///
    /// Consumes the source's out-of-band disconnect channel: the first
    /// manager constructed for a source receives unexpected-disconnect
    /// events for the lifetime of the session. Must be called within a tokio
    /// runtime; the coordinator spawns its supervision tasks on it.
    pub fn new(source: Arc<ReaderEventSource>) -> Self {
        let listener = source.status_listener();
        let status = StatusCell::new();
        let attempt = Arc::new(Mutex::new(None));

        let pump = source.take_unexpected_disconnects().map(|events| {
            tokio::spawn(run_disconnect_pump(
                events,
                status.clone(),
                Arc::clone(&attempt),
                Arc::clone(&listener),
            ))
        });
        if pump.is_none() {
            warn!("unexpected-disconnect channel already taken; out-of-band disconnects will not be observed");
        }

        Self {
            source,
            listener,
            status,
            op_lock: tokio::sync::Mutex::new(()),
            attempt,
            pump,
        }
    }

    /// Snapshot of the current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.current()
    }

    /// Subscribe to connection status changes.
    pub fn status_events(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Recent status transitions, oldest first.
    pub fn status_history(&self) -> Vec<StatusTransition> {
        self.status.history()
    }

    /// Telemetry relay for the passive reader channels.
    pub fn telemetry(&self) -> TelemetryRelay {
        TelemetryRelay::new(Arc::clone(&self.listener))
    }

    /// Start a connection attempt to a discovered reader.
    ///
    /// Returns as soon as the attempt is in flight; the outcome arrives as a
    /// status change (`Connected` on the success callback, `NotConnected`
    /// with the SDK's message on the failure callback). The connection
    /// configuration is selected by the candidate's device class: built-in
    /// readers use the local-mobile configuration, all others use the
    /// Bluetooth configuration and register the passive telemetry listener.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::AlreadyConnecting` / `AlreadyConnected` if a
    ///   connection is in flight or established (documented precondition;
    ///   requests are not queued)
    /// - `ConnectionError::StaleReader` if the candidate was produced by a
    ///   superseded discovery session
    pub async fn start_connection(
        &self,
        reader: DiscoveredReader,
        location_id: LocationId,
    ) -> Result<()> {
        // Waits for a pending disconnect to reach its terminal callback.
        let _op = self.op_lock.lock().await;

        match self.status.current() {
            ConnectionStatus::Connecting => return Err(ConnectionError::AlreadyConnecting),
            ConnectionStatus::Connected(connected) => {
                return Err(ConnectionError::already_connected(connected.serial()));
            }
            ConnectionStatus::NotConnected { .. } => {}
        }

        if !self.source.is_current(&reader) {
            return Err(ConnectionError::stale_reader(reader.serial()));
        }

        let attempt_id = Uuid::new_v4();
        let watcher_token = CancellationToken::new();

        {
            let mut slot = self.attempt.lock().expect("attempt slot lock poisoned");
            if let Some(previous) = slot.take() {
                // Straggler watcher from an earlier attempt; tear it down
                // before the new attempt starts observing.
                previous.watcher.cancel();
            }
            *slot = Some(Attempt {
                id: attempt_id,
                watcher: watcher_token.clone(),
            });
        }

        // Subscribed before the Connecting transition so the watcher
        // observes every change of this attempt.
        let status_rx = self.status.subscribe();

        info!(%attempt_id, %reader, %location_id, "starting connection attempt");
        if let Err(error) = self.status.transition(ConnectionStatus::Connecting) {
            self.attempt.lock().expect("attempt slot lock poisoned").take();
            return Err(error);
        }

        tokio::spawn(run_stall_watcher(
            attempt_id,
            watcher_token,
            status_rx,
            Arc::clone(&self.listener),
        ));

        let config = ConnectionConfig::for_class(reader.device_class(), location_id);
        tokio::spawn(run_connect_attempt(
            attempt_id,
            reader,
            config,
            Arc::clone(&self.source),
            self.status.clone(),
            Arc::clone(&self.attempt),
            Arc::clone(&self.listener),
        ));

        Ok(())
    }

    /// Disconnect the currently connected reader.
    ///
    /// Runs the asynchronous disconnect to completion; the request is not
    /// cancellable. Returns whether the hardware confirmed the
    /// disconnection. Both outcomes transition the status to `NotConnected`:
    /// an unreachable reader is functionally disconnected.
    pub async fn disconnect_reader(&self) -> bool {
        let _op = self.op_lock.lock().await;

        info!("disconnecting reader");
        let confirmed = self.source.disconnect().await;

        {
            let mut slot = self.attempt.lock().expect("attempt slot lock poisoned");
            // Deactivate any in-flight attempt so a late callback cannot
            // clobber the state of a later attempt.
            *slot = None;
            let _ = self
                .status
                .transition(ConnectionStatus::NotConnected { reason: None });
        }
        self.listener.reset_connection_state();

        confirmed
    }

    /// Clear the passive listener's current display message.
    ///
    /// Administrative operation; idempotent and without effect on the
    /// connection status.
    pub fn reset_display_message(&self) {
        self.listener.reset_display_message();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status.current().name())
            .finish_non_exhaustive()
    }
}

/// Drive one connect request to its single terminal callback and apply the
/// outcome, unless the attempt was deactivated in the meantime.
async fn run_connect_attempt(
    attempt_id: Uuid,
    reader: DiscoveredReader,
    config: ConnectionConfig,
    source: Arc<ReaderEventSource>,
    status: StatusCell,
    attempt: Arc<Mutex<Option<Attempt>>>,
    listener: Arc<ReaderStatusListener>,
) {
    let result = source.connect(&reader, config).await;

    // The slot lock is the coordinator's critical section: terminal
    // callbacks and out-of-band disconnects apply their transitions under
    // it, so they cannot interleave.
    let mut slot = attempt.lock().expect("attempt slot lock poisoned");
    let is_mine = slot.as_ref().is_some_and(|current| current.id == attempt_id);
    if !is_mine {
        debug!(%attempt_id, "connection attempt superseded; discarding result");
        return;
    }
    let watcher = slot.take().map(|current| current.watcher);

    match result {
        Ok(connected) => {
            info!(%attempt_id, reader = %connected, "reader connected");
            let _ = status.transition(ConnectionStatus::Connected(connected));
        }
        Err(error) => {
            warn!(%attempt_id, %error, "connection attempt failed");
            let _ = status.transition(ConnectionStatus::NotConnected {
                reason: Some(error.to_string()),
            });
            // A failed Bluetooth handshake can leave partial listener state
            // behind; clear it deterministically rather than relying on the
            // watcher to win the race before it is cancelled.
            listener.reset_connection_state();
        }
    }

    if let Some(watcher) = watcher {
        watcher.cancel();
    }
}

/// Observe status changes on behalf of one connection attempt and clean up
/// if the attempt is abandoned through a side channel.
async fn run_stall_watcher(
    attempt_id: Uuid,
    token: CancellationToken,
    mut status_rx: watch::Receiver<ConnectionStatus>,
    listener: Arc<ReaderStatusListener>,
) {
    debug!(%attempt_id, "stall watcher started");
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(%attempt_id, "stall watcher cancelled");
                return;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let abandoned = status_rx.borrow_and_update().is_not_connected();
                if abandoned {
                    info!(%attempt_id, "connection attempt abandoned; resetting listener state");
                    listener.reset_connection_state();
                    return;
                }
            }
        }
    }
}

/// Apply out-of-band disconnect reports to the connection status.
async fn run_disconnect_pump(
    mut events: mpsc::UnboundedReceiver<TerminalError>,
    status: StatusCell,
    attempt: Arc<Mutex<Option<Attempt>>>,
    listener: Arc<ReaderStatusListener>,
) {
    while let Some(error) = events.recv().await {
        warn!(%error, "hardware reported unexpected disconnect");

        let had_attempt = {
            let mut slot = attempt.lock().expect("attempt slot lock poisoned");
            let had_attempt = slot.take().is_some();
            let _ = status.transition(ConnectionStatus::NotConnected {
                reason: Some(error.to_string()),
            });
            had_attempt
        };

        if !had_attempt {
            // The disconnect hit an established connection (or none at
            // all); there is no stall watcher alive to clean up.
            listener.reset_connection_state();
        }
    }
}
