//! Reader discovery engine.
//!
//! The engine turns a caller-supplied [`DiscoveryFilter`] into one or two
//! discovery runs on the event source and produces a single unified
//! [`DiscoveryStream`] of public events. Each run is forwarded by its own
//! task into a shared channel, which merges the runs by arrival order: no
//! ordering is guaranteed between the two runs' events, but each run's own
//! events stay internally ordered (`Started` first, then `ReadersFound`
//! snapshots, then one terminal event).
//!
//! ```text
//! ┌─────────────┐       ┌─────────────────┐
//! │ BuiltIn run │──────►│                 │
//! │ (forwarder) │       │  Event Channel  │
//! └─────────────┘       │  (mpsc)         │──────► DiscoveryStream
//! ┌─────────────┐       │                 │
//! │ External run│──────►│                 │
//! │ (forwarder) │       └─────────────────┘
//! └─────────────┘
//! ```
//!
//! Dropping the stream aborts the forwarders, which drops the runs and
//! cancels the underlying hardware scans — abandoning a discovery session
//! never leaves an orphaned scan behind.

use cardlink_core::{DeviceClass, ReaderModel, constants::DISCOVERY_CHANNEL_CAPACITY};
use cardlink_terminal::source::{DiscoveryRun, ReaderEventSource};
use cardlink_terminal::types::{DiscoverStatus, DiscoveredReader};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Which readers a discovery session should look for.
///
/// Configuration only: the filter selects which discovery run(s) start and
/// which candidates `ReadersFound` events keep. Specific filters carry the
/// reader models whose names the candidates are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryFilter {
    /// Discover both device classes, keeping every candidate.
    Unspecified,

    /// Discover only built-in readers matching one of the given models.
    BuiltIn(Vec<ReaderModel>),

    /// Discover only external readers matching one of the given models.
    External(Vec<ReaderModel>),
}

impl DiscoveryFilter {
    /// Device classes this filter starts discovery runs for.
    pub fn classes(&self) -> Vec<DeviceClass> {
        match self {
            Self::Unspecified => vec![DeviceClass::BuiltIn, DeviceClass::External],
            Self::BuiltIn(_) => vec![DeviceClass::BuiltIn],
            Self::External(_) => vec![DeviceClass::External],
        }
    }

    /// Whether a discovered candidate passes this filter.
    pub fn matches(&self, reader: &DiscoveredReader) -> bool {
        match self {
            Self::Unspecified => true,
            Self::BuiltIn(models) | Self::External(models) => models
                .iter()
                .any(|model| model.name() == reader.model().name()),
        }
    }
}

/// Public discovery lifecycle events.
///
/// Per run: exactly one `Started`, zero or more `ReadersFound`, exactly one
/// terminal `Succeeded` or `Failed`. With the `Unspecified` filter two runs
/// are merged into the stream, so each non-terminal event may appear once
/// per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiscoveryEvent {
    /// A discovery run started.
    Started,

    /// A fresh, filtered snapshot of visible readers.
    ReadersFound(Vec<DiscoveredReader>),

    /// A run finished normally.
    Succeeded,

    /// A run failed with the SDK's human-readable message.
    Failed(String),
}

/// The unified, filtered event stream of one discovery session.
///
/// Finite: ends after every run of the session delivered its terminal
/// event. Dropping the stream mid-session cancels the underlying scans.
#[derive(Debug)]
pub struct DiscoveryStream {
    rx: mpsc::Receiver<DiscoveryEvent>,
    // Aborted on drop, which tears the discovery runs (and their hardware
    // scans) down with the forwarder tasks.
    tasks: JoinSet<()>,
}

impl DiscoveryStream {
    /// Receive the next discovery event.
    ///
    /// Returns `None` once the session is over and all events were consumed.
    pub async fn recv(&mut self) -> Option<DiscoveryEvent> {
        self.rx.recv().await
    }
}

impl Stream for DiscoveryStream {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Runs reader discovery sessions over the event source.
///
/// Each call to [`DiscoveryEngine::discover`] is a fresh session with a
/// fresh generation: it supersedes the candidates of every earlier session
/// and cancels any still-active run of the classes it starts, upholding the
/// hardware's one-run-per-class invariant.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cardlink_connection::discovery::{DiscoveryEngine, DiscoveryEvent, DiscoveryFilter};
/// use cardlink_terminal::mock::MockTerminal;
/// use cardlink_terminal::source::ReaderEventSource;
/// use cardlink_terminal::transport::AnyTerminal;
///
/// # async fn example() {
/// let (terminal, _handle) = MockTerminal::new();
/// let source = Arc::new(ReaderEventSource::new(AnyTerminal::Mock(terminal)));
/// let engine = DiscoveryEngine::new(source);
///
/// let mut stream = engine.discover(DiscoveryFilter::Unspecified, false);
/// while let Some(event) = stream.recv().await {
///     if let DiscoveryEvent::ReadersFound(readers) = event {
///         println!("found {} readers", readers.len());
///     }
/// }
/// # }
/// ```
pub struct DiscoveryEngine {
    source: Arc<ReaderEventSource>,
    active_runs: Arc<Mutex<HashMap<DeviceClass, CancellationToken>>>,
}

impl DiscoveryEngine {
    /// Create an engine over the event source.
    pub fn new(source: Arc<ReaderEventSource>) -> Self {
        Self {
            source,
            active_runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a discovery session for the given filter.
    ///
    /// Restartable: a new call begins a fresh session and a fresh stream; it
    /// never resumes or appends to a prior session. A failing run is
    /// reported once via [`DiscoveryEvent::Failed`] and is not retried;
    /// retrying is the caller's decision.
    pub fn discover(&self, filter: DiscoveryFilter, simulated: bool) -> DiscoveryStream {
        let generation = self.source.advance_generation();
        info!(?filter, simulated, generation, "starting discovery session");

        let (tx, rx) = mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        for class in filter.classes() {
            // The hardware supports one run per class: cancel a still-active
            // run before starting its replacement.
            let run = {
                let mut active = self
                    .active_runs
                    .lock()
                    .expect("active discovery runs lock poisoned");
                if let Some(previous) = active.remove(&class) {
                    debug!(%class, "cancelling superseded discovery run");
                    previous.cancel();
                }
                let run = self.source.discover(class, simulated, generation);
                active.insert(class, run.cancel_token());
                run
            };

            tasks.spawn(forward_run(run, filter.clone(), tx.clone()));
        }

        DiscoveryStream { rx, tasks }
    }
}

/// Forward one run's events into the session channel, filtering candidates
/// and mapping each internal status 1:1 onto its public event.
async fn forward_run(
    mut run: DiscoveryRun,
    filter: DiscoveryFilter,
    tx: mpsc::Sender<DiscoveryEvent>,
) {
    while let Some(status) = run.recv().await {
        let terminal = status.is_terminal();
        let event = match status {
            DiscoverStatus::Started => DiscoveryEvent::Started,
            DiscoverStatus::FoundReaders(readers) => DiscoveryEvent::ReadersFound(
                readers
                    .into_iter()
                    .filter(|reader| filter.matches(reader))
                    .collect(),
            ),
            DiscoverStatus::Success => DiscoveryEvent::Succeeded,
            DiscoverStatus::Failure(error) => DiscoveryEvent::Failed(error.to_string()),
        };

        // A closed channel means the consumer dropped the stream; returning
        // drops the run, which cancels the scan.
        if tx.send(event).await.is_err() {
            return;
        }
        if terminal {
            return;
        }
    }

    // The transport tore the run down without a terminal callback. Still end
    // the sequence with a terminal event so the consumer is never left
    // waiting.
    let _ = tx
        .send(DiscoveryEvent::Failed(
            "discovery ended unexpectedly".to_string(),
        ))
        .await;
}
