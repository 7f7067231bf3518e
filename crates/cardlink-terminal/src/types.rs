//! Reader handles and event payloads produced at the terminal boundary.
//!
//! This module defines the value types the hardware SDK surface is translated
//! into: discovered and connected reader handles, the per-run discovery
//! status, and the four telemetry payloads delivered through the passive
//! listener. All of them are plain data; the machinery that produces them
//! lives in [`crate::source`] and [`crate::listener`].

use crate::error::TerminalError;
use cardlink_core::{DeviceClass, ReaderModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reader reported by a discovery run.
///
/// This is an immutable snapshot handle: it describes the reader as it looked
/// when the scan saw it and is superseded, never mutated, by the next run's
/// results. The snapshot carries the discovery generation it was produced in
/// so that candidates from a superseded run can be refused at connect time.
///
/// # Examples
///
/// ```
/// use cardlink_core::{DeviceClass, ReaderModel};
/// use cardlink_terminal::DiscoveredReader;
///
/// let reader = DiscoveredReader::new("CHB204909005823", ReaderModel::Chipper2X)
///     .with_label("Front counter")
///     .with_battery_level(0.82);
///
/// assert_eq!(reader.device_class(), DeviceClass::External);
/// assert_eq!(reader.battery_level(), Some(0.82));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredReader {
    serial: String,
    model: ReaderModel,
    label: Option<String>,
    battery_level: Option<f32>,
    firmware_version: Option<String>,

    /// Discovery generation this snapshot belongs to. Stamped by the event
    /// source when the run's results are forwarded; `0` means the reader was
    /// constructed outside any discovery session.
    #[serde(skip)]
    generation: u64,
}

impl DiscoveredReader {
    /// Create a new discovered reader with required fields.
    pub fn new(serial: impl Into<String>, model: ReaderModel) -> Self {
        Self {
            serial: serial.into(),
            model,
            label: None,
            battery_level: None,
            firmware_version: None,
            generation: 0,
        }
    }

    /// Set the human-readable label advertised by the reader.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the battery level reported during the scan (0.0 to 1.0).
    pub fn with_battery_level(mut self, level: f32) -> Self {
        self.battery_level = Some(level);
        self
    }

    /// Set the firmware version reported during the scan.
    pub fn with_firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    /// SDK identity of the reader.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Hardware model of the reader.
    pub fn model(&self) -> &ReaderModel {
        &self.model
    }

    /// Hardware class, derived from the model.
    pub fn device_class(&self) -> DeviceClass {
        self.model.device_class()
    }

    /// Label advertised by the reader, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Battery level at scan time (0.0 to 1.0), if reported.
    pub fn battery_level(&self) -> Option<f32> {
        self.battery_level
    }

    /// Firmware version at scan time, if reported.
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    /// Discovery generation this snapshot was produced in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn stamp_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}

impl fmt::Display for DiscoveredReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.serial, self.model)
    }
}

/// The live reader handle returned by a successful connect callback.
///
/// Carries the same metadata as [`DiscoveredReader`] but with the values the
/// hardware reported at connect time, which are fresher than the scan
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedReader {
    serial: String,
    model: ReaderModel,
    battery_level: Option<f32>,
    firmware_version: Option<String>,
}

impl ConnectedReader {
    /// Create a new connected reader handle.
    pub fn new(serial: impl Into<String>, model: ReaderModel) -> Self {
        Self {
            serial: serial.into(),
            model,
            battery_level: None,
            firmware_version: None,
        }
    }

    /// Set the battery level reported at connect time (0.0 to 1.0).
    pub fn with_battery_level(mut self, level: f32) -> Self {
        self.battery_level = Some(level);
        self
    }

    /// Set the firmware version reported at connect time.
    pub fn with_firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    /// SDK identity of the reader.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Hardware model of the reader.
    pub fn model(&self) -> &ReaderModel {
        &self.model
    }

    /// Hardware class, derived from the model.
    pub fn device_class(&self) -> DeviceClass {
        self.model.device_class()
    }

    /// Battery level at connect time (0.0 to 1.0), if reported.
    pub fn battery_level(&self) -> Option<f32> {
        self.battery_level
    }

    /// Firmware version, if reported.
    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }
}

impl fmt::Display for ConnectedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.serial, self.model)
    }
}

/// Lifecycle of a single discovery run, as translated from SDK callbacks.
///
/// A run is a bounded sequence: exactly one `Started`, zero or more
/// `FoundReaders` snapshots, then exactly one terminal `Success` or
/// `Failure`.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoverStatus {
    /// The scan has started.
    Started,

    /// A fresh snapshot of the readers currently visible to the scan.
    FoundReaders(Vec<DiscoveredReader>),

    /// The run finished normally.
    Success,

    /// The run failed; no further events follow.
    Failure(TerminalError),
}

impl DiscoverStatus {
    /// Whether this event terminates the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DiscoverStatus::Success | DiscoverStatus::Failure(_))
    }
}

/// Progress of a reader software update, reported by the passive listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SoftwareUpdateStatus {
    /// No update activity has been reported yet.
    Unknown,

    /// The reader started installing an update.
    InstallationStarted,

    /// Installation progress (0.0 to 1.0).
    Installing { progress: f32 },

    /// The update installed successfully.
    Success,

    /// The update failed with the SDK's message.
    Failed { message: String },
}

impl Default for SoftwareUpdateStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Whether a software update is available for the connected reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftwareUpdateAvailability {
    /// The reader has not reported its update state yet.
    Unknown,

    /// The reader firmware is current.
    UpToDate,

    /// An update is available for installation.
    Available,
}

impl Default for SoftwareUpdateAvailability {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Battery telemetry for the connected reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    /// No battery reading has been reported yet.
    Unknown,

    /// The most recent reading from the hardware.
    Known {
        /// Charge level, 0.0 (empty) to 1.0 (full).
        level: f32,

        /// Whether the reader is currently charging.
        charging: bool,

        /// When the reading was reported.
        at: DateTime<Utc>,
    },
}

impl BatteryStatus {
    /// Create a reading timestamped with the current time.
    pub fn reading(level: f32, charging: bool) -> Self {
        Self::Known {
            level,
            charging,
            at: Utc::now(),
        }
    }

    /// Charge level of the latest reading, if one was reported.
    pub fn level(&self) -> Option<f32> {
        match self {
            Self::Unknown => None,
            Self::Known { level, .. } => Some(*level),
        }
    }
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Prompt a Bluetooth reader asks the app to show on the merchant's screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ReaderDisplayMessage {
    /// The card read failed; present the card again.
    RetryCard,

    /// Insert the card into the chip slot.
    InsertCard,

    /// Insert or swipe the card.
    InsertOrSwipeCard,

    /// Swipe the card.
    SwipeCard,

    /// Remove the card from the reader.
    RemoveCard,

    /// More than one contactless card was detected.
    MultipleContactlessCardsDetected,

    /// The read method failed; try another one.
    TryAnotherReadMethod,

    /// The card was declined by the reader; try another card.
    TryAnotherCard,

    /// The built-in reader needs attention on the host device.
    CheckMobileDevice,
}

impl fmt::Display for ReaderDisplayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RetryCard => "Retry card",
            Self::InsertCard => "Insert card",
            Self::InsertOrSwipeCard => "Insert or swipe card",
            Self::SwipeCard => "Swipe card",
            Self::RemoveCard => "Remove card",
            Self::MultipleContactlessCardsDetected => "Multiple cards detected",
            Self::TryAnotherReadMethod => "Try another read method",
            Self::TryAnotherCard => "Try another card",
            Self::CheckMobileDevice => "Check mobile device",
        };
        write!(f, "{}", text)
    }
}
