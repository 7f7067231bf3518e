//! Core constants for the card-reader connection subsystem.
//!
//! This module centralizes the limits and defaults shared by the terminal
//! boundary and the connection layer. Location identifier limits follow the
//! payments platform's location format (`loc_` prefixed, short ASCII ids);
//! the channel capacities match the event volumes a single reader session
//! produces.
//!
//! # Usage
//!
//! ```
//! use cardlink_core::constants::*;
//!
//! fn validate_location_len(len: usize) -> bool {
//!     (MIN_LOCATION_ID_LENGTH..=MAX_LOCATION_ID_LENGTH).contains(&len)
//! }
//! assert!(validate_location_len(5));
//! ```

/// Minimum length of a location identifier in characters.
pub const MIN_LOCATION_ID_LENGTH: usize = 1;

/// Maximum length of a location identifier in characters.
///
/// Platform location ids are short opaque tokens; 64 characters is far above
/// anything the backend issues and exists only to bound memory for values
/// taken from configuration.
pub const MAX_LOCATION_ID_LENGTH: usize = 64;

/// Capacity of the bounded channel carrying merged discovery events.
///
/// A discovery run emits a handful of events (one `Started`, a few
/// `ReadersFound` snapshots, one terminal event); 64 holds several merged
/// runs without ever applying backpressure to the forwarding tasks.
pub const DISCOVERY_CHANNEL_CAPACITY: usize = 64;

/// Maximum number of connection status transitions kept for diagnostics.
///
/// Each record is two small enums plus a timestamp. A connect/disconnect
/// cycle is three transitions, so 50 records cover more than 15 full cycles,
/// which is enough to reconstruct any recent failure sequence from a bug
/// report without unbounded growth.
pub const MAX_STATUS_HISTORY: usize = 50;
