//! Core domain types for the Cardlink card-reader subsystem.
//!
//! This crate defines the shared vocabulary used across the terminal boundary
//! and the connection layer: device classes, known reader models, the
//! validated location identifier required by the payments platform, and the
//! core error type. It deliberately contains no I/O and no async code so that
//! every other crate in the workspace can depend on it without pulling in a
//! runtime.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
