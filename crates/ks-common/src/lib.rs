//! Shared types for kstatsd.
//!
//! This crate holds the pieces both the daemon core and any future
//! tooling need to agree on:
//! - Telemetry event model (`event`)
//! - Error taxonomy with category classification (`error`)

pub mod error;
pub mod event;

pub use error::{Error, ErrorCategory, Result};
pub use event::{EventId, TelemetryEvent, TelemetryValue};
