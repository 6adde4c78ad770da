//! kstatsd core library.
//!
//! Harvests device health counters from kernel-exposed text interfaces and
//! from the kernel uevent stream, normalizes them, and forwards telemetry
//! events to a remote sink. The library is organized around two independent
//! loops that share nothing mutable:
//!
//! - The cadence scheduler (`sched`) drives periodic collection batches
//!   (every five minutes, hourly, daily) from one suspend-aware base timer.
//! - The uevent listener (`uevent`) decodes kernel event datagrams and
//!   routes them to independent handlers behind a bounded-error circuit
//!   breaker.
//!
//! Stateful counter normalization lives in `normalize`, backed by the
//! scheduler-owned `store`. The binary entry point is in `main.rs`.

pub mod collect;
pub mod config;
pub mod logging;
pub mod normalize;
pub mod sched;
pub mod sink;
pub mod source;
pub mod store;
pub mod uevent;

pub use ks_common::{Error, ErrorCategory, EventId, Result, TelemetryEvent, TelemetryValue};
