//! Telemetry sink: the remote service boundary.
//!
//! The sink is treated as remote, fallible, and stateless between calls:
//! each `submit` is an independent request/response, so the scheduler and
//! listener threads need no serialization between their submissions.

use chrono::Utc;
use ks_common::{Result, TelemetryEvent};
use std::sync::Mutex;

/// Remote telemetry sink handle.
pub trait TelemetrySink: Send + Sync {
    /// Submit one event. Failure means the event is dropped; callers must
    /// not retry and must not roll back normalization state.
    fn submit(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Sink that writes events as JSON lines through the logging layer.
///
/// Stands in for the remote aggregation service in deployments where the
/// transport is external (e.g. a log shipper tails the JSONL stream).
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn submit(&self, event: &TelemetryEvent) -> Result<()> {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        tracing::info!(
            target: "ks_core::sink",
            event = %event.id,
            timestamp = %Utc::now().to_rfc3339(),
            %payload,
            "telemetry event"
        );
        Ok(())
    }
}

/// In-memory sink test double; records every submitted event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl TelemetrySink for RecordingSink {
    fn submit(&self, event: &TelemetryEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Sink test double that rejects every event.
#[derive(Debug, Default)]
pub struct RejectingSink;

impl TelemetrySink for RejectingSink {
    fn submit(&self, event: &TelemetryEvent) -> Result<()> {
        Err(ks_common::Error::SinkRejected {
            event: event.id.to_string(),
            reason: "sink unavailable".to_string(),
        })
    }
}
