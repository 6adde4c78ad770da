//! Telemetry event model.
//!
//! A [`TelemetryEvent`] is an identifier plus an ordered sequence of typed
//! values. Events are built fresh per report, are immutable once built, and
//! ownership ends at submission to the sink. The core never inspects an
//! event after constructing it; field order is a contract between each
//! collector/handler and the remote aggregation service.

use serde::{Deserialize, Serialize};

/// Stable identifiers for each report kind.
///
/// The numeric discriminants are wire identifiers understood by the
/// telemetry service; they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum EventId {
    HardwareFailed = 100001,
    SlowIo = 100002,
    SpeakerImpedance = 100003,
    ChargeCycles = 100004,
    ZramMmStat = 100005,
    ZramBdStat = 100006,
    ResumeLatency = 100007,
    LongIrqStats = 100008,
    BootStats = 100009,
    MemUsageStats = 100010,
    UsbPortOverheat = 100011,
    PdVidPid = 100012,
    GpuEvent = 100013,
    ThermalAbnormality = 100014,
}

impl EventId {
    /// Wire identifier for this event kind.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventId::HardwareFailed => write!(f, "hardware_failed"),
            EventId::SlowIo => write!(f, "slow_io"),
            EventId::SpeakerImpedance => write!(f, "speaker_impedance"),
            EventId::ChargeCycles => write!(f, "charge_cycles"),
            EventId::ZramMmStat => write!(f, "zram_mm_stat"),
            EventId::ZramBdStat => write!(f, "zram_bd_stat"),
            EventId::ResumeLatency => write!(f, "resume_latency"),
            EventId::LongIrqStats => write!(f, "long_irq_stats"),
            EventId::BootStats => write!(f, "boot_stats"),
            EventId::MemUsageStats => write!(f, "mem_usage_stats"),
            EventId::UsbPortOverheat => write!(f, "usb_port_overheat"),
            EventId::PdVidPid => write!(f, "pd_vid_pid"),
            EventId::GpuEvent => write!(f, "gpu_event"),
            EventId::ThermalAbnormality => write!(f, "thermal_abnormality"),
        }
    }
}

/// One typed field of a telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Text(String),
}

impl From<i32> for TelemetryValue {
    fn from(v: i32) -> Self {
        TelemetryValue::Int(v)
    }
}

impl From<i64> for TelemetryValue {
    fn from(v: i64) -> Self {
        TelemetryValue::Long(v)
    }
}

impl From<f32> for TelemetryValue {
    fn from(v: f32) -> Self {
        TelemetryValue::Float(v)
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        TelemetryValue::Text(v.to_string())
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        TelemetryValue::Text(v)
    }
}

/// A single telemetry report bound for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: EventId,
    pub values: Vec<TelemetryValue>,
}

impl TelemetryEvent {
    pub fn new(id: EventId, values: Vec<TelemetryValue>) -> Self {
        Self { id, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_discriminants_are_stable() {
        assert_eq!(EventId::HardwareFailed.as_u32(), 100001);
        assert_eq!(EventId::ThermalAbnormality.as_u32(), 100014);
    }

    #[test]
    fn values_convert_from_primitives() {
        let event = TelemetryEvent::new(
            EventId::SlowIo,
            vec![0i32.into(), 42i64.into(), "read".into()],
        );
        assert_eq!(event.values.len(), 3);
        assert_eq!(event.values[1], TelemetryValue::Long(42));
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = TelemetryEvent::new(
            EventId::SpeakerImpedance,
            vec![TelemetryValue::Int(0), TelemetryValue::Float(7.9)],
        );
        let json = serde_json::to_string(&event).unwrap();
        let restored: TelemetryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }
}
