//! Metric extraction collaborators.
//!
//! Each collector reads one or more raw counter sources, optionally
//! consults the delta normalizer, and submits zero or more telemetry
//! events. Collectors are grouped into cadence batches by
//! [`build_batches`]; a collector whose paths are not configured is a
//! debug-logged no-op, matching how devices without a given sysfs node
//! simply skip that metric.

pub mod audio;
pub mod battery;
pub mod boot;
pub mod irq;
pub mod mm;
pub mod resume;
pub mod slowio;
pub mod zram;

pub use audio::{CodecFailureCollector, SpeakerImpedanceCollector};
pub use battery::ChargeCyclesCollector;
pub use boot::BootStatsCollector;
pub use irq::LongIrqCollector;
pub use mm::{MemUsageReporter, MemUsageSampler};
pub use resume::ResumeLatencyCollector;
pub use slowio::SlowIoCollector;
pub use zram::ZramStatsCollector;

use crate::config::DaemonConfig;
use crate::sched::Batches;
use ks_common::{EventId, TelemetryEvent, TelemetryValue};

/// Hardware component named by a [`EventId::HardwareFailed`] report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum HardwareType {
    Microphone = 1,
    Codec = 2,
}

/// Severity of a hardware failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FailureCode {
    Complete = 1,
    Degrade = 2,
}

/// Build a hardware-failed event: component type, location index, code.
pub fn hardware_failed(
    hw_type: HardwareType,
    location: i32,
    code: FailureCode,
) -> TelemetryEvent {
    TelemetryEvent::new(
        EventId::HardwareFailed,
        vec![
            TelemetryValue::Int(hw_type as i32),
            TelemetryValue::Int(location),
            TelemetryValue::Int(code as i32),
        ],
    )
}

/// Assemble the cadence batches from the configured paths.
///
/// Batch order is fixed; collectors within a batch are isolated from each
/// other by the scheduler.
pub fn build_batches(config: &DaemonConfig) -> Batches {
    let paths = &config.paths;
    let mm_aggregate = mm::MemUsageAggregate::shared();

    Batches {
        five_min: vec![Box::new(MemUsageSampler::new(
            paths.zram_mm_stat.clone(),
            std::sync::Arc::clone(&mm_aggregate),
        ))],
        hourly: vec![
            Box::new(ZramStatsCollector::new(
                paths.zram_mm_stat.clone(),
                paths.zram_bd_stat.clone(),
            )),
            Box::new(MemUsageReporter::new(mm_aggregate)),
        ],
        daily: vec![
            Box::new(SlowIoCollector::from_config(paths)),
            Box::new(CodecFailureCollector::new(
                paths.codec_state.clone(),
                paths.codec1_state.clone(),
            )),
            Box::new(SpeakerImpedanceCollector::new(
                paths.speaker_impedance.clone(),
            )),
            Box::new(ChargeCyclesCollector::new(paths.cycle_count_bins.clone())),
            Box::new(ResumeLatencyCollector::new(
                paths.resume_latency_metrics.clone(),
            )),
            Box::new(LongIrqCollector::new(
                paths.long_irq_metrics.clone(),
                paths.storm_irq_metrics.clone(),
                paths.irq_stats_reset.clone(),
            )),
        ],
        once: vec![Box::new(BootStatsCollector::new(
            paths.f2fs_mounted_time.clone(),
        ))],
    }
}
