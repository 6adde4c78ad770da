//! Run-once boot statistics.

use crate::sched::{CollectCx, Collector};
use crate::source::read_int;
use ks_common::{EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::debug;

/// Reports how long the data filesystem took to mount during this boot.
/// Runs once, right after the settle delay.
pub struct BootStatsCollector {
    mounted_time_path: Option<String>,
}

impl BootStatsCollector {
    pub fn new(mounted_time_path: Option<String>) -> Self {
        Self { mounted_time_path }
    }
}

impl Collector for BootStatsCollector {
    fn name(&self) -> &'static str {
        "boot_stats"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some(path) = &self.mounted_time_path else {
            debug!("mounted time path not configured");
            return Ok(());
        };
        let mounted_time_sec = read_int(cx.source, path)?;
        let event = TelemetryEvent::new(
            EventId::BootStats,
            vec![TelemetryValue::Int(mounted_time_sec as i32)],
        );
        cx.sink.submit(&event)
    }
}
