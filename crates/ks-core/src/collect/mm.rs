//! Memory-usage aggregation across cadences.
//!
//! A five-minute sampler accumulates zram memory usage into a shared
//! aggregate; the hourly reporter drains it into one event carrying the
//! min, max and mean over the hour. The aggregate is the only state
//! shared between collectors, so it lives behind its own mutex rather
//! than in the sample store.

use crate::collect::zram::parse_stat_fields;
use crate::sched::{CollectCx, Collector};
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Index of `mem_used_total` within `mm_stat`.
const MEM_USED_TOTAL_FIELD: usize = 2;

/// Running min/max/sum over the sampled interval.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemUsageAggregate {
    min: i64,
    max: i64,
    sum: i64,
    samples: u32,
}

impl MemUsageAggregate {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    fn record(&mut self, mem_used_total: i64) {
        if self.samples == 0 {
            self.min = mem_used_total;
            self.max = mem_used_total;
        } else {
            self.min = self.min.min(mem_used_total);
            self.max = self.max.max(mem_used_total);
        }
        self.sum += mem_used_total;
        self.samples += 1;
    }

    /// Consume the aggregate, leaving it empty for the next interval.
    fn drain(&mut self) -> Option<(i64, i64, i64, u32)> {
        if self.samples == 0 {
            return None;
        }
        let avg = self.sum / i64::from(self.samples);
        let out = (self.min, self.max, avg, self.samples);
        *self = Self::default();
        Some(out)
    }
}

/// Five-minute collector feeding the shared aggregate from `mm_stat`.
pub struct MemUsageSampler {
    mm_stat_path: String,
    aggregate: Arc<Mutex<MemUsageAggregate>>,
}

impl MemUsageSampler {
    pub fn new(mm_stat_path: String, aggregate: Arc<Mutex<MemUsageAggregate>>) -> Self {
        Self {
            mm_stat_path,
            aggregate,
        }
    }
}

impl Collector for MemUsageSampler {
    fn name(&self) -> &'static str {
        "mem_usage_sampler"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let text = cx.source.read_text(&self.mm_stat_path)?;
        let fields = parse_stat_fields(&self.mm_stat_path, &text)?;
        let mem_used_total = *fields.get(MEM_USED_TOTAL_FIELD).ok_or_else(|| {
            Error::malformed(&self.mm_stat_path, "mm_stat too short for mem_used_total")
        })?;
        self.aggregate.lock().unwrap().record(mem_used_total);
        Ok(())
    }
}

/// Hourly collector draining the shared aggregate into one event.
pub struct MemUsageReporter {
    aggregate: Arc<Mutex<MemUsageAggregate>>,
}

impl MemUsageReporter {
    pub fn new(aggregate: Arc<Mutex<MemUsageAggregate>>) -> Self {
        Self { aggregate }
    }
}

impl Collector for MemUsageReporter {
    fn name(&self) -> &'static str {
        "mem_usage_reporter"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some((min, max, avg, samples)) = self.aggregate.lock().unwrap().drain() else {
            debug!("no memory usage samples this interval");
            return Ok(());
        };
        let event = TelemetryEvent::new(
            EventId::MemUsageStats,
            vec![
                TelemetryValue::Long(min),
                TelemetryValue::Long(max),
                TelemetryValue::Long(avg),
                TelemetryValue::Int(samples as i32),
            ],
        );
        cx.sink.submit(&event)
    }
}
