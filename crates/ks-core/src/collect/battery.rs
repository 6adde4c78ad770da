//! Battery charge-cycle histogram.

use crate::sched::{CollectCx, Collector};
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{debug, warn};

/// Number of histogram buckets the report always carries.
const CYCLE_BUCKETS: usize = 10;

/// Reads the per-voltage-range charge cycle counts and reports them as
/// a fixed ten-bucket histogram, zero-padded when the file has fewer.
pub struct ChargeCyclesCollector {
    path: Option<String>,
}

impl ChargeCyclesCollector {
    pub fn new(path: Option<String>) -> Self {
        Self { path }
    }
}

impl Collector for ChargeCyclesCollector {
    fn name(&self) -> &'static str {
        "charge_cycles"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("charge cycle path not configured");
            return Ok(());
        };
        let text = cx.source.read_text(path)?;
        let mut counts = Vec::with_capacity(CYCLE_BUCKETS);
        for field in text.split_whitespace() {
            let count: i32 = field.parse().map_err(|_| {
                Error::malformed(path, format!("expected cycle count, got {field:?}"))
            })?;
            counts.push(count);
        }
        if counts.is_empty() {
            return Err(Error::malformed(path, "no cycle counts"));
        }
        if counts.len() > CYCLE_BUCKETS {
            warn!(path = %path, buckets = counts.len(), "truncating excess cycle buckets");
            counts.truncate(CYCLE_BUCKETS);
        }
        counts.resize(CYCLE_BUCKETS, 0);

        let event = TelemetryEvent::new(
            EventId::ChargeCycles,
            counts.into_iter().map(TelemetryValue::Int).collect(),
        );
        cx.sink.submit(&event)
    }
}
