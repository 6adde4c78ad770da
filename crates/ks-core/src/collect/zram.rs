//! Compressed-RAM block device statistics.

use crate::normalize::{normalize, Monotonic, Normalized};
use crate::sched::{CollectCx, Collector};
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::warn;

const HUGE_PAGES_KEY: &str = "zram/huge_pages_since_boot";

/// Parse the whitespace-separated integer fields of a stat file.
pub(crate) fn parse_stat_fields(path: &str, text: &str) -> Result<Vec<i64>> {
    text.split_whitespace()
        .map(|field| {
            field
                .parse::<i64>()
                .map_err(|_| Error::malformed(path, format!("expected integer, got {field:?}")))
        })
        .collect()
}

/// Reports zram `mm_stat` and `bd_stat` gauges.
///
/// `mm_stat` carries at least eight fields; the optional ninth,
/// `huge_pages_since_boot`, is monotone and is reported as an interval
/// delta. The two files are read independently so a kernel without a
/// writeback device still reports `mm_stat`.
pub struct ZramStatsCollector {
    mm_stat_path: String,
    bd_stat_path: String,
}

impl ZramStatsCollector {
    pub fn new(mm_stat_path: String, bd_stat_path: String) -> Self {
        Self {
            mm_stat_path,
            bd_stat_path,
        }
    }

    fn report_mm_stat(&self, cx: &mut CollectCx<'_>) -> Result<()> {
        let text = cx.source.read_text(&self.mm_stat_path)?;
        let fields = parse_stat_fields(&self.mm_stat_path, &text)?;
        if fields.len() < 8 {
            return Err(Error::malformed(
                &self.mm_stat_path,
                format!("expected at least 8 fields, got {}", fields.len()),
            ));
        }

        // Older kernels omit huge_pages_since_boot; treat it as a flat zero.
        let huge_pages_delta = match fields.get(8) {
            Some(&since_boot) => {
                match normalize(cx.store, &HUGE_PAGES_KEY.into(), &[since_boot], Monotonic::Yes) {
                    Normalized::Elided => None,
                    Normalized::Raw(v) | Normalized::Delta(v) => Some(v[0]),
                }
            }
            None => Some(0),
        };
        let Some(huge_pages_delta) = huge_pages_delta else {
            return Ok(());
        };

        let event = TelemetryEvent::new(
            EventId::ZramMmStat,
            vec![
                TelemetryValue::Long(fields[0]), // orig_data_size
                TelemetryValue::Long(fields[1]), // compr_data_size
                TelemetryValue::Long(fields[2]), // mem_used_total
                TelemetryValue::Long(fields[5]), // same_pages
                TelemetryValue::Long(fields[7]), // huge_pages
                TelemetryValue::Long(huge_pages_delta),
            ],
        );
        cx.sink.submit(&event)
    }

    fn report_bd_stat(&self, cx: &mut CollectCx<'_>) -> Result<()> {
        let text = cx.source.read_text(&self.bd_stat_path)?;
        let fields = parse_stat_fields(&self.bd_stat_path, &text)?;
        if fields.len() != 3 {
            return Err(Error::malformed(
                &self.bd_stat_path,
                format!("expected 3 fields, got {}", fields.len()),
            ));
        }
        let event = TelemetryEvent::new(
            EventId::ZramBdStat,
            fields.into_iter().map(TelemetryValue::Long).collect(),
        );
        cx.sink.submit(&event)
    }
}

impl Collector for ZramStatsCollector {
    fn name(&self) -> &'static str {
        "zram_stats"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        if let Err(e) = self.report_mm_stat(cx) {
            warn!(path = %self.mm_stat_path, error = %e, "failed to report mm_stat");
        }
        if let Err(e) = self.report_bd_stat(cx) {
            warn!(path = %self.bd_stat_path, error = %e, "failed to report bd_stat");
        }
        Ok(())
    }
}
