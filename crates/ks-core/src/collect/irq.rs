//! Long-running IRQ and IRQ-storm statistics.

use crate::sched::{CollectCx, Collector};
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{debug, warn};

/// The report always carries this many (num, value) pairs per section.
const TOP_IRQ_PAIRS: usize = 5;
const PAD_IRQ_NUM: i64 = -1;

#[derive(Debug, Default, PartialEq, Eq)]
struct LongIrqReport {
    softirq_count: i64,
    softirq_pairs: Vec<(i64, i64)>,
    irq_count: i64,
    irq_pairs: Vec<(i64, i64)>,
}

type Lines<'a> = std::iter::Peekable<std::str::Lines<'a>>;

fn parse_pair(line: &str) -> Option<(i64, i64)> {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), None) => Some((a.parse().ok()?, b.parse().ok()?)),
        _ => None,
    }
}

fn parse_pairs(lines: &mut Lines<'_>) -> Vec<(i64, i64)> {
    let mut pairs = Vec::new();
    while let Some(pair) = lines.peek().copied().and_then(parse_pair) {
        pairs.push(pair);
        lines.next();
    }
    pairs
}

fn parse_count(path: &str, lines: &mut Lines<'_>, prefix: &str) -> Result<i64> {
    let line = lines
        .next()
        .ok_or_else(|| Error::malformed(path, format!("missing {prefix:?} line")))?;
    let rest = line
        .strip_prefix(prefix)
        .ok_or_else(|| Error::malformed(path, format!("expected {prefix:?}, got {line:?}")))?;
    rest.trim()
        .parse()
        .map_err(|_| Error::malformed(path, format!("bad count in {line:?}")))
}

fn skip_detail_header(lines: &mut Lines<'_>) {
    if let Some(line) = lines.peek() {
        if line.contains("detail") {
            lines.next();
        }
    }
}

fn parse_long_irq(path: &str, text: &str) -> Result<LongIrqReport> {
    let mut lines = text.lines().peekable();
    let softirq_count = parse_count(path, &mut lines, "long SOFTIRQ count:")?;
    skip_detail_header(&mut lines);
    let softirq_pairs = parse_pairs(&mut lines);
    let irq_count = parse_count(path, &mut lines, "long IRQ count:")?;
    skip_detail_header(&mut lines);
    let irq_pairs = parse_pairs(&mut lines);
    Ok(LongIrqReport {
        softirq_count,
        softirq_pairs,
        irq_count,
        irq_pairs,
    })
}

fn parse_storm(path: &str, text: &str) -> Result<Vec<(i64, i64)>> {
    let mut lines = text.lines().peekable();
    skip_detail_header(&mut lines);
    let pairs = parse_pairs(&mut lines);
    if lines.peek().is_some() {
        return Err(Error::malformed(path, "trailing junk after storm pairs"));
    }
    Ok(pairs)
}

/// Append the top pairs to `values`, padded to [`TOP_IRQ_PAIRS`] entries
/// with a `-1` IRQ number and a zero value.
fn push_top_pairs(values: &mut Vec<TelemetryValue>, pairs: &[(i64, i64)]) {
    for i in 0..TOP_IRQ_PAIRS {
        let (num, value) = pairs.get(i).copied().unwrap_or((PAD_IRQ_NUM, 0));
        values.push(TelemetryValue::Long(num));
        values.push(TelemetryValue::Long(value));
    }
}

/// Reports long-SOFTIRQ/IRQ counts with their top-five offender lists
/// plus the storm list, then arms the kernel-side reset by writing `"1"`
/// to the reset node.
pub struct LongIrqCollector {
    irq_path: Option<String>,
    storm_path: Option<String>,
    reset_path: Option<String>,
}

impl LongIrqCollector {
    pub fn new(
        irq_path: Option<String>,
        storm_path: Option<String>,
        reset_path: Option<String>,
    ) -> Self {
        Self {
            irq_path,
            storm_path,
            reset_path,
        }
    }
}

impl Collector for LongIrqCollector {
    fn name(&self) -> &'static str {
        "long_irq"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some(irq_path) = &self.irq_path else {
            debug!("long irq path not configured");
            return Ok(());
        };
        let report = parse_long_irq(irq_path, &cx.source.read_text(irq_path)?)?;

        let storm_pairs = match &self.storm_path {
            Some(path) => parse_storm(path, &cx.source.read_text(path)?)?,
            None => Vec::new(),
        };

        let mut values = Vec::with_capacity(2 + 6 * TOP_IRQ_PAIRS);
        values.push(TelemetryValue::Long(report.softirq_count));
        push_top_pairs(&mut values, &report.softirq_pairs);
        values.push(TelemetryValue::Long(report.irq_count));
        push_top_pairs(&mut values, &report.irq_pairs);
        push_top_pairs(&mut values, &storm_pairs);
        cx.sink
            .submit(&TelemetryEvent::new(EventId::LongIrqStats, values))?;

        // Arm the kernel counters for the next interval. A failed write
        // means the next report repeats this interval, which beats losing
        // the report we already have.
        if let Some(reset_path) = &self.reset_path {
            if let Err(e) = cx.source.write_text(reset_path, "1") {
                warn!(path = %reset_path, error = %e, "failed to reset irq stats");
            }
        }
        Ok(())
    }
}
