//! Suspend-resume latency histogram.
//!
//! The kernel exposes cumulative bucket counts plus a running latency
//! sum; the report carries per-interval bucket deltas and the average
//! latency over the interval, computed as delta-sum over delta-count.

use crate::normalize::{normalize, Monotonic, Normalized, INVALID_DELTA};
use crate::sched::{CollectCx, Collector};
use crate::store::SampleKey;
use ks_common::{Error, EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{debug, info};

const MAX_BUCKETS: usize = 36;
const BUCKETS_KEY: &str = "resume_latency/buckets";
const SUMS_KEY: &str = "resume_latency/sums";

#[derive(Debug, PartialEq, Eq)]
struct ResumeReport {
    max_latency: i64,
    sum_latency: i64,
    counts: Vec<i64>,
}

fn header_value(path: &str, line: Option<&str>, prefix: &str) -> Result<i64> {
    let line = line.ok_or_else(|| Error::malformed(path, format!("missing {prefix:?} line")))?;
    let rest = line
        .strip_prefix(prefix)
        .ok_or_else(|| Error::malformed(path, format!("expected {prefix:?}, got {line:?}")))?;
    rest.trim()
        .parse()
        .map_err(|_| Error::malformed(path, format!("bad value in {line:?}")))
}

fn parse_report(path: &str, text: &str) -> Result<ResumeReport> {
    let mut lines = text.lines();
    let bucket_count = header_value(path, lines.next(), "Resume Latency Bucket Count:")?;
    let max_latency = header_value(path, lines.next(), "Max Resume Latency:")?;
    let sum_latency = header_value(path, lines.next(), "Sum Resume Latency:")?;

    if bucket_count <= 0 || bucket_count as usize > MAX_BUCKETS {
        return Err(Error::malformed(
            path,
            format!("bucket count {bucket_count} out of range"),
        ));
    }

    // Bucket lines read "<low> - <high>ms ====> <count>".
    let mut counts = Vec::with_capacity(bucket_count as usize);
    for line in lines.take(bucket_count as usize) {
        let count = line
            .rsplit_once("====>")
            .and_then(|(_, count)| count.trim().parse().ok())
            .ok_or_else(|| Error::malformed(path, format!("bad bucket line {line:?}")))?;
        counts.push(count);
    }
    if counts.len() != bucket_count as usize {
        return Err(Error::malformed(
            path,
            format!("expected {bucket_count} buckets, got {}", counts.len()),
        ));
    }

    Ok(ResumeReport {
        max_latency,
        sum_latency,
        counts,
    })
}

/// Reports per-interval resume latency bucket deltas and the interval
/// average. A bucket-shape change re-baselines both the buckets and the
/// latency sums, reporting raw counts with the average elided to the
/// invalid sentinel for that interval.
pub struct ResumeLatencyCollector {
    path: Option<String>,
}

impl ResumeLatencyCollector {
    pub fn new(path: Option<String>) -> Self {
        Self { path }
    }
}

impl Collector for ResumeLatencyCollector {
    fn name(&self) -> &'static str {
        "resume_latency"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("resume latency path not configured");
            return Ok(());
        };
        let text = cx.source.read_text(path)?;
        let report = parse_report(path, &text)?;
        let total_count: i64 = report.counts.iter().sum();
        let sums = [report.sum_latency, total_count];

        let buckets_key = SampleKey::from(BUCKETS_KEY);
        let sums_key = SampleKey::from(SUMS_KEY);

        let (avg, buckets) =
            match normalize(cx.store, &buckets_key, &report.counts, Monotonic::Yes) {
                Normalized::Elided => {
                    // Cold start: record the sums baseline, report nothing.
                    normalize(cx.store, &sums_key, &sums, Monotonic::Yes);
                    return Ok(());
                }
                Normalized::Raw(counts) => {
                    cx.store.remove(&sums_key);
                    cx.store.put(sums_key, sums.to_vec());
                    (INVALID_DELTA, counts)
                }
                Normalized::Delta(deltas) => {
                    let avg = match normalize(cx.store, &sums_key, &sums, Monotonic::Yes) {
                        Normalized::Delta(d) if d[0] >= 0 && d[1] > 0 => d[0] / d[1],
                        _ => {
                            info!(path = %path, "resume latency sums regressed, eliding average");
                            INVALID_DELTA
                        }
                    };
                    (avg, deltas)
                }
            };

        let mut values = Vec::with_capacity(buckets.len() + 2);
        values.push(TelemetryValue::Long(report.max_latency));
        values.push(TelemetryValue::Long(avg));
        values.extend(buckets.into_iter().map(TelemetryValue::Long));
        cx.sink
            .submit(&TelemetryEvent::new(EventId::ResumeLatency, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::source::fake::MapSource;
    use crate::store::SampleStore;

    const PATH: &str = "/sys/kernel/metrics/resume_latency";

    fn report(counts: &[i64], max: i64, sum: i64) -> String {
        let mut text = format!(
            "Resume Latency Bucket Count: {}\nMax Resume Latency: {max}\nSum Resume Latency: {sum}\n",
            counts.len()
        );
        for (i, count) in counts.iter().enumerate() {
            text.push_str(&format!("{} - {}ms ====> {count}\n", i * 100, (i + 1) * 100));
        }
        text
    }

    fn run(source: &MapSource, store: &mut SampleStore) -> Vec<TelemetryEvent> {
        let sink = RecordingSink::new();
        let mut cx = CollectCx {
            sink: &sink,
            source,
            store,
        };
        ResumeLatencyCollector::new(Some(PATH.into()))
            .run(&mut cx)
            .unwrap();
        sink.take()
    }

    fn longs(event: &TelemetryEvent) -> Vec<i64> {
        event
            .values
            .iter()
            .map(|v| match v {
                TelemetryValue::Long(n) => *n,
                other => panic!("unexpected value {other:?}"),
            })
            .collect()
    }

    #[test]
    fn parses_well_formed_report() {
        let parsed = parse_report(PATH, &report(&[5, 10, 2], 900, 5000)).unwrap();
        assert_eq!(
            parsed,
            ResumeReport {
                max_latency: 900,
                sum_latency: 5000,
                counts: vec![5, 10, 2],
            }
        );
    }

    #[test]
    fn truncated_bucket_list_is_malformed() {
        let mut text = report(&[5, 10, 2], 900, 5000);
        text = text.lines().take(5).collect::<Vec<_>>().join("\n");
        assert!(parse_report(PATH, &text).is_err());
    }

    #[test]
    fn second_pass_reports_bucket_deltas_and_interval_average() {
        let source = MapSource::new().with(PATH, &report(&[5, 10, 2], 900, 5000));
        let mut store = SampleStore::new();
        assert!(run(&source, &mut store).is_empty());

        // Four new resume events added 600 latency units in total.
        source.set(PATH, &report(&[7, 12, 2], 950, 5600));
        let events = run(&source, &mut store);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, EventId::ResumeLatency);
        assert_eq!(longs(&events[0]), vec![950, 150, 2, 2, 0]);
    }

    #[test]
    fn bucket_shape_change_resets_and_elides_average() {
        let source = MapSource::new().with(PATH, &report(&[5, 10, 2], 900, 5000));
        let mut store = SampleStore::new();
        run(&source, &mut store);

        source.set(PATH, &report(&[1, 2, 3, 4], 400, 800));
        let events = run(&source, &mut store);
        assert_eq!(longs(&events[0]), vec![400, INVALID_DELTA, 1, 2, 3, 4]);

        // The next interval computes a clean average from the new baseline.
        source.set(PATH, &report(&[2, 2, 3, 4], 400, 1000));
        let events = run(&source, &mut store);
        assert_eq!(longs(&events[0]), vec![400, 200, 1, 0, 0, 0]);
    }

    #[test]
    fn regressed_sum_elides_average_but_keeps_bucket_deltas() {
        let source = MapSource::new().with(PATH, &report(&[5, 10], 900, 5000));
        let mut store = SampleStore::new();
        run(&source, &mut store);

        source.set(PATH, &report(&[6, 10], 900, 4000));
        let events = run(&source, &mut store);
        assert_eq!(longs(&events[0]), vec![900, INVALID_DELTA, 1, 0]);
    }
}
