//! Slow-I/O event counters, one clear-on-read file per operation kind.

use crate::config::SysfsPaths;
use crate::normalize::read_and_clear;
use crate::sched::{CollectCx, Collector};
use ks_common::{EventId, Result, TelemetryEvent, TelemetryValue};
use tracing::{debug, warn};

/// Storage operation kind reported alongside a slow-I/O count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum IoOperation {
    Read = 1,
    Write = 2,
    Unmap = 3,
    Sync = 4,
}

/// Reads the per-operation slow-I/O counters and resets each by writing
/// `"0"` back. Unconfigured operations are skipped; a failure on one
/// file does not stop the others.
pub struct SlowIoCollector {
    ops: Vec<(IoOperation, String)>,
}

impl SlowIoCollector {
    pub fn new(ops: Vec<(IoOperation, String)>) -> Self {
        Self { ops }
    }

    pub fn from_config(paths: &SysfsPaths) -> Self {
        let mut ops = Vec::new();
        for (op, path) in [
            (IoOperation::Read, &paths.slowio_read_cnt),
            (IoOperation::Write, &paths.slowio_write_cnt),
            (IoOperation::Unmap, &paths.slowio_unmap_cnt),
            (IoOperation::Sync, &paths.slowio_sync_cnt),
        ] {
            if let Some(path) = path {
                ops.push((op, path.clone()));
            }
        }
        Self::new(ops)
    }
}

impl Collector for SlowIoCollector {
    fn name(&self) -> &'static str {
        "slow_io"
    }

    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()> {
        if self.ops.is_empty() {
            debug!("no slow-io paths configured");
            return Ok(());
        }
        for (op, path) in &self.ops {
            match read_and_clear(cx.source, path, "0") {
                Ok(Some(count)) => {
                    let event = TelemetryEvent::new(
                        EventId::SlowIo,
                        vec![
                            TelemetryValue::Int(*op as i32),
                            TelemetryValue::Int(count as i32),
                        ],
                    );
                    cx.sink.submit(&event)?;
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path, error = %e, "failed to read slow-io counter"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::source::fake::MapSource;
    use crate::store::SampleStore;

    fn run(collector: &mut SlowIoCollector, source: &MapSource) -> Vec<TelemetryEvent> {
        let sink = RecordingSink::new();
        let mut store = SampleStore::new();
        let mut cx = CollectCx {
            sink: &sink,
            source,
            store: &mut store,
        };
        collector.run(&mut cx).unwrap();
        sink.take()
    }

    #[test]
    fn reports_and_resets_nonzero_counters() {
        let source = MapSource::new()
            .with("/slowio/read", "3\n")
            .with("/slowio/write", "0\n");
        let mut collector = SlowIoCollector::new(vec![
            (IoOperation::Read, "/slowio/read".into()),
            (IoOperation::Write, "/slowio/write".into()),
        ]);

        let events = run(&mut collector, &source);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, EventId::SlowIo);
        assert_eq!(
            events[0].values,
            vec![
                TelemetryValue::Int(IoOperation::Read as i32),
                TelemetryValue::Int(3)
            ]
        );
        assert_eq!(source.contents("/slowio/read").unwrap(), "0");
        // Zero counters are not reported, but the clear still happens.
        assert_eq!(source.contents("/slowio/write").unwrap(), "0");
    }

    #[test]
    fn one_missing_file_does_not_stop_the_rest() {
        let source = MapSource::new().with("/slowio/sync", "8");
        let mut collector = SlowIoCollector::new(vec![
            (IoOperation::Unmap, "/slowio/absent".into()),
            (IoOperation::Sync, "/slowio/sync".into()),
        ]);

        let events = run(&mut collector, &source);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].values[0], TelemetryValue::Int(IoOperation::Sync as i32));
    }

    #[test]
    fn unconfigured_collector_is_a_no_op() {
        let source = MapSource::new();
        let mut collector = SlowIoCollector::new(Vec::new());
        assert!(run(&mut collector, &source).is_empty());
    }
}
