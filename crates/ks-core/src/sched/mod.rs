//! Drift-resistant cadence scheduler.
//!
//! One base timer (the greatest common divisor of all cadences, five
//! minutes) drives three independent cadences: a five-minute aggregation
//! step, an hourly batch, and a daily batch. Each wake adds the timer's
//! expiration count to all three cadence counters; counters at or over
//! threshold fire once and are reduced by modulo so phase is preserved
//! across coalesced wakeups after suspend.
//!
//! Collector failures are contained per item: a failing collector is
//! logged and the rest of its batch still runs. Only timer setup/read
//! failure terminates the loop.

pub mod timer;

pub use timer::{ScriptedTimer, WakeTimer};
#[cfg(target_os = "linux")]
pub use timer::BootTimer;

use crate::sink::TelemetrySink;
use crate::source::RawSource;
use crate::store::SampleStore;
use ks_common::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base timer interval: gcd of all cadences.
pub const BASE_TICK: Duration = Duration::from_secs(5 * 60);

/// Cadence thresholds in base-tick units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadencePlan {
    /// Five-minute aggregation cadence.
    pub fast_ticks: u64,
    /// Hourly batch cadence.
    pub medium_ticks: u64,
    /// Daily batch cadence.
    pub slow_ticks: u64,
}

impl Default for CadencePlan {
    fn default() -> Self {
        let base = BASE_TICK.as_secs();
        Self {
            fast_ticks: 5 * 60 / base,
            medium_ticks: 60 * 60 / base,
            slow_ticks: 24 * 60 * 60 / base,
        }
    }
}

/// Which cadences are due after a wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueCadences {
    pub fast: bool,
    pub medium: bool,
    pub slow: bool,
}

/// Elapsed base ticks since each cadence last fired.
///
/// Invariant: after [`advance`](Self::advance) each accumulator is below
/// twice its threshold; reduction is by modulo, never reset-to-zero, so
/// the remainder carries into the next cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CadenceCounters {
    fast: u64,
    medium: u64,
    slow: u64,
}

impl CadenceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `expirations` elapsed base ticks and report which
    /// cadences are due. A cadence is due at most once per wake no matter
    /// how large the expiration count.
    pub fn advance(&mut self, plan: &CadencePlan, expirations: u64) -> DueCadences {
        self.fast += expirations;
        self.medium += expirations;
        self.slow += expirations;

        let mut due = DueCadences::default();
        if self.fast >= plan.fast_ticks {
            self.fast %= plan.fast_ticks;
            due.fast = true;
        }
        if self.medium >= plan.medium_ticks {
            self.medium %= plan.medium_ticks;
            due.medium = true;
        }
        if self.slow >= plan.slow_ticks {
            self.slow %= plan.slow_ticks;
            due.slow = true;
        }
        due
    }

    /// Leftover ticks toward the medium cadence (test visibility).
    pub fn medium_accrued(&self) -> u64 {
        self.medium
    }
}

/// Everything a collector needs for one run.
pub struct CollectCx<'a> {
    pub sink: &'a dyn TelemetrySink,
    pub source: &'a dyn RawSource,
    pub store: &'a mut SampleStore,
}

/// One metric-extraction routine, invoked as part of a cadence batch.
pub trait Collector: Send {
    fn name(&self) -> &'static str;
    fn run(&mut self, cx: &mut CollectCx<'_>) -> Result<()>;
}

/// Ordered collector batches, one per cadence plus the run-once set.
#[derive(Default)]
pub struct Batches {
    /// Five-minute aggregation step.
    pub five_min: Vec<Box<dyn Collector>>,
    /// Hourly batch.
    pub hourly: Vec<Box<dyn Collector>>,
    /// Daily batch.
    pub daily: Vec<Box<dyn Collector>>,
    /// Run exactly once, during warm-up.
    pub once: Vec<Box<dyn Collector>>,
}

/// The scheduler loop: owns the cadence state, the sample store, and the
/// collector batches.
pub struct Scheduler {
    plan: CadencePlan,
    counters: CadenceCounters,
    batches: Batches,
    store: SampleStore,
}

impl Scheduler {
    pub fn new(plan: CadencePlan, batches: Batches) -> Self {
        Self {
            plan,
            counters: CadenceCounters::new(),
            batches,
            store: SampleStore::new(),
        }
    }

    /// Run the scheduler until the timer fails.
    ///
    /// On entry, before the wait loop, a fixed warm-up sequence runs once
    /// so first-boot telemetry is not delayed by a full cadence period:
    /// the five-minute aggregation step, then the run-once collectors,
    /// then the hourly batch, then the daily batch.
    pub fn run(
        &mut self,
        timer: &mut dyn WakeTimer,
        sink: &dyn TelemetrySink,
        source: &dyn RawSource,
    ) -> Result<()> {
        info!(target: "ks_core::sched", "scheduler starting; running warm-up batches");
        Self::run_batch(&mut self.batches.five_min, sink, source, &mut self.store);
        Self::run_batch(&mut self.batches.once, sink, source, &mut self.store);
        Self::run_batch(&mut self.batches.hourly, sink, source, &mut self.store);
        Self::run_batch(&mut self.batches.daily, sink, source, &mut self.store);

        loop {
            let expirations = timer.wait()?;
            if expirations >= 2 * self.plan.fast_ticks {
                warn!(
                    target: "ks_core::sched",
                    expirations,
                    "coalesced timer wake; device likely suspended or scheduling delayed"
                );
            }

            let due = self.counters.advance(&self.plan, expirations);
            debug!(target: "ks_core::sched", expirations, ?due, "timer wake");

            if due.fast {
                Self::run_batch(&mut self.batches.five_min, sink, source, &mut self.store);
            }
            if due.medium {
                Self::run_batch(&mut self.batches.hourly, sink, source, &mut self.store);
            }
            if due.slow {
                Self::run_batch(&mut self.batches.daily, sink, source, &mut self.store);
            }
        }
    }

    fn run_batch(
        batch: &mut [Box<dyn Collector>],
        sink: &dyn TelemetrySink,
        source: &dyn RawSource,
        store: &mut SampleStore,
    ) {
        for collector in batch {
            let mut cx = CollectCx {
                sink,
                source,
                store: &mut *store,
            };
            if let Err(e) = collector.run(&mut cx) {
                warn!(
                    target: "ks_core::sched",
                    collector = collector.name(),
                    category = %e.category(),
                    error = %e,
                    "collector failed; continuing batch"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::source::SysfsSource;
    use ks_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingCollector {
        name: &'static str,
        runs: Arc<AtomicU32>,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Collector for CountingCollector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&mut self, _cx: &mut CollectCx<'_>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(Error::malformed("/sys/test", "synthetic failure"));
            }
            Ok(())
        }
    }

    fn counting(
        name: &'static str,
        log: &Arc<std::sync::Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> (Box<dyn Collector>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        (
            Box::new(CountingCollector {
                name,
                runs: Arc::clone(&runs),
                log: Arc::clone(log),
                fail,
            }),
            runs,
        )
    }

    #[test]
    fn single_ticks_fire_medium_after_threshold_with_zero_leftover() {
        let plan = CadencePlan {
            fast_ticks: 1,
            medium_ticks: 5,
            slow_ticks: 100,
        };
        let mut counters = CadenceCounters::new();

        let mut fired = 0;
        for _ in 0..5 {
            if counters.advance(&plan, 1).medium {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(counters.medium_accrued(), 0);
    }

    #[test]
    fn coalesced_ticks_preserve_phase_remainder() {
        let plan = CadencePlan {
            fast_ticks: 1,
            medium_ticks: 5,
            slow_ticks: 100,
        };
        let mut counters = CadenceCounters::new();

        assert!(!counters.advance(&plan, 3).medium);
        let due = counters.advance(&plan, 3);
        assert!(due.medium);
        assert_eq!(counters.medium_accrued(), 1);
    }

    #[test]
    fn cadence_fires_at_most_once_per_wake() {
        let plan = CadencePlan {
            fast_ticks: 1,
            medium_ticks: 5,
            slow_ticks: 100,
        };
        let mut counters = CadenceCounters::new();

        // 13 ticks in one wake spans two medium periods; still one firing,
        // with the excess folded into the accumulator by modulo.
        let due = counters.advance(&plan, 13);
        assert!(due.medium);
        assert_eq!(counters.medium_accrued(), 3);
    }

    #[test]
    fn counters_stay_below_twice_threshold_after_reduction() {
        let plan = CadencePlan::default();
        let mut counters = CadenceCounters::new();
        for expirations in [1, 288, 1000, 7, 290] {
            counters.advance(&plan, expirations);
            assert!(counters.fast < 2 * plan.fast_ticks);
            assert!(counters.medium < 2 * plan.medium_ticks);
            assert!(counters.slow < 2 * plan.slow_ticks);
        }
    }

    #[test]
    fn default_plan_matches_five_min_hour_day() {
        let plan = CadencePlan::default();
        assert_eq!(plan.fast_ticks, 1);
        assert_eq!(plan.medium_ticks, 12);
        assert_eq!(plan.slow_ticks, 288);
    }

    #[test]
    fn warm_up_runs_every_batch_once_in_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (fast, fast_runs) = counting("fast", &log, false);
        let (once, once_runs) = counting("once", &log, false);
        let (hourly, hourly_runs) = counting("hourly", &log, false);
        let (daily, daily_runs) = counting("daily", &log, false);

        let batches = Batches {
            five_min: vec![fast],
            hourly: vec![hourly],
            daily: vec![daily],
            once: vec![once],
        };
        let mut scheduler = Scheduler::new(CadencePlan::default(), batches);
        let mut timer = ScriptedTimer::new(vec![]);
        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");

        assert!(scheduler.run(&mut timer, &sink, &source).is_err());
        assert_eq!(fast_runs.load(Ordering::SeqCst), 1);
        assert_eq!(once_runs.load(Ordering::SeqCst), 1);
        assert_eq!(hourly_runs.load(Ordering::SeqCst), 1);
        assert_eq!(daily_runs.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock().unwrap(), vec!["fast", "once", "hourly", "daily"]);
    }

    #[test]
    fn hourly_fires_after_twelve_base_ticks() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (fast, fast_runs) = counting("fast", &log, false);
        let (hourly, hourly_runs) = counting("hourly", &log, false);

        let batches = Batches {
            five_min: vec![fast],
            hourly: vec![hourly],
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(CadencePlan::default(), batches);
        let mut timer = ScriptedTimer::new(vec![1; 12]);
        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");

        assert!(scheduler.run(&mut timer, &sink, &source).is_err());
        // Warm-up plus 12 wakes of the fast cadence.
        assert_eq!(fast_runs.load(Ordering::SeqCst), 13);
        // Warm-up plus exactly one hourly firing.
        assert_eq!(hourly_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_failing_collector_does_not_abort_its_batch() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (bad, bad_runs) = counting("bad", &log, true);
        let (good, good_runs) = counting("good", &log, false);

        let batches = Batches {
            five_min: vec![bad, good],
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(CadencePlan::default(), batches);
        let mut timer = ScriptedTimer::new(vec![1, 1]);
        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");

        assert!(scheduler.run(&mut timer, &sink, &source).is_err());
        assert_eq!(bad_runs.load(Ordering::SeqCst), 3);
        assert_eq!(good_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn suspend_gap_still_fires_due_cadences() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (hourly, hourly_runs) = counting("hourly", &log, false);
        let (daily, daily_runs) = counting("daily", &log, false);

        let batches = Batches {
            hourly: vec![hourly],
            daily: vec![daily],
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(CadencePlan::default(), batches);
        // One giant coalesced wake worth two days of ticks.
        let mut timer = ScriptedTimer::new(vec![2 * 288]);
        let sink = RecordingSink::new();
        let source = SysfsSource::new("/nonexistent");

        assert!(scheduler.run(&mut timer, &sink, &source).is_err());
        // Warm-up plus one firing each; never more than once per wake.
        assert_eq!(hourly_runs.load(Ordering::SeqCst), 2);
        assert_eq!(daily_runs.load(Ordering::SeqCst), 2);
    }
}
