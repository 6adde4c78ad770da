//! Uevent receive loop with bounded-error recovery.
//!
//! The loop blocks on a datagram receive, decodes, and routes. Isolated
//! failures are tolerated forever; a run of consecutive failures reaching
//! the breaker threshold terminates the loop so a persistently broken
//! event source cannot spin the process.

use super::parser::{FieldTable, UeventParser, UEVENT_MSG_LEN};
use super::router::{HandlerCx, Router};
use ks_common::{Error, Result};
use tracing::{debug, error};

/// Consecutive receive/parse failures tolerated before the loop exits.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Blocking kernel event datagram source.
pub trait DatagramSource: Send {
    /// Receive one datagram into `buf`; returns the byte count.
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Breaker state: healthy until the consecutive-failure threshold trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Healthy,
    Tripped,
}

/// Explicit consecutive-failure circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive: u32,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Record one failure; returns the post-failure state.
    pub fn record_failure(&mut self) -> BreakerState {
        self.consecutive += 1;
        if self.consecutive >= self.threshold {
            BreakerState::Tripped
        } else {
            BreakerState::Healthy
        }
    }

    /// A success resets the run of failures.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}

/// The uevent listener: receive loop + parser + router + breaker.
pub struct Listener {
    parser: UeventParser,
    router: Router,
    breaker: CircuitBreaker,
}

impl Listener {
    pub fn new(parser: UeventParser, router: Router) -> Self {
        Self {
            parser,
            router,
            breaker: CircuitBreaker::new(MAX_CONSECUTIVE_ERRORS),
        }
    }

    pub fn with_breaker(parser: UeventParser, router: Router, breaker: CircuitBreaker) -> Self {
        Self {
            parser,
            router,
            breaker,
        }
    }

    /// Receive and route datagrams until the breaker trips.
    ///
    /// A receive returning zero bytes or a full buffer counts as malformed
    /// framing, like a failed receive. All routing for one datagram
    /// completes before the next receive.
    pub fn run(&mut self, source: &mut dyn DatagramSource, cx: &HandlerCx<'_>) -> Result<()> {
        let mut buf = [0u8; UEVENT_MSG_LEN];
        loop {
            match source.recv(&mut buf) {
                Ok(n) if n > 0 && n < UEVENT_MSG_LEN => {
                    self.breaker.record_success();
                    let table = self.parser.parse(&buf[..n]);
                    debug!(
                        target: "ks_core::uevent",
                        bytes = n,
                        fields = table.len(),
                        "uevent received"
                    );
                    self.router.dispatch(&table, cx);
                }
                Ok(n) => {
                    debug!(target: "ks_core::uevent", bytes = n, "malformed uevent framing");
                    if self.breaker.record_failure() == BreakerState::Tripped {
                        return self.trip();
                    }
                }
                Err(e) => {
                    debug!(target: "ks_core::uevent", error = %e, "uevent receive failed");
                    if self.breaker.record_failure() == BreakerState::Tripped {
                        return self.trip();
                    }
                }
            }
        }
    }

    /// Decode and route a single datagram (test entry point).
    pub fn process_one(&mut self, datagram: &[u8], cx: &HandlerCx<'_>) -> FieldTable {
        let table = self.parser.parse(datagram);
        self.router.dispatch(&table, cx);
        table
    }

    fn trip(&self) -> Result<()> {
        let failures = self.breaker.consecutive_failures();
        error!(
            target: "ks_core::uevent",
            failures,
            "too many consecutive uevent errors; exiting listener"
        );
        Err(Error::StreamExhausted { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::source::SysfsSource;

    enum Step {
        Deliver(Vec<u8>),
        Fail,
    }

    struct ScriptedSource {
        steps: std::vec::IntoIter<Step>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into_iter(),
            }
        }
    }

    impl DatagramSource for ScriptedSource {
        fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.steps.next() {
                Some(Step::Deliver(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Step::Fail) | None => Err(std::io::Error::from(
                    std::io::ErrorKind::ConnectionReset,
                )),
            }
        }
    }

    fn run_listener(steps: Vec<Step>) -> Result<()> {
        let mut listener = Listener::new(UeventParser::default(), Router::new(vec![]));
        let mut source = ScriptedSource::new(steps);
        let sink = RecordingSink::new();
        let fs = SysfsSource::new("/nonexistent");
        listener.run(
            &mut source,
            &HandlerCx {
                sink: &sink,
                source: &fs,
            },
        )
    }

    fn deliver() -> Step {
        Step::Deliver(b"DRIVER=x\0\0".to_vec())
    }

    #[test]
    fn breaker_trips_at_threshold() {
        let steps: Vec<Step> = (0..MAX_CONSECUTIVE_ERRORS).map(|_| Step::Fail).collect();
        let err = run_listener(steps).unwrap_err();
        assert!(matches!(
            err,
            Error::StreamExhausted {
                failures: MAX_CONSECUTIVE_ERRORS
            }
        ));
    }

    #[test]
    fn success_resets_the_failure_run() {
        // N-1 failures, one success, then a fresh full run of failures:
        // the loop survives the first run, proving the reset.
        let mut steps: Vec<Step> = (0..MAX_CONSECUTIVE_ERRORS - 1).map(|_| Step::Fail).collect();
        steps.push(deliver());
        steps.extend((0..MAX_CONSECUTIVE_ERRORS).map(|_| Step::Fail));

        let err = run_listener(steps).unwrap_err();
        assert!(matches!(
            err,
            Error::StreamExhausted {
                failures: MAX_CONSECUTIVE_ERRORS
            }
        ));
    }

    #[test]
    fn oversized_datagram_counts_as_failure() {
        let mut steps: Vec<Step> = vec![Step::Deliver(vec![b'A'; UEVENT_MSG_LEN])];
        steps.extend((0..MAX_CONSECUTIVE_ERRORS - 1).map(|_| Step::Fail));
        assert!(run_listener(steps).is_err());
    }

    #[test]
    fn breaker_state_machine() {
        let mut breaker = CircuitBreaker::new(3);
        assert_eq!(breaker.record_failure(), BreakerState::Healthy);
        assert_eq!(breaker.record_failure(), BreakerState::Healthy);
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.record_failure(), BreakerState::Healthy);
        assert_eq!(breaker.record_failure(), BreakerState::Healthy);
        assert_eq!(breaker.record_failure(), BreakerState::Tripped);
    }
}
