//! Suspend-aware base timer.
//!
//! On Linux the timer is a `timerfd` on `CLOCK_BOOTTIME`, which keeps
//! advancing across system suspend. Each blocking read returns the number
//! of interval expirations since the previous read; after a suspend gap
//! the kernel coalesces the missed expirations into one wake, which is
//! exactly what the cadence counters expect.

use ks_common::{Error, Result};
use std::time::Duration;

/// Blocking wait on the base timer.
pub trait WakeTimer {
    /// Block until at least one interval expires; return the expiration
    /// count accrued since the last wait (>= 1).
    fn wait(&mut self) -> Result<u64>;
}

/// `timerfd`-backed [`WakeTimer`] on `CLOCK_BOOTTIME`.
#[cfg(target_os = "linux")]
pub struct BootTimer {
    fd: libc::c_int,
}

#[cfg(target_os = "linux")]
impl BootTimer {
    /// Create and arm a periodic timer. Failure here is fatal to the
    /// scheduler subsystem: it cannot proceed without a time source.
    pub fn new(interval: Duration) -> Result<Self> {
        let fd = unsafe { libc::timerfd_create(libc::CLOCK_BOOTTIME, libc::TFD_CLOEXEC) };
        if fd < 0 {
            return Err(Error::TimerSetup(std::io::Error::last_os_error()));
        }

        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: interval.as_secs() as libc::time_t,
                tv_nsec: i64::from(interval.subsec_nanos()) as libc::c_long,
            },
            it_value: libc::timespec {
                tv_sec: interval.as_secs() as libc::time_t,
                tv_nsec: i64::from(interval.subsec_nanos()) as libc::c_long,
            },
        };
        let rc = unsafe { libc::timerfd_settime(fd, 0, &spec, std::ptr::null_mut()) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::TimerSetup(err));
        }

        Ok(Self { fd })
    }
}

#[cfg(target_os = "linux")]
impl WakeTimer for BootTimer {
    fn wait(&mut self) -> Result<u64> {
        let mut expirations: u64 = 0;
        loop {
            let rc = unsafe {
                libc::read(
                    self.fd,
                    (&mut expirations as *mut u64).cast(),
                    std::mem::size_of::<u64>(),
                )
            };
            if rc == std::mem::size_of::<u64>() as isize {
                return Ok(expirations);
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::TimerSetup(err));
        }
    }
}

#[cfg(target_os = "linux")]
impl Drop for BootTimer {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Scripted [`WakeTimer`] for tests: yields each count in order, then a
/// terminal error so `Scheduler::run` returns.
pub struct ScriptedTimer {
    counts: std::vec::IntoIter<u64>,
}

impl ScriptedTimer {
    pub fn new(counts: Vec<u64>) -> Self {
        Self {
            counts: counts.into_iter(),
        }
    }
}

impl WakeTimer for ScriptedTimer {
    fn wait(&mut self) -> Result<u64> {
        self.counts.next().ok_or_else(|| {
            Error::TimerSetup(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "scripted timer exhausted",
            ))
        })
    }
}
