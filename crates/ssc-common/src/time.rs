//! Monotonic time sources for capture timestamps.
//!
//! Captures are ordered by a monotonic clock rather than wall time: an
//! adjusted wall clock can step backwards and reorder events.

use nix::time::{clock_gettime, ClockId};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of monotonic nanosecond timestamps.
///
/// Implementations are read from the capture path, so `now_ns` must not
/// block or allocate.
pub trait MonotonicClock: Send + Sync {
    /// Nanoseconds since an arbitrary fixed epoch.
    fn now_ns(&self) -> i64;
}

/// `CLOCK_MONOTONIC` of the running kernel.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    _private: (),
}

impl SystemClock {
    /// Probe the clock once so later reads cannot fail.
    ///
    /// # Errors
    ///
    /// Returns the OS error if `CLOCK_MONOTONIC` is not available.
    pub fn new() -> std::io::Result<Self> {
        clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(std::io::Error::from)?;
        Ok(Self { _private: () })
    }
}

impl MonotonicClock for SystemClock {
    #[allow(clippy::useless_conversion)] // time_t/c_long width is platform dependent
    fn now_ns(&self) -> i64 {
        clock_gettime(ClockId::CLOCK_MONOTONIC).map_or(0, |ts| {
            i64::from(ts.tv_sec())
                .saturating_mul(1_000_000_000)
                .saturating_add(i64::from(ts.tv_nsec()))
        })
    }
}

/// Clock that only moves when told to.
///
/// Used by the simulated hardware and by tests that need exact timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ns: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start_ns`.
    #[must_use]
    pub fn new(start_ns: i64) -> Self {
        Self {
            now_ns: AtomicI64::new(start_ns),
        }
    }

    /// Jump to an absolute reading.
    pub fn set(&self, now_ns: i64) {
        self.now_ns.store(now_ns, Ordering::Release);
    }

    /// Move forward by `delta_ns` and return the new reading.
    pub fn advance(&self, delta_ns: i64) -> i64 {
        self.now_ns.fetch_add(delta_ns, Ordering::AcqRel) + delta_ns
    }
}

impl MonotonicClock for ManualClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::Acquire)
    }
}
