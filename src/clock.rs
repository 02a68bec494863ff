//! Time sources for the guard.
//!
//! The rate limiter needs a monotonic instant and the access-hours gate needs
//! the local time of day. Both come from a [`Clock`] so tests can drive time
//! by hand.

use std::time::{Duration, Instant};

use chrono::{Local, NaiveTime};
use parking_lot::Mutex;

/// Source of "now" for the middleware chain.
pub trait Clock: Send + Sync {
    /// Monotonic time used for sliding-window bookkeeping.
    fn now(&self) -> Instant;

    /// Local wall-clock time of day.
    fn time_of_day(&self) -> NaiveTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    time_of_day: Mutex<NaiveTime>,
}

impl ManualClock {
    /// Create a clock at offset zero showing the given time of day.
    pub fn new(time_of_day: NaiveTime) -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            time_of_day: Mutex::new(time_of_day),
        }
    }

    /// Move monotonic time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Jump to an absolute offset from the clock's start.
    pub fn set_elapsed(&self, elapsed: Duration) {
        *self.offset.lock() = elapsed;
    }

    /// Change the reported time of day. Monotonic time is unaffected.
    pub fn set_time_of_day(&self, time_of_day: NaiveTime) {
        *self.time_of_day.lock() = time_of_day;
    }

    /// The instant corresponding to `elapsed` after the clock's start.
    pub fn at(&self, elapsed: Duration) -> Instant {
        self.base + elapsed
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(NaiveTime::MIN)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn time_of_day(&self) -> NaiveTime {
        *self.time_of_day.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));

        clock.set_elapsed(Duration::from_secs(61));
        assert_eq!(clock.now(), clock.at(Duration::from_secs(61)));
    }

    #[test]
    fn test_manual_clock_time_of_day() {
        let clock = ManualClock::new(NaiveTime::from_hms_opt(18, 30, 0).unwrap());
        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(18, 30, 0).unwrap());

        clock.set_time_of_day(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(clock.time_of_day(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
