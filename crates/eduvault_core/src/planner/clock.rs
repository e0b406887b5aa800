//! Wall-clock sources for the session clock.
//!
//! `SystemClock` reads local time; `ManualClock` is a virtual clock for tests
//! and replays.

use chrono::{Duration, Local, NaiveDateTime};
use std::cell::Cell;

/// Source of "now" in local, timezone-free date-time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Virtual clock advanced explicitly, or by a fixed step after every read.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<NaiveDateTime>,
    step: Option<Duration>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(start),
            step: None,
        }
    }

    /// Each `now()` returns the current value, then advances by `step`.
    pub fn stepping(start: NaiveDateTime, step: Duration) -> Self {
        Self {
            now: Cell::new(start),
            step: Some(step),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        let current = self.now.get();
        if let Some(step) = self.step {
            self.now.set(current + step);
        }
        current
    }
}
