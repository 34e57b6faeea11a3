//! # Clock
//!
//! Wall-clock source for `entered_at`, `last_updated`, `voted_at` and audit
//! timestamps. Injected into the workflow so tests can pin time.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock.
///
/// `now()` returns the pinned instant until `set` or `advance` moves it.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock pinned at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Pin the clock at `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut now) => *now = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        match self.now.lock() {
            Ok(mut now) => *now += delta,
            Err(poisoned) => *poisoned.into_inner() += delta,
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
