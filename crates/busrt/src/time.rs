// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Second/microsecond timestamps and the clocks producing them.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const USEC_PER_SEC: i64 = 1_000_000;

/// Point in time (or signed span) as whole seconds plus microseconds.
///
/// Always normalized so that `0 <= usec < 1_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    pub const ZERO: Self = Self { sec: 0, usec: 0 };

    pub fn new(sec: i64, usec: i64) -> Self {
        Self::from_micros(sec.saturating_mul(USEC_PER_SEC).saturating_add(usec))
    }

    pub fn from_micros(micros: i64) -> Self {
        Self {
            sec: micros.div_euclid(USEC_PER_SEC),
            usec: micros.rem_euclid(USEC_PER_SEC),
        }
    }

    pub fn as_micros(self) -> i64 {
        self.sec.saturating_mul(USEC_PER_SEC).saturating_add(self.usec)
    }

    /// Non-negative distance to `later`, zero when `later` is not after `self`.
    pub fn until(self, later: Self) -> Duration {
        let micros = later.as_micros().saturating_sub(self.as_micros());
        Duration::from_micros(u64::try_from(micros).unwrap_or(0))
    }

    pub fn is_negative(self) -> bool {
        self.sec < 0
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self::from_micros(i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
    }
}

impl Add for Timestamp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_micros(self.as_micros().saturating_add(rhs.as_micros()))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        self + Self::from(rhs)
    }
}

impl Sub for Timestamp {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_micros(self.as_micros().saturating_sub(rhs.as_micros()))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sec, self.usec).cmp(&(other.sec, other.usec))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.sec, self.usec)
    }
}

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Monotonic time since the first clock read in this process.
pub fn monotonic_now() -> Timestamp {
    Timestamp::from(process_epoch().elapsed())
}

/// Wall-clock time since the Unix epoch.
pub fn wall_now() -> Timestamp {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => Timestamp::from(d),
        Err(e) => Timestamp::ZERO - Timestamp::from(e.duration()),
    }
}

/// Source of "now" for the scheduler.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// [`monotonic_now`] as a [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        monotonic_now()
    }
}
