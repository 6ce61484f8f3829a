// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table of the slowest dispatches seen by the loop.

use std::os::fd::RawFd;
use std::time::Duration;

use super::fd::{Direction, Priority};
use super::key::TaskKey;
use crate::logging::targets;

/// What kind of dispatch a slow event was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Timer,
    Io {
        fd: RawFd,
        direction: Direction,
        priority: Priority,
    },
}

/// One recorded dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowEvent {
    pub duration: Duration,
    pub key: TaskKey,
    pub kind: DispatchKind,
}

impl SlowEvent {
    pub fn callback_name(&self) -> &'static str {
        self.key.name()
    }
}

/// Keeps the `capacity` longest dispatches, longest first.
pub(crate) struct SlowEventTable {
    capacity: usize,
    events: Vec<SlowEvent>,
}

impl SlowEventTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, duration: Duration, key: &TaskKey, kind: DispatchKind) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity
            && self.events.last().is_some_and(|tail| duration <= tail.duration)
        {
            return;
        }
        let pos = self.events.partition_point(|e| e.duration >= duration);
        self.events.insert(
            pos,
            SlowEvent {
                duration,
                key: *key,
                kind,
            },
        );
        self.events.truncate(self.capacity);
    }

    pub fn events(&self) -> &[SlowEvent] {
        &self.events
    }

    pub fn log(&self) {
        log::info!(target: targets::EVENTS, "slowest {} dispatches:", self.events.len());
        for (rank, e) in self.events.iter().enumerate() {
            match e.kind {
                DispatchKind::Timer => log::info!(
                    target: targets::EVENTS,
                    "  {}: {:>10.3} ms  timer {}",
                    rank + 1,
                    e.duration.as_secs_f64() * 1000.0,
                    e.key
                ),
                DispatchKind::Io {
                    fd,
                    direction,
                    priority,
                } => log::info!(
                    target: targets::EVENTS,
                    "  {}: {:>10.3} ms  io {} fd={} {:?} {:?}",
                    rank + 1,
                    e.duration.as_secs_f64() * 1000.0,
                    e.key,
                    fd,
                    direction,
                    priority
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_keeps_slowest_sorted() {
        let mut table = SlowEventTable::new(3);
        for (i, d) in [5, 1, 9, 3, 7, 2].into_iter().enumerate() {
            table.record(ms(d), &TaskKey::new("cb", i as i32, 0), DispatchKind::Timer);
        }
        let kept: Vec<_> = table.events().iter().map(|e| e.duration).collect();
        assert_eq!(kept, vec![ms(9), ms(7), ms(5)]);
        assert_eq!(table.events()[0].callback_name(), "cb");
        assert_eq!(table.events()[0].key.code(), 2);
    }

    #[test]
    fn test_small_entries_fill_free_slots() {
        let mut table = SlowEventTable::new(5);
        table.record(ms(10), &TaskKey::named("a"), DispatchKind::Timer);
        table.record(ms(1), &TaskKey::named("b"), DispatchKind::Timer);
        assert_eq!(table.events().len(), 2);
        assert_eq!(table.events()[1].callback_name(), "b");
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut table = SlowEventTable::new(0);
        table.record(ms(10), &TaskKey::named("a"), DispatchKind::Timer);
        assert!(table.events().is_empty());
    }
}
