// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ascending queue of one-shot timers.

use std::collections::VecDeque;

use super::key::TaskKey;
use super::scheduler::TimerCallback;
use crate::time::Timestamp;

pub(crate) struct TimeEvent {
    pub fire_at: Timestamp,
    pub key: TaskKey,
    pub callback: TimerCallback,
}

/// Timers sorted by fire time; at most one entry per key.
#[derive(Default)]
pub(crate) struct TimeQueue {
    events: VecDeque<TimeEvent>,
}

impl TimeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a timer, first dropping any entry with the same key.
    ///
    /// Placed after entries with an equal fire time. Returns whether an
    /// entry was replaced.
    pub fn schedule(&mut self, fire_at: Timestamp, key: TaskKey, callback: TimerCallback) -> bool {
        let replaced = self.cancel(&key);
        let pos = self.events.partition_point(|e| e.fire_at <= fire_at);
        self.events.insert(
            pos,
            TimeEvent {
                fire_at,
                key,
                callback,
            },
        );
        replaced
    }

    pub fn cancel(&mut self, key: &TaskKey) -> bool {
        match self.events.iter().position(|e| e.key == *key) {
            Some(pos) => {
                self.events.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.events.iter().any(|e| e.key == *key)
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.events.front().map(|e| e.fire_at)
    }

    /// Remove the head if it is due at `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<TimeEvent> {
        if self.events.front()?.fire_at <= now {
            self.events.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[cfg(test)]
    pub fn keys(&self) -> Vec<TaskKey> {
        self.events.iter().map(|e| e.key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Scheduler;

    fn noop() -> TimerCallback {
        Box::new(|_: &mut Scheduler, _: &TaskKey| {})
    }

    fn at(ms: i64) -> Timestamp {
        Timestamp::from_micros(ms * 1000)
    }

    #[test]
    fn test_sorted_insert() {
        let mut q = TimeQueue::new();
        let a = TaskKey::new("a", 0, 0);
        let b = TaskKey::new("b", 0, 0);
        let c = TaskKey::new("c", 0, 0);

        q.schedule(at(30), a, noop());
        q.schedule(at(10), b, noop());
        q.schedule(at(20), c, noop());

        assert_eq!(q.keys(), vec![b, c, a]);
        assert_eq!(q.next_deadline(), Some(at(10)));
    }

    #[test]
    fn test_same_key_replaces() {
        let mut q = TimeQueue::new();
        let key = TaskKey::new("flush", 1, 0xbeef);
        assert!(!q.schedule(at(100), key, noop()));
        assert!(q.schedule(at(50), key, noop()));

        assert_eq!(q.len(), 1);
        assert_eq!(q.next_deadline(), Some(at(50)));
    }

    #[test]
    fn test_key_fields_all_count() {
        let mut q = TimeQueue::new();
        q.schedule(at(1), TaskKey::new("t", 1, 0), noop());
        q.schedule(at(1), TaskKey::new("t", 2, 0), noop());
        q.schedule(at(1), TaskKey::new("t", 1, 9), noop());
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_equal_times_keep_insertion_order() {
        let mut q = TimeQueue::new();
        let keys: Vec<_> = (0..4).map(|i| TaskKey::new("tie", i, 0)).collect();
        for k in &keys {
            q.schedule(at(5), *k, noop());
        }
        assert_eq!(q.keys(), keys);
    }

    #[test]
    fn test_pop_due_and_cancel() {
        let mut q = TimeQueue::new();
        let early = TaskKey::named("early");
        let late = TaskKey::named("late");
        q.schedule(at(10), early, noop());
        q.schedule(at(20), late, noop());

        assert!(q.pop_due(at(5)).is_none());
        assert_eq!(q.pop_due(at(10)).map(|e| e.key), Some(early));
        assert!(q.contains(&late));
        assert!(q.cancel(&late));
        assert!(!q.cancel(&late));
        assert_eq!(q.len(), 0);
        assert_eq!(q.next_deadline(), None);
    }

    #[test]
    fn test_random_schedule_stays_sorted() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut q = TimeQueue::new();
        for _ in 0..200 {
            let key = TaskKey::new("r", rng.i32(0..40), 0);
            q.schedule(at(rng.i64(0..1000)), key, noop());
        }
        let times: Vec<_> = q.events.iter().map(|e| e.fire_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(q.len() <= 40);
    }
}
