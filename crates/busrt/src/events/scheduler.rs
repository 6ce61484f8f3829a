// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-threaded dispatch loop unifying timers and I/O readiness.
//!
//! # One turn of the loop
//!
//! 1. Fire every due timer in time order, re-reading the clock after each.
//! 2. Poll the registered handles without blocking; only if nothing is
//!    ready, block until the next timer is due (or the idle timeout).
//! 3. Dispatch all ready high-priority registrations; if none were ready,
//!    all ready medium ones instead. Never both in one turn.
//! 4. While the active threshold is low, dispatch one ready low-priority
//!    registration, rotating through the low queue across turns.
//!
//! Callbacks run to completion, never re-entrantly, and may freely schedule,
//! cancel, attach, detach, toggle registrations or stop the loop.

use std::os::fd::RawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::EventError;
use super::fd::{AttachOutcome, Direction, FdTable, Priority};
use super::key::TaskKey;
use super::poll::{self, ReadySet, WakePipe};
use super::slow::{DispatchKind, SlowEvent, SlowEventTable};
use super::timer::TimeQueue;
use crate::config::SchedulerConfig;
use crate::logging::targets;
use crate::time::{Clock, MonotonicClock, Timestamp};

/// Timer callback. Runs once; reschedule from inside to repeat.
pub type TimerCallback = Box<dyn FnOnce(&mut Scheduler, &TaskKey)>;

/// I/O readiness callback. Runs every turn its handle is ready.
pub type IoCallback = Rc<dyn Fn(&mut Scheduler, &IoEvent)>;

/// Readiness delivered to an [`IoCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoEvent {
    pub fd: RawFd,
    pub direction: Direction,
    pub priority: Priority,
    pub key: TaskKey,
}

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub turns: u64,
    pub timer_dispatches: u64,
    pub io_dispatches: u64,
    pub poll_errors: u64,
}

/// Stops a [`Scheduler`] from any thread, waking it if blocked.
#[derive(Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<UnixStream>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.requested.store(true, Ordering::Release);
        poll::signal(&self.waker);
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("requested", &self.requested.load(Ordering::Relaxed))
            .finish()
    }
}

/// Timer + I/O event loop.
pub struct Scheduler {
    timers: TimeQueue,
    fds: FdTable,
    clock: Box<dyn Clock>,
    idle_timeout: Duration,
    exit: bool,
    round_robin: usize,
    slow: SlowEventTable,
    wake: WakePipe,
    remote_stop: Arc<AtomicBool>,
    stats: LoopStats,
}

impl Scheduler {
    pub fn new() -> Result<Self, EventError> {
        Self::with_config(&SchedulerConfig::default())
    }

    pub fn with_config(config: &SchedulerConfig) -> Result<Self, EventError> {
        Self::with_clock(config, Box::new(MonotonicClock))
    }

    pub fn with_clock(config: &SchedulerConfig, clock: Box<dyn Clock>) -> Result<Self, EventError> {
        let wake = WakePipe::new().map_err(EventError::Setup)?;
        Ok(Self {
            timers: TimeQueue::new(),
            fds: FdTable::new(config.max_fd, config.max_events_per_priority),
            clock,
            idle_timeout: config.idle_timeout,
            exit: false,
            round_robin: 0,
            slow: SlowEventTable::new(config.slow_event_slots),
            wake,
            remote_stop: Arc::new(AtomicBool::new(false)),
            stats: LoopStats::default(),
        })
    }

    /// Current reading of the scheduler's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Block the calling thread for `duration` without dispatching anything.
    ///
    /// Timers that come due meanwhile fire on the next turn.
    pub fn delay(&self, duration: Duration) {
        log::trace!(target: targets::EVENTS, "delay {:?}", duration);
        std::thread::sleep(duration);
    }

    /// Fire `callback` once after `delay`.
    ///
    /// A timer already queued under `key` is replaced. Returns whether one was.
    pub fn schedule_timer<F>(&mut self, key: TaskKey, delay: Duration, callback: F) -> bool
    where
        F: FnOnce(&mut Scheduler, &TaskKey) + 'static,
    {
        let fire_at = self.clock.now() + delay;
        self.schedule_timer_at(key, fire_at, callback)
    }

    /// Fire `callback` once at the absolute time `fire_at`.
    pub fn schedule_timer_at<F>(&mut self, key: TaskKey, fire_at: Timestamp, callback: F) -> bool
    where
        F: FnOnce(&mut Scheduler, &TaskKey) + 'static,
    {
        let replaced = self.timers.schedule(fire_at, key, Box::new(callback));
        log::trace!(
            target: targets::EVENTS,
            "timer {} at {}{}",
            key,
            fire_at,
            if replaced { " (replaced)" } else { "" }
        );
        replaced
    }

    pub fn cancel_timer(&mut self, key: &TaskKey) -> Result<(), EventError> {
        if self.timers.cancel(key) {
            Ok(())
        } else {
            Err(EventError::TimerNotFound)
        }
    }

    pub fn is_timer_queued(&self, key: &TaskKey) -> bool {
        self.timers.contains(key)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Register `callback` for readiness of `fd` in `direction`.
    ///
    /// Re-registering the same handle and direction replaces the callback
    /// and key, moves the registration to `priority`, and reactivates it.
    pub fn attach_io<F>(
        &mut self,
        fd: RawFd,
        direction: Direction,
        priority: Priority,
        key: TaskKey,
        callback: F,
    ) -> Result<AttachOutcome, EventError>
    where
        F: Fn(&mut Scheduler, &IoEvent) + 'static,
    {
        self.fds.attach(fd, direction, priority, key, Rc::new(callback))
    }

    pub fn detach_io(&mut self, fd: RawFd, direction: Direction) -> Result<(), EventError> {
        self.fds.detach(fd, direction)
    }

    /// Include or exclude a registration from polling without removing it.
    pub fn set_io_active(
        &mut self,
        fd: RawFd,
        direction: Direction,
        active: bool,
    ) -> Result<(), EventError> {
        self.fds.set_active(fd, direction, active)
    }

    /// Poll only registrations at or above `threshold`; returns the previous threshold.
    pub fn set_active_threshold(&mut self, threshold: Priority) -> Priority {
        self.fds.set_threshold(threshold)
    }

    pub fn active_threshold(&self) -> Priority {
        self.fds.threshold()
    }

    /// Active registrations in one priority queue.
    pub fn num_active(&self, priority: Priority) -> usize {
        self.fds.num_active(priority)
    }

    /// Whether the next poll will watch `fd` in `direction`.
    pub fn is_polled(&self, fd: RawFd, direction: Direction) -> bool {
        self.fds.mask().contains(&(fd, direction))
    }

    /// Run turns until [`stop`](Self::stop) or a [`StopHandle`] ends the loop.
    ///
    /// The loop can be run again after it returns.
    pub fn run(&mut self) {
        crate::trace_fn!("Scheduler::run");
        self.exit = false;
        log::debug!(target: targets::EVENTS, "entering dispatch loop");
        while !self.exit {
            self.turn();
        }
        log::debug!(
            target: targets::EVENTS,
            "leaving dispatch loop after {} turns",
            self.stats.turns
        );
    }

    /// End the loop once the current dispatch returns.
    pub fn stop(&mut self) {
        self.exit = true;
    }

    pub fn is_stopping(&self) -> bool {
        self.exit
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            requested: Arc::clone(&self.remote_stop),
            waker: self.wake.writer(),
        }
    }

    /// One pass of the dispatch loop. A pending stop cuts it short.
    pub fn turn(&mut self) {
        self.stats.turns += 1;
        if self.take_remote_stop() {
            return;
        }

        let Some(timeout) = self.fire_due_timers() else {
            return;
        };

        let mut ready = self.poll_once(Duration::ZERO);
        if ready.is_empty() && !self.exit && !timeout.is_zero() {
            ready = self.poll_once(timeout);
        }
        if self.exit || ready.is_empty() {
            return;
        }

        self.dispatch_ready(&ready);
    }

    pub fn slow_events(&self) -> &[SlowEvent] {
        self.slow.events()
    }

    pub fn log_slow_events(&self) {
        self.slow.log();
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    fn take_remote_stop(&mut self) -> bool {
        if self.remote_stop.swap(false, Ordering::AcqRel) {
            log::debug!(target: targets::EVENTS, "stop requested from another thread");
            self.exit = true;
        }
        self.exit
    }

    /// Fire due timers; returns the poll timeout, or `None` if a callback stopped the loop.
    fn fire_due_timers(&mut self) -> Option<Duration> {
        let mut now = self.clock.now();
        while let Some(event) = self.timers.pop_due(now) {
            let started = Instant::now();
            (event.callback)(self, &event.key);
            self.stats.timer_dispatches += 1;
            self.slow
                .record(started.elapsed(), &event.key, DispatchKind::Timer);
            if self.exit {
                return None;
            }
            now = self.clock.now();
        }
        Some(match self.timers.next_deadline() {
            Some(at) => now.until(at),
            None => self.idle_timeout,
        })
    }

    fn poll_once(&mut self, timeout: Duration) -> ReadySet {
        match poll::poll_ready(self.fds.mask(), self.wake.fd(), timeout) {
            Ok(outcome) => {
                if outcome.woken {
                    self.wake.drain();
                    self.take_remote_stop();
                }
                outcome.ready
            }
            Err(e) => {
                self.stats.poll_errors += 1;
                log::warn!(target: targets::EVENTS, "poll failed: {}", e);
                ReadySet::new()
            }
        }
    }

    fn dispatch_ready(&mut self, ready: &ReadySet) {
        for priority in [Priority::High, Priority::Medium] {
            if priority < self.fds.threshold() {
                break;
            }
            let candidates: Vec<(RawFd, Direction)> = self
                .fds
                .queue(priority)
                .iter()
                .filter(|e| e.active && ready.contains(&(e.fd, e.direction)))
                .map(|e| (e.fd, e.direction))
                .collect();

            let mut treated = false;
            for (fd, direction) in candidates {
                treated |= self.dispatch_io(fd, direction, priority);
                if self.exit {
                    return;
                }
            }
            if treated {
                break;
            }
        }

        if self.fds.threshold() == Priority::Low {
            self.dispatch_one_low(ready);
        }
    }

    fn dispatch_one_low(&mut self, ready: &ReadySet) {
        let low = self.fds.queue(Priority::Low);
        let n = low.len();
        let pick = (0..n)
            .map(|i| (self.round_robin + i) % n)
            .find(|&j| low[j].active && ready.contains(&(low[j].fd, low[j].direction)))
            .map(|j| (j, low[j].fd, low[j].direction));

        if let Some((j, fd, direction)) = pick {
            self.round_robin = (j + 1) % n;
            self.dispatch_io(fd, direction, Priority::Low);
        }
    }

    /// Run the callback registered for `(fd, direction)` if it is still
    /// attached at `priority` and active.
    fn dispatch_io(&mut self, fd: RawFd, direction: Direction, priority: Priority) -> bool {
        let (callback, key) = match self.fds.find(fd, direction) {
            Some((p, idx)) if p == priority => {
                let entry = &self.fds.queue(p)[idx];
                if !entry.active {
                    return false;
                }
                (Rc::clone(&entry.callback), entry.key)
            }
            _ => return false,
        };

        let event = IoEvent {
            fd,
            direction,
            priority,
            key,
        };
        let started = Instant::now();
        callback(self, &event);
        self.stats.io_dispatches += 1;
        self.slow.record(
            started.elapsed(),
            &key,
            DispatchKind::Io {
                fd,
                direction,
                priority,
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::io::{Read, Write};

    fn quick_scheduler() -> Scheduler {
        Scheduler::with_config(&SchedulerConfig {
            idle_timeout: Duration::from_millis(20),
            ..SchedulerConfig::default()
        })
        .expect("scheduler")
    }

    #[test]
    fn test_timer_fires_and_stop_ends_run() {
        let mut s = quick_scheduler();
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        s.schedule_timer(TaskKey::named("once"), Duration::from_millis(1), move |s, key| {
            assert_eq!(key.name(), "once");
            f.set(f.get() + 1);
            s.stop();
        });

        s.run();
        assert_eq!(fired.get(), 1);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(s.stats().timer_dispatches, 1);
    }

    #[test]
    fn test_timers_fire_in_time_order() {
        let mut s = quick_scheduler();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (code, delay) in [(3, 6), (1, 2), (2, 4)] {
            let order = Rc::clone(&order);
            s.schedule_timer(
                TaskKey::new("seq", code, 0),
                Duration::from_millis(delay),
                move |s, key| {
                    order.borrow_mut().push(key.code());
                    if key.code() == 3 {
                        s.stop();
                    }
                },
            );
        }
        s.run();
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rescheduling_replaces_pending_timer() {
        let mut s = quick_scheduler();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let key = TaskKey::new("flush", 0, 1);

        let h = Rc::clone(&hits);
        assert!(!s.schedule_timer(key, Duration::from_millis(100), move |_, _| {
            h.borrow_mut().push("late")
        }));
        let h = Rc::clone(&hits);
        assert!(s.schedule_timer(key, Duration::from_millis(5), move |s, _| {
            h.borrow_mut().push("early");
            s.stop();
        }));
        assert_eq!(s.pending_timers(), 1);

        s.run();
        assert_eq!(*hits.borrow(), vec!["early"]);
        assert!(!s.is_timer_queued(&key));
    }

    #[test]
    fn test_cancel_timer() {
        let mut s = quick_scheduler();
        let key = TaskKey::named("gone");
        s.schedule_timer(key, Duration::from_secs(60), |_, _| panic!("cancelled timer fired"));
        assert!(s.is_timer_queued(&key));
        s.cancel_timer(&key).expect("cancel");
        assert!(matches!(s.cancel_timer(&key), Err(EventError::TimerNotFound)));
        s.turn();
    }

    #[test]
    fn test_periodic_timer_reschedules_itself() {
        fn tick(s: &mut Scheduler, key: &TaskKey) {
            let remaining = key.data();
            if remaining == 0 {
                s.stop();
                return;
            }
            s.schedule_timer(
                TaskKey::new(key.name(), key.code(), remaining - 1),
                Duration::from_millis(1),
                tick,
            );
        }

        let mut s = quick_scheduler();
        s.schedule_timer(TaskKey::new("tick", 0, 3), Duration::ZERO, tick);
        s.run();
        assert_eq!(s.stats().timer_dispatches, 4);
    }

    #[test]
    fn test_delay_blocks_without_dispatching() {
        let mut s = quick_scheduler();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        s.schedule_timer(TaskKey::named("due"), Duration::ZERO, move |s, _| {
            f.set(true);
            s.stop();
        });

        let started = Instant::now();
        s.delay(Duration::from_millis(15));
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert!(!fired.get());
        assert!(s.is_timer_queued(&TaskKey::named("due")));

        s.run();
        assert!(fired.get());
    }

    #[test]
    fn test_run_is_restartable() {
        let mut s = quick_scheduler();
        s.schedule_timer(TaskKey::named("a"), Duration::ZERO, |s, _| s.stop());
        s.run();
        s.schedule_timer(TaskKey::named("b"), Duration::ZERO, |s, _| s.stop());
        s.run();
        assert_eq!(s.stats().timer_dispatches, 2);
    }

    #[test]
    fn test_io_callback_and_detach_inside_callback() {
        let mut s = quick_scheduler();
        let (mut a, b) = UnixStream::pair().expect("pair");
        a.write_all(b"ping").expect("write");

        let fd = std::os::fd::AsRawFd::as_raw_fd(&b);
        let b = RefCell::new(b);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        s.attach_io(fd, Direction::Read, Priority::Medium, TaskKey::named("sock"), move |s, ev| {
            let mut buf = [0u8; 16];
            let n = b.borrow_mut().read(&mut buf).expect("read");
            sink.borrow_mut().extend_from_slice(&buf[..n]);
            s.detach_io(ev.fd, ev.direction).expect("detach self");
            s.stop();
        })
        .expect("attach");

        s.run();
        assert_eq!(&*seen.borrow(), b"ping");
        assert!(!s.is_polled(fd, Direction::Read));
        assert_eq!(s.num_active(Priority::Medium), 0);
    }

    #[test]
    fn test_inactive_registration_not_dispatched() {
        let mut s = quick_scheduler();
        let (mut a, b) = UnixStream::pair().expect("pair");
        a.write_all(b"x").expect("write");
        let fd = std::os::fd::AsRawFd::as_raw_fd(&b);

        s.attach_io(fd, Direction::Read, Priority::High, TaskKey::named("off"), |_, _| {
            panic!("inactive registration dispatched")
        })
        .expect("attach");
        s.set_io_active(fd, Direction::Read, false).expect("deactivate");
        assert_eq!(s.num_active(Priority::High), 0);

        s.turn();
        assert_eq!(s.stats().io_dispatches, 0);
        drop(b);
    }

    #[test]
    fn test_stop_handle_from_other_thread() {
        let mut s = Scheduler::with_config(&SchedulerConfig {
            idle_timeout: Duration::from_secs(30),
            ..SchedulerConfig::default()
        })
        .expect("scheduler");
        let handle = s.stop_handle();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.stop();
        });

        let started = Instant::now();
        s.run();
        assert!(started.elapsed() < Duration::from_secs(10));
        stopper.join().expect("stopper thread");
    }

    #[test]
    fn test_stop_before_run_is_not_lost() {
        let mut s = quick_scheduler();
        s.stop_handle().stop();
        s.run();
        assert!(s.is_stopping());
    }

    #[test]
    fn test_slow_events_recorded() {
        let mut s = quick_scheduler();
        s.schedule_timer(TaskKey::named("sleepy"), Duration::ZERO, |s, _| {
            std::thread::sleep(Duration::from_millis(5));
            s.stop();
        });
        s.run();
        let slow = s.slow_events();
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].callback_name(), "sleepy");
        assert!(slow[0].duration >= Duration::from_millis(5));
        assert_eq!(slow[0].kind, DispatchKind::Timer);
    }
}
