// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background thread that runs periodic activities.
//!
//! Each activity carries its own active flag and interval. Toggling them
//! from another thread takes effect at the next check: an active activity
//! is checked once per interval, an inactive one every
//! [`INACTIVE_RECHECK_INTERVAL`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::error::EventError;
use crate::config::INACTIVE_RECHECK_INTERVAL;
use crate::logging::targets;

/// Snapshot of an activity's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    pub active: bool,
    pub interval: Duration,
}

/// A periodic activity run by a [`Pacer`].
#[derive(Debug)]
pub struct PeriodicActivity {
    name: &'static str,
    state: Mutex<ActivityState>,
}

impl PeriodicActivity {
    pub fn new(name: &'static str, interval: Duration, active: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            state: Mutex::new(ActivityState { active, interval }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ActivityState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    pub fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    pub fn set_interval(&self, interval: Duration) {
        self.state.lock().interval = interval;
    }
}

/// Job executed on each run of an activity.
pub type ActivityJob = Box<dyn FnMut() + Send>;

struct Shutdown {
    requested: Mutex<bool>,
    cv: Condvar,
}

struct Slot {
    activity: Arc<PeriodicActivity>,
    job: ActivityJob,
    next: Instant,
}

/// Owns the pacer thread. Stops and joins it on drop.
pub struct Pacer {
    shutdown: Arc<Shutdown>,
    handle: Option<JoinHandle<()>>,
}

impl Pacer {
    pub fn spawn(
        name: &str,
        activities: Vec<(Arc<PeriodicActivity>, ActivityJob)>,
    ) -> Result<Self, EventError> {
        let shutdown = Arc::new(Shutdown {
            requested: Mutex::new(false),
            cv: Condvar::new(),
        });
        let signal = Arc::clone(&shutdown);

        let start = Instant::now();
        let slots: Vec<Slot> = activities
            .into_iter()
            .map(|(activity, job)| {
                let next = start + check_delay(activity.state());
                Slot {
                    activity,
                    job,
                    next,
                }
            })
            .collect();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || pace(&signal, slots))
            .map_err(EventError::Setup)?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        *self.shutdown.requested.lock() = true;
        self.shutdown.cv.notify_all();
        if handle.join().is_err() {
            log::error!(target: targets::SYSTEM, "pacer thread panicked");
        }
    }
}

impl Drop for Pacer {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn check_delay(state: ActivityState) -> Duration {
    if state.active {
        state.interval
    } else {
        INACTIVE_RECHECK_INTERVAL
    }
}

fn pace(shutdown: &Shutdown, mut slots: Vec<Slot>) {
    log::debug!(target: targets::SYSTEM, "pacer started with {} activities", slots.len());
    loop {
        let wake_at = slots
            .iter()
            .map(|s| s.next)
            .min()
            .unwrap_or_else(|| Instant::now() + INACTIVE_RECHECK_INTERVAL);
        {
            let mut requested = shutdown.requested.lock();
            while !*requested && Instant::now() < wake_at {
                shutdown.cv.wait_until(&mut requested, wake_at);
            }
            if *requested {
                break;
            }
        }

        let now = Instant::now();
        for slot in slots.iter_mut().filter(|s| s.next <= now) {
            let state = slot.activity.state();
            if state.active {
                log::trace!(target: targets::SYSTEM, "pacer: running {}", slot.activity.name());
                (slot.job)();
            }
            slot.next = Instant::now() + check_delay(state);
        }
    }
    log::debug!(target: targets::SYSTEM, "pacer stopped");
}
