// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event scheduler: timers and prioritized I/O readiness in one loop.
//!
//! ```no_run
//! use std::time::Duration;
//! use busrt::events::{Scheduler, TaskKey};
//!
//! let mut sched = Scheduler::new()?;
//! sched.schedule_timer(TaskKey::named("hello"), Duration::from_millis(10), |s, key| {
//!     println!("{} fired", key);
//!     s.stop();
//! });
//! sched.run();
//! # Ok::<(), busrt::events::EventError>(())
//! ```

mod error;
mod fd;
mod key;
mod pacer;
mod poll;
mod scheduler;
mod slow;
mod thread;
mod timer;

pub use error::EventError;
pub use fd::{AttachOutcome, Direction, Priority};
pub use key::TaskKey;
pub use pacer::{ActivityJob, ActivityState, Pacer, PeriodicActivity};
pub use scheduler::{IoCallback, IoEvent, LoopStats, Scheduler, StopHandle, TimerCallback};
pub use slow::{DispatchKind, SlowEvent};
pub use thread::IoThread;
