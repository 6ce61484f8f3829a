// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Task identity shared by timers and I/O registrations.

use std::fmt;

/// Identity of a scheduled task: callback name, integer code, data word.
///
/// Two timers with equal keys are the same timer; scheduling one replaces
/// the other. The name also labels the task in slow-event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    name: &'static str,
    code: i32,
    data: u64,
}

impl TaskKey {
    pub const fn new(name: &'static str, code: i32, data: u64) -> Self {
        Self { name, code, data }
    }

    pub const fn named(name: &'static str) -> Self {
        Self::new(name, 0, 0)
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn code(&self) -> i32 {
        self.code
    }

    pub const fn data(&self) -> u64 {
        self.data
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {:#x})", self.name, self.code, self.data)
    }
}
