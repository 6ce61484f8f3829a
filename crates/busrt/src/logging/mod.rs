// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Category-aware logging facility.
//!
//! Every component logs through the `log` crate with a target naming its
//! category ([`targets`]). Any `log` backend works; this module also ships a
//! backend that filters by severity *and* by a category bitmask, writing to
//! the console or a file.
//!
//! ## Example
//!
//! ```ignore
//! use busrt::logging::{init_logger, Category, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! let console = Arc::new(ConsoleOutput::new(LogLevel::Debug));
//! init_logger(console, LogLevel::Info, Category::EVENTS | Category::DATA_LINK);
//! ```

pub mod logger;
mod output;

pub use logger::{category_mask, flush_logger, init_logger, set_category_mask, set_level};
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// `log` targets used by the kernel's components.
pub mod targets {
    pub const EVENTS: &str = "busrt::events";
    pub const MEMORY: &str = "busrt::memory";
    pub const DATA_LINK: &str = "busrt::data_link";
    pub const SYSTEM: &str = "busrt::system";
}

/// Bitmask of log categories.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Category(u32);

impl Category {
    pub const NONE: Self = Self(0);
    /// Scheduler: timers, I/O dispatch, slow events
    pub const EVENTS: Self = Self(0x0000_0001);
    /// Arena: type registration, pool accounting, contract violations
    pub const MEMORY: Self = Self(0x0000_0002);
    /// Transport: channel setup, send/receive
    pub const DATA_LINK: Self = Self(0x0000_0004);
    /// Threads, configuration, everything else in the kernel
    pub const SYSTEM: Self = Self(0x0000_0008);
    pub const ALL: Self = Self(0x0000_000f);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && (self.0 & other.0) == other.0
    }

    /// Category owning a `log` target, if it is one of [`targets`].
    pub fn for_target(target: &str) -> Option<Self> {
        match target {
            targets::EVENTS => Some(Self::EVENTS),
            targets::MEMORY => Some(Self::MEMORY),
            targets::DATA_LINK => Some(Self::DATA_LINK),
            targets::SYSTEM => Some(Self::SYSTEM),
            _ => None,
        }
    }

    /// Short label printed in front of each line.
    pub fn label(self) -> &'static str {
        match self {
            Self::EVENTS => "events",
            Self::MEMORY => "memory",
            Self::DATA_LINK => "data_link",
            Self::SYSTEM => "system",
            _ => "mixed",
        }
    }
}

impl BitOr for Category {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Category {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({:#06x})", self.0)
    }
}

/// Function entry trace marker.
///
/// Logs `[ENTER:FNC] function_name` at trace level in the `system` category.
/// Only active when the `trace` feature is enabled.
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        $crate::__log::trace!(target: $crate::logging::targets::SYSTEM, "[ENTER:FNC] {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
