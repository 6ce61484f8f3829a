// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event scheduler errors.

use std::fmt;
use std::io;
use std::os::fd::RawFd;

use super::fd::{Direction, Priority};

/// Errors returned by [`Scheduler`](super::Scheduler) operations.
#[derive(Debug)]
pub enum EventError {
    /// I/O handle outside `0..=max_fd`.
    InvalidHandle(RawFd),
    /// Raw priority value with no [`Priority`].
    InvalidPriority(i32),
    /// Raw direction value with no [`Direction`].
    InvalidDirection(i32),
    /// Priority queue already holds the maximum number of registrations.
    QueueFull { priority: Priority, max: usize },
    /// No timer with that key is queued.
    TimerNotFound,
    /// No registration for that handle and direction.
    IoNotFound { fd: RawFd, direction: Direction },
    /// Wake pipe or thread setup failed.
    Setup(io::Error),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle(fd) => write!(f, "invalid I/O handle {}", fd),
            Self::InvalidPriority(p) => write!(f, "invalid priority {}", p),
            Self::InvalidDirection(d) => write!(f, "invalid direction {}", d),
            Self::QueueFull { priority, max } => {
                write!(f, "{:?} priority queue full ({} registrations)", priority, max)
            }
            Self::TimerNotFound => write!(f, "timer not queued"),
            Self::IoNotFound { fd, direction } => {
                write!(f, "no {:?} registration for handle {}", direction, fd)
            }
            Self::Setup(e) => write!(f, "scheduler setup failed: {}", e),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup(e) => Some(e),
            _ => None,
        }
    }
}
