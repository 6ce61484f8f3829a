// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! I/O registrations split into three priority queues plus the poll mask.

use std::collections::BTreeSet;
use std::os::fd::RawFd;

use super::error::EventError;
use super::key::TaskKey;
use super::scheduler::IoCallback;
use crate::logging::targets;

/// Dispatch priority of an I/O registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<i32> for Priority {
    type Error = EventError;

    fn try_from(raw: i32) -> Result<Self, EventError> {
        match raw {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            _ => Err(EventError::InvalidPriority(raw)),
        }
    }
}

/// Readiness direction of an I/O registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Direction {
    Read = 0,
    Write = 1,
    Except = 2,
}

impl TryFrom<i32> for Direction {
    type Error = EventError;

    fn try_from(raw: i32) -> Result<Self, EventError> {
        match raw {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::Except),
            _ => Err(EventError::InvalidDirection(raw)),
        }
    }
}

/// Result of a successful `attach_io`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Added,
    /// An existing registration for the same handle and direction was replaced.
    Replaced,
}

pub(crate) struct FdEntry {
    pub fd: RawFd,
    pub direction: Direction,
    pub key: TaskKey,
    pub callback: IoCallback,
    pub active: bool,
}

pub(crate) struct FdTable {
    queues: [Vec<FdEntry>; 3],
    mask: BTreeSet<(RawFd, Direction)>,
    threshold: Priority,
    max_fd: RawFd,
    max_per_queue: usize,
}

impl FdTable {
    pub fn new(max_fd: RawFd, max_per_queue: usize) -> Self {
        Self {
            queues: [Vec::new(), Vec::new(), Vec::new()],
            mask: BTreeSet::new(),
            threshold: Priority::Low,
            max_fd,
            max_per_queue,
        }
    }

    pub fn attach(
        &mut self,
        fd: RawFd,
        direction: Direction,
        priority: Priority,
        key: TaskKey,
        callback: IoCallback,
    ) -> Result<AttachOutcome, EventError> {
        if fd < 0 || fd > self.max_fd {
            return Err(EventError::InvalidHandle(fd));
        }

        let mut outcome = AttachOutcome::Added;
        if let Some((current, idx)) = self.find(fd, direction) {
            if current == priority {
                let entry = &mut self.queues[current.index()][idx];
                entry.key = key;
                entry.callback = callback;
                entry.active = true;
                if priority >= self.threshold {
                    self.mask.insert((fd, direction));
                }
                log::debug!(
                    target: targets::EVENTS,
                    "attach_io: replaced fd {} {:?} at {:?}",
                    fd,
                    direction,
                    priority
                );
                return Ok(AttachOutcome::Replaced);
            }
            if self.queues[priority.index()].len() >= self.max_per_queue {
                return Err(EventError::QueueFull {
                    priority,
                    max: self.max_per_queue,
                });
            }
            self.queues[current.index()].remove(idx);
            self.mask.remove(&(fd, direction));
            outcome = AttachOutcome::Replaced;
        }

        let queue = &mut self.queues[priority.index()];
        if queue.len() >= self.max_per_queue {
            return Err(EventError::QueueFull {
                priority,
                max: self.max_per_queue,
            });
        }
        queue.push(FdEntry {
            fd,
            direction,
            key,
            callback,
            active: true,
        });
        if priority >= self.threshold {
            self.mask.insert((fd, direction));
        }
        log::debug!(
            target: targets::EVENTS,
            "attach_io: fd {} {:?} at {:?} ({} in queue)",
            fd,
            direction,
            priority,
            self.queues[priority.index()].len()
        );
        Ok(outcome)
    }

    pub fn detach(&mut self, fd: RawFd, direction: Direction) -> Result<(), EventError> {
        let (priority, idx) = self
            .find(fd, direction)
            .ok_or(EventError::IoNotFound { fd, direction })?;
        self.queues[priority.index()].remove(idx);
        self.mask.remove(&(fd, direction));
        log::debug!(
            target: targets::EVENTS,
            "detach_io: fd {} {:?} from {:?}",
            fd,
            direction,
            priority
        );
        Ok(())
    }

    pub fn set_active(
        &mut self,
        fd: RawFd,
        direction: Direction,
        active: bool,
    ) -> Result<(), EventError> {
        let (priority, idx) = self
            .find(fd, direction)
            .ok_or(EventError::IoNotFound { fd, direction })?;
        self.queues[priority.index()][idx].active = active;
        if active && priority >= self.threshold {
            self.mask.insert((fd, direction));
        } else {
            self.mask.remove(&(fd, direction));
        }
        Ok(())
    }

    /// Change the threshold; returns the previous one.
    pub fn set_threshold(&mut self, threshold: Priority) -> Priority {
        let previous = self.threshold;
        if previous == threshold {
            return previous;
        }
        self.threshold = threshold;
        self.mask.clear();
        for priority in Priority::ALL.into_iter().filter(|p| *p >= threshold) {
            for entry in self.queues[priority.index()].iter().filter(|e| e.active) {
                self.mask.insert((entry.fd, entry.direction));
            }
        }
        log::debug!(
            target: targets::EVENTS,
            "active threshold {:?} -> {:?} ({} polled)",
            previous,
            threshold,
            self.mask.len()
        );
        previous
    }

    pub fn threshold(&self) -> Priority {
        self.threshold
    }

    pub fn num_active(&self, priority: Priority) -> usize {
        self.queues[priority.index()]
            .iter()
            .filter(|e| e.active)
            .count()
    }

    pub fn mask(&self) -> &BTreeSet<(RawFd, Direction)> {
        &self.mask
    }

    pub fn queue(&self, priority: Priority) -> &[FdEntry] {
        &self.queues[priority.index()]
    }

    pub fn find(&self, fd: RawFd, direction: Direction) -> Option<(Priority, usize)> {
        Priority::ALL.into_iter().find_map(|p| {
            self.queues[p.index()]
                .iter()
                .position(|e| e.fd == fd && e.direction == direction)
                .map(|idx| (p, idx))
        })
    }
}
