// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Level-triggered readiness polling and the loop's wake pipe.

use std::collections::BTreeSet;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use super::fd::Direction;
use crate::logging::targets;

pub(crate) type ReadySet = BTreeSet<(RawFd, Direction)>;

pub(crate) struct PollOutcome {
    pub ready: ReadySet,
    /// The wake pipe was signalled.
    pub woken: bool,
}

fn interest_bits(direction: Direction) -> libc::c_short {
    match direction {
        Direction::Read => libc::POLLIN,
        Direction::Write => libc::POLLOUT,
        Direction::Except => libc::POLLPRI,
    }
}

/// Whether `revents` satisfies `direction`.
///
/// Hang-up and error conditions count as readable and writable so the
/// callback gets to observe them.
fn satisfied(direction: Direction, revents: libc::c_short) -> bool {
    let fault = libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
    match direction {
        Direction::Read => revents & (libc::POLLIN | fault) != 0,
        Direction::Write => revents & (libc::POLLOUT | fault) != 0,
        Direction::Except => revents & (libc::POLLPRI | libc::POLLNVAL) != 0,
    }
}

/// Round up so a sub-millisecond wait does not become a busy poll.
fn timeout_ms(timeout: Duration) -> libc::c_int {
    let micros = timeout.as_micros();
    let ms = micros.div_ceil(1000);
    libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}

/// Wait up to `timeout` for any of `interest` (and the wake fd) to become ready.
///
/// An interrupted wait returns an empty outcome.
pub(crate) fn poll_ready(
    interest: &BTreeSet<(RawFd, Direction)>,
    wake_fd: RawFd,
    timeout: Duration,
) -> io::Result<PollOutcome> {
    let mut fds: Vec<libc::pollfd> = Vec::with_capacity(interest.len() + 1);
    fds.push(libc::pollfd {
        fd: wake_fd,
        events: libc::POLLIN,
        revents: 0,
    });
    // The set is ordered by fd, so directions of one fd are adjacent.
    for &(fd, direction) in interest {
        match fds.last_mut() {
            Some(last) if last.fd == fd && fd != wake_fd => last.events |= interest_bits(direction),
            _ => fds.push(libc::pollfd {
                fd,
                events: interest_bits(direction),
                revents: 0,
            }),
        }
    }

    // SAFETY: fds is a live, exclusively borrowed Vec of initialized pollfd structs and
    // the length passed matches its element count.
    let rc = unsafe {
        libc::poll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            timeout_ms(timeout),
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(PollOutcome {
                ready: ReadySet::new(),
                woken: false,
            });
        }
        return Err(err);
    }

    let woken = fds[0].revents & libc::POLLIN != 0;
    let mut ready = ReadySet::new();
    if rc > 0 {
        let mut idx = 1;
        for &(fd, direction) in interest {
            while idx < fds.len() && fds[idx].fd != fd {
                idx += 1;
            }
            let Some(pfd) = fds.get(idx) else { break };
            if pfd.revents & libc::POLLNVAL != 0 {
                log::warn!(target: targets::EVENTS, "poll: fd {} is not open", fd);
            }
            if satisfied(direction, pfd.revents) {
                ready.insert((fd, direction));
            }
        }
    }
    Ok(PollOutcome { ready, woken })
}

/// Self-pipe that interrupts a blocked poll from any thread.
pub(crate) struct WakePipe {
    reader: UnixStream,
    writer: Arc<UnixStream>,
}

impl WakePipe {
    pub fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self {
            reader,
            writer: Arc::new(writer),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    pub fn writer(&self) -> Arc<UnixStream> {
        Arc::clone(&self.writer)
    }

    /// Consume every pending wake byte.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            match (&self.reader).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!(target: targets::EVENTS, "wake pipe read failed: {}", e);
                    break;
                }
            }
        }
    }
}

/// Signal a wake pipe through its writer end.
pub(crate) fn signal(writer: &UnixStream) {
    loop {
        match (&*writer).write(&[1u8]) {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Pipe full: a wake is already pending.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                log::debug!(target: targets::EVENTS, "wake pipe write failed: {}", e);
                break;
            }
        }
    }
}
