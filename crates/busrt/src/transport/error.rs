// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transport errors.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Errors returned by [`Channel`](super::Channel) operations.
#[derive(Debug)]
pub enum TransportError {
    /// Socket creation or option setup failed.
    Socket {
        /// Operation that failed (e.g. "SO_REUSEADDR")
        op: &'static str,
        source: io::Error,
    },
    /// Bind to the local address failed.
    Bind {
        addr: SocketAddrV4,
        source: io::Error,
    },
    /// Multicast group membership could not be added.
    Join {
        group: Ipv4Addr,
        iface: Ipv4Addr,
        source: io::Error,
    },
    /// Segment list longer than the scatter cap.
    TooManySegments { count: usize, max: usize },
    /// Segments add up to more than one bus packet.
    PacketTooLarge { len: usize, max: usize },
    /// Operation not allowed by the channel's mode.
    WrongMode(&'static str),
    /// Send failed after the retry.
    Send {
        dest: SocketAddrV4,
        source: io::Error,
    },
    /// Receive failed.
    Recv(io::Error),
    /// The OS reported an error closing the socket.
    Close(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket { op, source } => write!(f, "socket setup ({}) failed: {}", op, source),
            Self::Bind { addr, source } => write!(f, "bind to {} failed: {}", addr, source),
            Self::Join {
                group,
                iface,
                source,
            } => write!(f, "join {} on {} failed: {}", group, iface, source),
            Self::TooManySegments { count, max } => {
                write!(f, "{} segments exceed the scatter limit of {}", count, max)
            }
            Self::PacketTooLarge { len, max } => {
                write!(f, "packet of {} bytes exceeds {} bytes", len, max)
            }
            Self::WrongMode(op) => write!(f, "channel mode does not allow {}", op),
            Self::Send { dest, source } => write!(f, "send to {} failed: {}", dest, source),
            Self::Recv(e) => write!(f, "receive failed: {}", e),
            Self::Close(e) => write!(f, "close failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Socket { source, .. }
            | Self::Bind { source, .. }
            | Self::Join { source, .. }
            | Self::Send { source, .. } => Some(source),
            Self::Recv(e) | Self::Close(e) => Some(e),
            Self::TooManySegments { .. } | Self::PacketTooLarge { .. } | Self::WrongMode(_) => None,
        }
    }
}
