// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP channels: open, close, scatter send and scatter receive.

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io::{self, IoSlice};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd};
use std::thread;
use std::time::Duration;

use super::multicast::{join_group, set_loopback};
use super::scatter::{scatter_copy, Scatter};
use super::TransportError;
use crate::config::{
    TransportConfig, DEFAULT_MULTICAST_TTL, MAX_SCATTER_ELEMENTS, MAX_SEND_RETRIES,
    SEND_RETRY_DELAY,
};
use crate::logging::targets;

/// Staging buffer used when a receive spans several segments.
const RECV_STAGING_LEN: usize = 65_536;

/// What a channel may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Send,
    Recv,
    SendRecv,
}

impl ChannelMode {
    pub fn can_send(self) -> bool {
        matches!(self, Self::Send | Self::SendRecv)
    }

    pub fn can_recv(self) -> bool {
        matches!(self, Self::Recv | Self::SendRecv)
    }
}

/// Socket options applied by [`Channel::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Set `SO_REUSEADDR` before binding a receive channel.
    pub reuse_addr: bool,
    /// Deliver our own multicast sends to local receivers.
    pub loopback: bool,
    /// Bind a multicast receiver to the interface (or any) instead of the group.
    pub bind_all: bool,
    pub multicast_ttl: u8,
    pub send_retry_delay: Duration,
    pub max_send_retries: u32,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            reuse_addr: false,
            loopback: true,
            bind_all: false,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            send_retry_delay: SEND_RETRY_DELAY,
            max_send_retries: MAX_SEND_RETRIES,
        }
    }
}

impl ChannelOptions {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            multicast_ttl: config.multicast_ttl,
            send_retry_delay: config.send_retry_delay,
            max_send_retries: config.max_send_retries,
            ..Self::default()
        }
    }
}

/// One open UDP socket, send- and/or receive-capable.
#[derive(Debug)]
pub struct Channel {
    socket: UdpSocket,
    mode: ChannelMode,
    group: Option<Ipv4Addr>,
    iface: Option<Ipv4Addr>,
    retry_delay: Duration,
    max_retries: u32,
}

fn setup_error(op: &'static str) -> impl FnOnce(io::Error) -> TransportError {
    move |source| {
        log::error!(target: targets::DATA_LINK, "{} failed: {}", op, source);
        TransportError::Socket { op, source }
    }
}

impl Channel {
    /// Open a channel.
    ///
    /// Receive-capable channels bind `port` on the multicast group (unless
    /// `bind_all`), else on `iface`, else on any address, and join the group
    /// when it is multicast. Without a multicast group the channel accepts
    /// broadcast.
    pub fn open(
        mode: ChannelMode,
        port: u16,
        group: Option<Ipv4Addr>,
        iface: Option<Ipv4Addr>,
        options: &ChannelOptions,
    ) -> Result<Self, TransportError> {
        crate::trace_fn!("Channel::open");
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(setup_error("socket"))?;

        if mode.can_send() {
            socket.set_broadcast(true).map_err(setup_error("SO_BROADCAST"))?;
            if let Err(e) = socket.set_multicast_ttl_v4(u32::from(options.multicast_ttl)) {
                log::debug!(target: targets::DATA_LINK, "IP_MULTICAST_TTL not set: {}", e);
            }
        }

        let multicast_group = group.filter(Ipv4Addr::is_multicast);
        if mode.can_recv() {
            if options.reuse_addr {
                socket
                    .set_reuse_address(true)
                    .map_err(setup_error("SO_REUSEADDR"))?;
            }

            let bind_ip = match (multicast_group, iface) {
                (Some(g), _) if !options.bind_all => g,
                (_, Some(i)) => i,
                _ => Ipv4Addr::UNSPECIFIED,
            };
            let addr = SocketAddrV4::new(bind_ip, port);
            socket.bind(&SockAddr::from(addr)).map_err(|source| {
                log::error!(target: targets::DATA_LINK, "bind to {} failed: {}", addr, source);
                TransportError::Bind { addr, source }
            })?;

            match multicast_group {
                Some(g) => join_group(&socket, g, iface)?,
                None => socket.set_broadcast(true).map_err(setup_error("SO_BROADCAST"))?,
            }
        }

        if !options.loopback {
            set_loopback(&socket, false)?;
        }

        let socket: UdpSocket = socket.into();
        log::info!(
            target: targets::DATA_LINK,
            "opened {:?} channel on {} group={:?} iface={:?}",
            mode,
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string()),
            group,
            iface
        );

        Ok(Self {
            socket,
            mode,
            group,
            iface,
            retry_delay: options.send_retry_delay,
            max_retries: options.max_send_retries,
        })
    }

    /// Release the socket, reporting an OS close failure.
    pub fn close(self) -> Result<(), TransportError> {
        let fd = self.socket.into_raw_fd();
        // SAFETY: into_raw_fd transferred sole ownership of fd to us; it is closed exactly once.
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            log::warn!(target: targets::DATA_LINK, "close({}) failed: {}", fd, err);
            return Err(TransportError::Close(err));
        }
        Ok(())
    }

    /// Send `segments` as one datagram; returns the bytes the OS accepted.
    ///
    /// A failed send is retried once after a short delay. A short write is
    /// logged and reported through the returned length.
    pub fn send(
        &self,
        addr: Ipv4Addr,
        port: u16,
        segments: &[&[u8]],
    ) -> Result<usize, TransportError> {
        if !self.mode.can_send() {
            return Err(TransportError::WrongMode("send"));
        }
        if segments.len() > MAX_SCATTER_ELEMENTS {
            return Err(TransportError::TooManySegments {
                count: segments.len(),
                max: MAX_SCATTER_ELEMENTS,
            });
        }

        let dest = SocketAddrV4::new(addr, port);
        let target = SockAddr::from(dest);
        let total: usize = segments.iter().map(|s| s.len()).sum();
        let slices: Vec<IoSlice<'_>> = segments.iter().map(|s| IoSlice::new(s)).collect();
        let sock = SockRef::from(&self.socket);

        let mut attempt = 0;
        loop {
            match sock.send_to_vectored(&slices, &target) {
                Ok(sent) => {
                    if sent < total {
                        log::warn!(
                            target: targets::DATA_LINK,
                            "partial send to {}: {} of {} bytes",
                            dest,
                            sent,
                            total
                        );
                    }
                    return Ok(sent);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        target: targets::DATA_LINK,
                        "send to {} failed ({}), retry {} of {}",
                        dest,
                        e,
                        attempt,
                        self.max_retries
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(source) => {
                    log::warn!(target: targets::DATA_LINK, "send to {} failed: {}", dest, source);
                    return Err(TransportError::Send { dest, source });
                }
            }
        }
    }

    pub fn send_packet(
        &self,
        addr: Ipv4Addr,
        port: u16,
        packet: &Scatter<'_>,
    ) -> Result<usize, TransportError> {
        self.send(addr, port, packet.segments())
    }

    /// Receive one datagram into `segments`; returns the bytes placed.
    pub fn receive(&self, segments: &mut [&mut [u8]]) -> Result<usize, TransportError> {
        self.receive_from(segments).map(|(n, _)| n)
    }

    /// Receive one datagram into `segments` and report its sender.
    ///
    /// Bytes beyond the combined segment capacity are discarded. A
    /// zero-length datagram is a valid result.
    pub fn receive_from(
        &self,
        segments: &mut [&mut [u8]],
    ) -> Result<(usize, SocketAddrV4), TransportError> {
        if !self.mode.can_recv() {
            return Err(TransportError::WrongMode("receive"));
        }
        if segments.len() > MAX_SCATTER_ELEMENTS {
            return Err(TransportError::TooManySegments {
                count: segments.len(),
                max: MAX_SCATTER_ELEMENTS,
            });
        }

        let result = if segments.len() == 1 {
            self.socket.recv_from(&mut *segments[0])
        } else {
            let capacity: usize = segments.iter().map(|s| s.len()).sum();
            let mut staging = [0u8; RECV_STAGING_LEN];
            let cap = capacity.min(RECV_STAGING_LEN);
            self.socket
                .recv_from(&mut staging[..cap])
                .map(|(n, from)| (scatter_copy(&staging[..n], segments), from))
        };

        let (n, from) = result.map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut {
                log::debug!(target: targets::DATA_LINK, "receive: {}", e);
            } else {
                log::warn!(target: targets::DATA_LINK, "receive failed: {}", e);
            }
            TransportError::Recv(e)
        })?;

        let from = match from {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(v6) => {
                return Err(TransportError::Recv(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected IPv6 sender {}", v6),
                )))
            }
        };
        if n == 0 {
            log::debug!(target: targets::DATA_LINK, "zero-length datagram from {}", from);
        }
        Ok((n, from))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddrV4> {
        match self.socket.local_addr()? {
            SocketAddr::V4(v4) => Ok(v4),
            SocketAddr::V6(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "IPv4 channel bound to an IPv6 address",
            )),
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    pub fn group(&self) -> Option<Ipv4Addr> {
        self.group
    }

    pub fn iface(&self) -> Option<Ipv4Addr> {
        self.iface
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.socket.set_nonblocking(nonblocking)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }
}

impl AsRawFd for Channel {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl AsFd for Channel {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}
