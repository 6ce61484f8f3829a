// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group membership and loopback.

use socket2::Socket;
use std::net::Ipv4Addr;

use super::TransportError;
use crate::logging::targets;

/// Interface to add a membership on.
///
/// A multicast "interface address" cannot select a NIC, so it falls back to any.
pub fn membership_iface(iface: Option<Ipv4Addr>) -> Ipv4Addr {
    match iface {
        Some(addr) if !addr.is_multicast() => addr,
        _ => Ipv4Addr::UNSPECIFIED,
    }
}

/// Join `group` on the interface chosen by [`membership_iface`].
pub fn join_group(
    socket: &Socket,
    group: Ipv4Addr,
    iface: Option<Ipv4Addr>,
) -> Result<(), TransportError> {
    let iface = membership_iface(iface);
    match socket.join_multicast_v4(&group, &iface) {
        Ok(()) => {
            log::debug!(target: targets::DATA_LINK, "joined {} on {}", group, iface);
            Ok(())
        }
        Err(source) => {
            log::error!(
                target: targets::DATA_LINK,
                "join {} on {} failed: {}",
                group,
                iface,
                source
            );
            Err(TransportError::Join {
                group,
                iface,
                source,
            })
        }
    }
}

/// Enable or disable delivery of our own multicast sends to local sockets.
pub fn set_loopback(socket: &Socket, enabled: bool) -> Result<(), TransportError> {
    socket
        .set_multicast_loop_v4(enabled)
        .map_err(|source| TransportError::Socket {
            op: "IP_MULTICAST_LOOP",
            source,
        })?;
    log::debug!(
        target: targets::DATA_LINK,
        "multicast loop {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_iface_fallbacks() {
        let nic = Ipv4Addr::new(10, 0, 0, 7);
        assert_eq!(membership_iface(Some(nic)), nic);
        assert_eq!(membership_iface(None), Ipv4Addr::UNSPECIFIED);
        assert_eq!(
            membership_iface(Some(Ipv4Addr::new(225, 0, 1, 1))),
            Ipv4Addr::UNSPECIFIED
        );
    }
}
