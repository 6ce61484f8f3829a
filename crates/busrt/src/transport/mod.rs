// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transport over UDP unicast, broadcast and IPv4 multicast.
//!
//! A [`Channel`] owns exactly one socket for its lifetime. Channels
//! implement `AsRawFd` so the event scheduler can poll them.

mod channel;
mod error;
pub mod multicast;
mod scatter;

pub use channel::{Channel, ChannelMode, ChannelOptions};
pub use error::TransportError;
pub use scatter::Scatter;
