// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # busrt - message-bus runtime kernel
//!
//! The low-level runtime a group-communication bus is built on: a typed
//! memory arena, a single-threaded event scheduler, and a datagram
//! transport over UDP unicast, broadcast and IPv4 multicast.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                       Protocol layer (caller)                       |
//! |     membership | token ring | flow control | message delivery       |
//! +---------------------------------------------------------------------+
//! |   events::Scheduler   timers + prioritized I/O readiness dispatch   |
//! +----------------------------------+----------------------------------+
//! |   memory::Arena                  |   transport::Channel             |
//! |   typed pools, raw blocks,       |   scatter/gather datagrams,      |
//! |   reference counting             |   multicast membership           |
//! +----------------------------------+----------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`events`] - dispatch loop, I/O thread and pacer
//! - [`memory`] - object arena
//! - [`transport`] - datagram channels
//! - [`wire`] - fixed packet header with byte-order detection
//! - [`config`] - limits and runtime configuration
//! - [`logging`] - category-filtered `log` backend
//! - [`time`] - timestamps and clocks

#![cfg(unix)]

/// Global configuration (limits, runtime config, env and YAML loading).
pub mod config;
/// Crate-wide error type.
pub mod error;
/// Event scheduler (timers, I/O readiness, threaded helpers).
pub mod events;
/// Category-aware logging backend for the `log` facade.
pub mod logging;
/// Typed object arena with pooling and reference counting.
pub mod memory;
/// Timestamps and clock sources.
pub mod time;
/// UDP datagram channels with scatter/gather and multicast.
pub mod transport;
/// Packet header encoding.
pub mod wire;

#[doc(hidden)]
pub use log as __log;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use events::{Direction, Priority, Scheduler, TaskKey};
pub use memory::{Arena, ObjHandle, ObjectTypeId};
pub use time::Timestamp;
pub use transport::{Channel, ChannelMode, Scatter};

/// busrt version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
