// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! busrt Global Configuration - Single Source of Truth
//!
//! This module centralizes the kernel's limits and its runtime configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: Compile-time constants (packet size, scatter cap, type cap)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] built from defaults, `BUSRT_*`
//!   environment variables, or a YAML document (`config-loader` feature)
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `BUSRT_IDLE_TIMEOUT_MS` | `scheduler.idle_timeout` |
//! | `BUSRT_SLOW_EVENTS` | `scheduler.slow_event_slots` |
//! | `BUSRT_MAX_FD` | `scheduler.max_fd` |
//! | `BUSRT_MEM_DISABLE_CACHE` | `arena.disable_pool_cache` |
//! | `BUSRT_MULTICAST_TTL` | `transport.multicast_ttl` |
//! | `BUSRT_SEND_RETRY_US` | `transport.send_retry_delay` |

use std::fmt;
use std::os::fd::RawFd;
use std::time::Duration;

/// Largest datagram the bus puts on the wire (Ethernet MTU minus IPv4/UDP headers).
pub const MAX_PACKET_SIZE: usize = 1472;

/// Maximum number of segments accepted by a single send.
#[cfg(target_os = "linux")]
pub const MAX_SCATTER_ELEMENTS: usize = 1024;

/// Maximum number of segments accepted by a single send.
#[cfg(not(target_os = "linux"))]
pub const MAX_SCATTER_ELEMENTS: usize = 64;

/// Upper bound on distinct registered object type ids (`0..MAX_OBJECT_TYPES`).
pub const MAX_OBJECT_TYPES: usize = 200;

/// Number of slowest dispatches the scheduler remembers.
pub const DEFAULT_SLOW_EVENTS: usize = 5;

/// Poll timeout used when the time queue is empty.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the single send retry.
pub const SEND_RETRY_DELAY: Duration = Duration::from_micros(100);

/// Number of retries after a failed send.
pub const MAX_SEND_RETRIES: u32 = 1;

/// Default multicast TTL (link-local only).
pub const DEFAULT_MULTICAST_TTL: u8 = 1;

/// Largest I/O handle accepted by `attach_io`.
pub const DEFAULT_MAX_FD: RawFd = 65_535;

/// Registrations allowed per priority queue.
pub const MAX_FD_EVENTS: usize = 2048;

/// Interval at which an inactive periodic activity is re-checked.
pub const INACTIVE_RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable holds an unparsable value.
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value found
        value: String,
    },
    /// Value parsed but falls outside the accepted range.
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Human readable constraint
        expected: &'static str,
    },
    /// YAML document could not be read or parsed.
    Yaml(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnv { var, value } => write!(f, "invalid value '{}' for {}", value, var),
            Self::OutOfRange { field, expected } => {
                write!(f, "{} out of range (expected {})", field, expected)
            }
            Self::Yaml(msg) => write!(f, "config document error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Event scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(serde::Deserialize), serde(default))]
pub struct SchedulerConfig {
    /// Poll timeout used when no timer is queued.
    #[cfg_attr(feature = "config-loader", serde(with = "millis"))]
    pub idle_timeout: Duration,
    /// Size of the slow-dispatch table.
    pub slow_event_slots: usize,
    /// Largest accepted I/O handle.
    pub max_fd: RawFd,
    /// Registrations allowed per priority queue.
    pub max_events_per_priority: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            slow_event_slots: DEFAULT_SLOW_EVENTS,
            max_fd: DEFAULT_MAX_FD,
            max_events_per_priority: MAX_FD_EVENTS,
        }
    }
}

/// Memory arena tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(serde::Deserialize), serde(default))]
pub struct ArenaConfig {
    /// Release storage on every dispose instead of pooling it.
    pub disable_pool_cache: bool,
}

/// Datagram transport tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(serde::Deserialize), serde(default))]
pub struct TransportConfig {
    /// TTL applied to send-capable channels.
    pub multicast_ttl: u8,
    /// Delay before retrying a failed send.
    #[cfg_attr(feature = "config-loader", serde(with = "micros"))]
    pub send_retry_delay: Duration,
    /// Retries after a failed send.
    pub max_send_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            send_retry_delay: SEND_RETRY_DELAY,
            max_send_retries: MAX_SEND_RETRIES,
        }
    }
}

/// Runtime configuration for the whole kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-loader", derive(serde::Deserialize), serde(default))]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub arena: ArenaConfig,
    pub transport: TransportConfig,
}

impl RuntimeConfig {
    /// Defaults overridden by any `BUSRT_*` variables present in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64, _>(&lookup, "BUSRT_IDLE_TIMEOUT_MS")? {
            config.scheduler.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(slots) = parse_var(&lookup, "BUSRT_SLOW_EVENTS")? {
            config.scheduler.slow_event_slots = slots;
        }
        if let Some(max_fd) = parse_var(&lookup, "BUSRT_MAX_FD")? {
            config.scheduler.max_fd = max_fd;
        }
        if let Some(raw) = lookup("BUSRT_MEM_DISABLE_CACHE") {
            config.arena.disable_pool_cache = parse_flag("BUSRT_MEM_DISABLE_CACHE", &raw)?;
        }
        if let Some(ttl) = parse_var(&lookup, "BUSRT_MULTICAST_TTL")? {
            config.transport.multicast_ttl = ttl;
        }
        if let Some(us) = parse_var::<u64, _>(&lookup, "BUSRT_SEND_RETRY_US")? {
            config.transport.send_retry_delay = Duration::from_micros(us);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing fields keep their defaults.
    #[cfg(feature = "config-loader")]
    pub fn from_yaml_str(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(doc).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    #[cfg(feature = "config-loader")]
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let doc = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Yaml(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&doc)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_fd < 0 {
            return Err(ConfigError::OutOfRange {
                field: "scheduler.max_fd",
                expected: ">= 0",
            });
        }
        if self.scheduler.max_events_per_priority == 0 {
            return Err(ConfigError::OutOfRange {
                field: "scheduler.max_events_per_priority",
                expected: "> 0",
            });
        }
        if self.transport.multicast_ttl == 0 {
            return Err(ConfigError::OutOfRange {
                field: "transport.multicast_ttl",
                expected: "1-255",
            });
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(feature = "config-loader")]
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(feature = "config-loader")]
mod micros {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.scheduler.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.scheduler.slow_event_slots, DEFAULT_SLOW_EVENTS);
        assert!(!config.arena.disable_pool_cache);
        assert_eq!(config.transport.multicast_ttl, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("BUSRT_IDLE_TIMEOUT_MS", "250"),
            ("BUSRT_SLOW_EVENTS", "8"),
            ("BUSRT_MEM_DISABLE_CACHE", "yes"),
            ("BUSRT_MULTICAST_TTL", "16"),
            ("BUSRT_SEND_RETRY_US", "500"),
        ]))
        .expect("valid env");

        assert_eq!(config.scheduler.idle_timeout, Duration::from_millis(250));
        assert_eq!(config.scheduler.slow_event_slots, 8);
        assert!(config.arena.disable_pool_cache);
        assert_eq!(config.transport.multicast_ttl, 16);
        assert_eq!(config.transport.send_retry_delay, Duration::from_micros(500));
    }

    #[test]
    fn test_env_invalid_value() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[("BUSRT_MULTICAST_TTL", "300")]))
            .expect_err("ttl does not fit in u8");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "BUSRT_MULTICAST_TTL",
                ..
            }
        ));

        let err = RuntimeConfig::from_lookup(lookup_from(&[("BUSRT_MULTICAST_TTL", "0")]))
            .expect_err("ttl zero rejected");
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_env_invalid_flag() {
        let err = RuntimeConfig::from_lookup(lookup_from(&[("BUSRT_MEM_DISABLE_CACHE", "maybe")]))
            .expect_err("flag must be boolean");
        assert_eq!(err.to_string(), "invalid value 'maybe' for BUSRT_MEM_DISABLE_CACHE");
    }

    #[cfg(feature = "config-loader")]
    #[test]
    fn test_yaml_partial_document() {
        let config = RuntimeConfig::from_yaml_str(
            "scheduler:\n  idle_timeout: 1500\narena:\n  disable_pool_cache: true\n",
        )
        .expect("valid yaml");

        assert_eq!(config.scheduler.idle_timeout, Duration::from_millis(1500));
        assert_eq!(config.scheduler.max_fd, DEFAULT_MAX_FD);
        assert!(config.arena.disable_pool_cache);
        assert_eq!(config.transport, TransportConfig::default());
    }

    #[cfg(feature = "config-loader")]
    #[test]
    fn test_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "transport:\n  multicast_ttl: 4\n  send_retry_delay: 250")
            .expect("write yaml");

        let config = RuntimeConfig::from_yaml_file(file.path()).expect("load yaml");
        assert_eq!(config.transport.multicast_ttl, 4);
        assert_eq!(config.transport.send_retry_delay, Duration::from_micros(250));
    }

    #[cfg(feature = "config-loader")]
    #[test]
    fn test_yaml_rejects_garbage() {
        let err = RuntimeConfig::from_yaml_str("scheduler: [1, 2").expect_err("bad yaml");
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
