// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error wrapping each component's error type.

use crate::config::ConfigError;
use crate::events::EventError;
use crate::memory::ArenaError;
use crate::transport::TransportError;
use crate::wire::WireError;

/// Any error returned by the kernel.
#[derive(Debug)]
pub enum Error {
    /// Memory arena contract violation.
    Arena(ArenaError),
    /// Scheduler registration or setup failure.
    Events(EventError),
    /// Socket operation failure.
    Transport(TransportError),
    /// Malformed packet header.
    Wire(WireError),
    /// Invalid configuration.
    Config(ConfigError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Arena(e) => write!(f, "Memory arena: {}", e),
            Error::Events(e) => write!(f, "Event scheduler: {}", e),
            Error::Transport(e) => write!(f, "Transport: {}", e),
            Error::Wire(e) => write!(f, "Wire format: {}", e),
            Error::Config(e) => write!(f, "Configuration: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Arena(e) => Some(e),
            Error::Events(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Wire(e) => Some(e),
            Error::Config(e) => Some(e),
        }
    }
}

impl From<ArenaError> for Error {
    fn from(e: ArenaError) -> Self {
        Error::Arena(e)
    }
}

impl From<EventError> for Error {
    fn from(e: EventError) -> Self {
        Error::Events(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Error::Wire(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Convenient alias for results using the crate-wide [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_conversions_keep_source() {
        let err: Error = EventError::TimerNotFound.into();
        assert!(matches!(err, Error::Events(EventError::TimerNotFound)));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Event scheduler: timer not queued");

        let err: Error = WireError::Truncated { len: 3 }.into();
        assert!(err.to_string().starts_with("Wire format: "));
    }
}
