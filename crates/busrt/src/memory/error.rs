// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arena error types.

use std::fmt;

use super::handle::ObjHandle;
use super::registry::ObjectTypeId;

/// Errors returned by [`Arena`](super::Arena) operations.
///
/// Registration errors are ordinary failures. The handle and reference
/// count variants are caller bugs that the arena detects instead of
/// corrupting its pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Type id outside `0..MAX_OBJECT_TYPES`.
    TypeOutOfRange(ObjectTypeId),
    /// Type id registered twice.
    AlreadyRegistered(ObjectTypeId),
    /// Element size of zero requested at registration.
    ZeroSize(ObjectTypeId),
    /// Raw-block pseudo-type registered with a pool threshold or initial objects.
    RawBlockPool,
    /// Allocation from a type id that was never registered.
    UnknownType(ObjectTypeId),
    /// Handle refers to an object that was already released.
    StaleHandle(ObjHandle),
    /// Plain dispose of an object someone still holds a reference to.
    StillReferenced {
        handle: ObjHandle,
        count: u32,
    },
    /// Reference count operation on an object allocated without one.
    NotRefCounted(ObjHandle),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeOutOfRange(id) => write!(f, "object type {} out of range", id),
            Self::AlreadyRegistered(id) => write!(f, "object type {} already registered", id),
            Self::ZeroSize(id) => write!(f, "object type {} registered with size 0", id),
            Self::RawBlockPool => write!(f, "raw block type cannot be pooled"),
            Self::UnknownType(id) => write!(f, "object type {} is not registered", id),
            Self::StaleHandle(h) => write!(f, "stale object handle {}", h),
            Self::StillReferenced { handle, count } => {
                write!(f, "object {} disposed with {} live references", handle, count)
            }
            Self::NotRefCounted(h) => write!(f, "object {} is not reference counted", h),
        }
    }
}

impl std::error::Error for ArenaError {}
