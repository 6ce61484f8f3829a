// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Memory arena: typed object pools, raw blocks and reference counting.
//!
//! ```ignore
//! use busrt::memory::{Arena, ObjectTypeId};
//!
//! const PACKET: ObjectTypeId = ObjectTypeId(1);
//!
//! let mut arena = Arena::new();
//! arena.register_type(PACKET, "packet", 1472, 32, 8)?;
//! let h = arena.allocate_ref_counted(PACKET)?;
//! arena.inc_ref(h)?;          // second holder
//! arena.dec_ref(h)?;
//! arena.dec_ref(h)?;          // storage back in the pool
//! ```

mod arena;
mod error;
mod handle;
mod registry;

pub use arena::{Arena, SharedArena};
pub use error::ArenaError;
pub use handle::ObjHandle;
pub use registry::{
    ArenaStats, ObjectType, ObjectTypeId, TypeStats, DEFAULT_TYPE_NAME, MAX_TYPE_NAME_LEN,
    OBJECT_HEADER_LEN, RAW_BLOCK_TYPE, UNKNOWN_TYPE_NAME,
};
