// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object type descriptors and usage counters.

use std::fmt;

use crate::config::MAX_OBJECT_TYPES;

/// Longest type name kept verbatim; longer names are replaced.
pub const MAX_TYPE_NAME_LEN: usize = 35;

/// Name used for a registration whose name was too long.
pub const DEFAULT_TYPE_NAME: &str = "Unknown Obj";

/// Name reported for ids that are not registered.
pub const UNKNOWN_TYPE_NAME: &str = "NO SUCH OBJECT";

/// Bookkeeping bytes charged per object in the byte counters
/// (type id, reference count, payload length).
pub const OBJECT_HEADER_LEN: usize = 16;

/// Identifier of a registered object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectTypeId(pub u32);

/// Pseudo-type of variable length raw blocks. Never pooled.
pub const RAW_BLOCK_TYPE: ObjectTypeId = ObjectTypeId(0);

impl ObjectTypeId {
    pub(crate) fn slot(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < MAX_OBJECT_TYPES).then_some(idx)
    }

    pub fn is_raw_block(self) -> bool {
        self == RAW_BLOCK_TYPE
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered shape of an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub id: ObjectTypeId,
    pub name: String,
    /// Payload size of every object of this type (nominal for raw blocks).
    pub size: usize,
    /// Pool low-water mark: released objects are kept while the pool is smaller.
    pub threshold: usize,
}

impl ObjectType {
    pub(crate) fn new(id: ObjectTypeId, name: &str, size: usize, threshold: usize) -> Self {
        let name = if name.len() > MAX_TYPE_NAME_LEN {
            DEFAULT_TYPE_NAME.to_string()
        } else {
            name.to_string()
        };
        Self {
            id,
            name,
            size,
            threshold,
        }
    }
}

/// Per-type usage counters. Diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
    /// Bytes held by this type (payload plus header), pooled objects included.
    pub bytes_allocated: usize,
    pub max_bytes: usize,
    /// Objects held by this type, pooled objects included.
    pub objects: usize,
    pub max_objects: usize,
    /// Objects currently handed out to callers.
    pub in_use: usize,
    pub max_in_use: usize,
    /// Objects parked in the pool.
    pub in_pool: usize,
    /// Allocations served by the system allocator.
    pub system_allocs: u64,
    /// Allocations served from the pool.
    pub pool_hits: u64,
}

/// Arena-wide totals across all types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub bytes_allocated: usize,
    pub max_bytes: usize,
    pub objects: usize,
    pub max_objects: usize,
    pub in_use: usize,
    pub max_in_use: usize,
}

/// Storage growth: object created through the system allocator.
pub(crate) fn on_grow(stats: &mut TypeStats, totals: &mut ArenaStats, bytes: usize) {
    stats.bytes_allocated += bytes;
    stats.max_bytes = stats.max_bytes.max(stats.bytes_allocated);
    stats.objects += 1;
    stats.max_objects = stats.max_objects.max(stats.objects);
    totals.bytes_allocated += bytes;
    totals.max_bytes = totals.max_bytes.max(totals.bytes_allocated);
    totals.objects += 1;
    totals.max_objects = totals.max_objects.max(totals.objects);
}

/// Storage shrink: object released to the system allocator.
pub(crate) fn on_shrink(stats: &mut TypeStats, totals: &mut ArenaStats, bytes: usize) {
    stats.bytes_allocated -= bytes;
    stats.objects -= 1;
    totals.bytes_allocated -= bytes;
    totals.objects -= 1;
}

pub(crate) fn on_checkout(stats: &mut TypeStats, totals: &mut ArenaStats) {
    stats.in_use += 1;
    stats.max_in_use = stats.max_in_use.max(stats.in_use);
    totals.in_use += 1;
    totals.max_in_use = totals.max_in_use.max(totals.in_use);
}

pub(crate) fn on_checkin(stats: &mut TypeStats, totals: &mut ArenaStats) {
    stats.in_use -= 1;
    totals.in_use -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_name_replaced() {
        let t = ObjectType::new(ObjectTypeId(3), &"x".repeat(36), 8, 0);
        assert_eq!(t.name, DEFAULT_TYPE_NAME);

        let t = ObjectType::new(ObjectTypeId(3), &"y".repeat(35), 8, 0);
        assert_eq!(t.name.len(), 35);
    }

    #[test]
    fn test_type_slot_range() {
        assert_eq!(ObjectTypeId(0).slot(), Some(0));
        assert_eq!(ObjectTypeId(199).slot(), Some(199));
        assert_eq!(ObjectTypeId(200).slot(), None);
        assert!(RAW_BLOCK_TYPE.is_raw_block());
    }

    #[test]
    fn test_counters_track_maxima() {
        let mut stats = TypeStats::default();
        let mut totals = ArenaStats::default();

        on_grow(&mut stats, &mut totals, 24);
        on_grow(&mut stats, &mut totals, 24);
        on_checkout(&mut stats, &mut totals);
        on_checkout(&mut stats, &mut totals);
        on_checkin(&mut stats, &mut totals);
        on_shrink(&mut stats, &mut totals, 24);

        assert_eq!(stats.bytes_allocated, 24);
        assert_eq!(stats.max_bytes, 48);
        assert_eq!(stats.objects, 1);
        assert_eq!(stats.max_objects, 2);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.max_in_use, 2);
        assert_eq!(totals.max_in_use, 2);
    }
}
