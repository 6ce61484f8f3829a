// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed object pools, raw blocks and reference counting.
//!
//! Every object lives in one slot of the arena and is reached through an
//! [`ObjHandle`]. Released storage of a pooled type is parked until the
//! pool reaches the type's threshold; past that it goes back to the system
//! allocator. All storage handed out is zeroed, pooled storage included.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::ArenaError;
use super::handle::{ObjHandle, SlotTable};
use super::registry::{
    on_checkin, on_checkout, on_grow, on_shrink, ArenaStats, ObjectType, ObjectTypeId,
    TypeStats, OBJECT_HEADER_LEN, RAW_BLOCK_TYPE, UNKNOWN_TYPE_NAME,
};
use crate::config::{ArenaConfig, MAX_OBJECT_TYPES};
use crate::logging::targets;

/// Name given to the raw-block type when it is registered on first use.
const RAW_BLOCK_NAME: &str = "mem_block";

/// Arena shared between threads behind a lock.
pub type SharedArena = Arc<Mutex<Arena>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefCount {
    NotCounted,
    Counted(u32),
}

struct LiveObject {
    type_id: ObjectTypeId,
    refs: RefCount,
    data: Box<[u8]>,
}

struct TypeEntry {
    descriptor: ObjectType,
    stats: TypeStats,
    pool: Vec<Box<[u8]>>,
}

/// Typed memory arena. Not internally synchronized.
pub struct Arena {
    types: Vec<Option<TypeEntry>>,
    objects: SlotTable<LiveObject>,
    totals: ArenaStats,
    config: ArenaConfig,
}

fn violation(err: ArenaError) -> ArenaError {
    log::error!(target: targets::MEMORY, "{}", err);
    err
}

fn zeroed(len: usize) -> Box<[u8]> {
    vec![0u8; len].into_boxed_slice()
}

impl Arena {
    pub fn new() -> Self {
        Self::with_config(&ArenaConfig::default())
    }

    pub fn with_config(config: &ArenaConfig) -> Self {
        let mut types = Vec::with_capacity(MAX_OBJECT_TYPES);
        types.resize_with(MAX_OBJECT_TYPES, || None);
        Self {
            types,
            objects: SlotTable::new(),
            totals: ArenaStats::default(),
            config: config.clone(),
        }
    }

    pub fn into_shared(self) -> SharedArena {
        Arc::new(Mutex::new(self))
    }

    /// Register an object type and pre-populate its pool with `initial` objects.
    pub fn register_type(
        &mut self,
        id: ObjectTypeId,
        name: &str,
        size: usize,
        threshold: usize,
        initial: usize,
    ) -> Result<(), ArenaError> {
        crate::trace_fn!("Arena::register_type");
        let slot = id.slot().ok_or(ArenaError::TypeOutOfRange(id))?;
        if id.is_raw_block() && (threshold > 0 || initial > 0) {
            return Err(ArenaError::RawBlockPool);
        }
        if self.types[slot].is_some() {
            return Err(ArenaError::AlreadyRegistered(id));
        }
        if size == 0 {
            return Err(ArenaError::ZeroSize(id));
        }

        let mut entry = TypeEntry {
            descriptor: ObjectType::new(id, name, size, threshold),
            stats: TypeStats::default(),
            pool: Vec::with_capacity(threshold.max(initial)),
        };
        for _ in 0..initial {
            entry.pool.push(zeroed(size));
            entry.stats.system_allocs += 1;
            entry.stats.in_pool += 1;
            on_grow(&mut entry.stats, &mut self.totals, size + OBJECT_HEADER_LEN);
        }

        log::debug!(
            target: targets::MEMORY,
            "registered type {} '{}' size={} threshold={} initial={}",
            id,
            entry.descriptor.name,
            size,
            threshold,
            initial
        );
        self.types[slot] = Some(entry);
        Ok(())
    }

    /// Allocate a zeroed object of a registered type.
    ///
    /// Raw blocks are not allocated by id; use [`allocate_raw`](Self::allocate_raw).
    pub fn allocate(&mut self, id: ObjectTypeId) -> Result<ObjHandle, ArenaError> {
        self.checkout(id, RefCount::NotCounted)
    }

    /// Allocate a zeroed raw block. `len == 0` yields the null handle.
    pub fn allocate_raw(&mut self, len: usize) -> Option<ObjHandle> {
        self.checkout_raw(len, RefCount::NotCounted)
    }

    /// Allocate a reference-counted object; the count starts at 1.
    pub fn allocate_ref_counted(&mut self, id: ObjectTypeId) -> Result<ObjHandle, ArenaError> {
        self.checkout(id, RefCount::Counted(1))
    }

    /// Reference-counted raw block; the count starts at 1.
    pub fn allocate_raw_ref_counted(&mut self, len: usize) -> Option<ObjHandle> {
        self.checkout_raw(len, RefCount::Counted(1))
    }

    /// Release an object allocated without a reference count.
    ///
    /// No-op on the null handle.
    pub fn dispose(&mut self, handle: impl Into<Option<ObjHandle>>) -> Result<(), ArenaError> {
        let Some(handle) = handle.into() else {
            return Ok(());
        };
        let obj = self.live(handle)?;
        if let RefCount::Counted(count) = obj.refs {
            return Err(violation(ArenaError::StillReferenced { handle, count }));
        }
        if let Some(obj) = self.objects.remove(handle) {
            self.release(obj);
        }
        Ok(())
    }

    /// New uncounted object of the same type and length with a copy of the payload.
    pub fn copy(&mut self, handle: ObjHandle) -> Result<ObjHandle, ArenaError> {
        let (type_id, payload) = {
            let obj = self.live(handle)?;
            (obj.type_id, obj.data.to_vec())
        };
        let dup = if type_id.is_raw_block() {
            match self.checkout_raw(payload.len(), RefCount::NotCounted) {
                Some(h) => h,
                None => return Err(violation(ArenaError::StaleHandle(handle))),
            }
        } else {
            self.checkout(type_id, RefCount::NotCounted)?
        };
        if let Some(obj) = self.objects.get_mut(dup) {
            obj.data.copy_from_slice(&payload);
        }
        Ok(dup)
    }

    /// Add a holder; returns the new count.
    pub fn inc_ref(&mut self, handle: ObjHandle) -> Result<u32, ArenaError> {
        let obj = self
            .objects
            .get_mut(handle)
            .ok_or_else(|| violation(ArenaError::StaleHandle(handle)))?;
        match obj.refs {
            RefCount::Counted(n) => {
                obj.refs = RefCount::Counted(n + 1);
                Ok(n + 1)
            }
            RefCount::NotCounted => Err(violation(ArenaError::NotRefCounted(handle))),
        }
    }

    /// Drop a holder; the object is disposed when the count reaches 0.
    ///
    /// Returns the remaining count (0 on the null handle).
    pub fn dec_ref(&mut self, handle: impl Into<Option<ObjHandle>>) -> Result<u32, ArenaError> {
        let Some(handle) = handle.into() else {
            return Ok(0);
        };
        let obj = self
            .objects
            .get_mut(handle)
            .ok_or_else(|| violation(ArenaError::StaleHandle(handle)))?;
        let refs = obj.refs;
        match refs {
            RefCount::NotCounted => Err(violation(ArenaError::NotRefCounted(handle))),
            RefCount::Counted(n) if n > 1 => {
                obj.refs = RefCount::Counted(n - 1);
                Ok(n - 1)
            }
            RefCount::Counted(_) => {
                if let Some(mut obj) = self.objects.remove(handle) {
                    obj.refs = RefCount::NotCounted;
                    self.release(obj);
                }
                Ok(0)
            }
        }
    }

    /// Current reference count (0 on the null handle).
    pub fn ref_count(&self, handle: impl Into<Option<ObjHandle>>) -> Result<u32, ArenaError> {
        let Some(handle) = handle.into() else {
            return Ok(0);
        };
        match self.live(handle)?.refs {
            RefCount::Counted(n) => Ok(n),
            RefCount::NotCounted => Err(violation(ArenaError::NotRefCounted(handle))),
        }
    }

    pub fn is_ref_counted(&self, handle: ObjHandle) -> Result<bool, ArenaError> {
        Ok(matches!(self.live(handle)?.refs, RefCount::Counted(_)))
    }

    pub fn get(&self, handle: ObjHandle) -> Result<&[u8], ArenaError> {
        Ok(&self.live(handle)?.data)
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> Result<&mut [u8], ArenaError> {
        self.objects
            .get_mut(handle)
            .map(|obj| &mut *obj.data)
            .ok_or_else(|| violation(ArenaError::StaleHandle(handle)))
    }

    pub fn object_type(&self, handle: ObjHandle) -> Result<ObjectTypeId, ArenaError> {
        Ok(self.live(handle)?.type_id)
    }

    /// Payload length of a live object.
    pub fn len(&self, handle: ObjHandle) -> Result<usize, ArenaError> {
        Ok(self.live(handle)?.data.len())
    }

    pub fn is_live(&self, handle: ObjHandle) -> bool {
        self.objects.get(handle).is_some()
    }

    /// Number of objects currently handed out.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn is_registered(&self, id: ObjectTypeId) -> bool {
        self.entry(id).is_some()
    }

    pub fn descriptor(&self, id: ObjectTypeId) -> Option<&ObjectType> {
        self.entry(id).map(|e| &e.descriptor)
    }

    pub fn type_name(&self, id: ObjectTypeId) -> &str {
        self.entry(id)
            .map(|e| e.descriptor.name.as_str())
            .unwrap_or(UNKNOWN_TYPE_NAME)
    }

    pub fn type_stats(&self, id: ObjectTypeId) -> Option<TypeStats> {
        self.entry(id).map(|e| e.stats)
    }

    pub fn stats(&self) -> ArenaStats {
        self.totals
    }

    /// Dump the usage table through the memory log category.
    pub fn log_usage(&self) {
        let t = &self.totals;
        log::info!(
            target: targets::MEMORY,
            "arena: bytes={} (max {}) objects={} (max {}) in_use={} (max {})",
            t.bytes_allocated,
            t.max_bytes,
            t.objects,
            t.max_objects,
            t.in_use,
            t.max_in_use
        );
        for entry in self.types.iter().flatten() {
            let s = &entry.stats;
            log::info!(
                target: targets::MEMORY,
                "  type {:>3} {:<35} size={:<6} bytes={:<8} objects={:<6} in_use={:<6} in_pool={:<6} sys={} hits={}",
                entry.descriptor.id,
                entry.descriptor.name,
                entry.descriptor.size,
                s.bytes_allocated,
                s.objects,
                s.in_use,
                s.in_pool,
                s.system_allocs,
                s.pool_hits
            );
        }
    }

    fn entry(&self, id: ObjectTypeId) -> Option<&TypeEntry> {
        self.types.get(id.slot()?)?.as_ref()
    }

    fn live(&self, handle: ObjHandle) -> Result<&LiveObject, ArenaError> {
        self.objects
            .get(handle)
            .ok_or_else(|| violation(ArenaError::StaleHandle(handle)))
    }

    fn checkout(&mut self, id: ObjectTypeId, refs: RefCount) -> Result<ObjHandle, ArenaError> {
        let entry = match id.slot().and_then(|slot| self.types[slot].as_mut()) {
            Some(entry) if !id.is_raw_block() => entry,
            _ => return Err(violation(ArenaError::UnknownType(id))),
        };

        let data = match entry.pool.pop() {
            Some(mut buf) => {
                buf.fill(0);
                entry.stats.in_pool -= 1;
                entry.stats.pool_hits += 1;
                buf
            }
            None => {
                let size = entry.descriptor.size;
                entry.stats.system_allocs += 1;
                on_grow(&mut entry.stats, &mut self.totals, size + OBJECT_HEADER_LEN);
                zeroed(size)
            }
        };
        on_checkout(&mut entry.stats, &mut self.totals);

        Ok(self.objects.insert(LiveObject {
            type_id: id,
            refs,
            data,
        }))
    }

    fn checkout_raw(&mut self, len: usize, refs: RefCount) -> Option<ObjHandle> {
        if len == 0 {
            return None;
        }
        let entry = self.types[0].get_or_insert_with(|| TypeEntry {
            descriptor: ObjectType::new(RAW_BLOCK_TYPE, RAW_BLOCK_NAME, 0, 0),
            stats: TypeStats::default(),
            pool: Vec::new(),
        });
        entry.stats.system_allocs += 1;
        on_grow(&mut entry.stats, &mut self.totals, len + OBJECT_HEADER_LEN);
        on_checkout(&mut entry.stats, &mut self.totals);

        Some(self.objects.insert(LiveObject {
            type_id: RAW_BLOCK_TYPE,
            refs,
            data: zeroed(len),
        }))
    }

    fn release(&mut self, obj: LiveObject) {
        let Some(entry) = obj.type_id.slot().and_then(|slot| self.types[slot].as_mut()) else {
            return;
        };
        on_checkin(&mut entry.stats, &mut self.totals);

        let keep = !obj.type_id.is_raw_block()
            && !self.config.disable_pool_cache
            && entry.pool.len() < entry.descriptor.threshold;
        if keep {
            entry.pool.push(obj.data);
            entry.stats.in_pool += 1;
        } else {
            on_shrink(&mut entry.stats, &mut self.totals, obj.data.len() + OBJECT_HEADER_LEN);
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: ObjectTypeId = ObjectTypeId(7);

    fn arena_with_msg(threshold: usize, initial: usize) -> Arena {
        let mut arena = Arena::new();
        arena
            .register_type(MSG, "message", 64, threshold, initial)
            .expect("register message type");
        arena
    }

    #[test]
    fn test_register_rejections() {
        let mut arena = arena_with_msg(0, 0);
        assert_eq!(
            arena.register_type(MSG, "again", 64, 0, 0),
            Err(ArenaError::AlreadyRegistered(MSG))
        );
        assert_eq!(
            arena.register_type(ObjectTypeId(8), "empty", 0, 0, 0),
            Err(ArenaError::ZeroSize(ObjectTypeId(8)))
        );
        assert_eq!(
            arena.register_type(ObjectTypeId(200), "far", 8, 0, 0),
            Err(ArenaError::TypeOutOfRange(ObjectTypeId(200)))
        );
        assert_eq!(
            arena.register_type(RAW_BLOCK_TYPE, "blocks", 8, 1, 0),
            Err(ArenaError::RawBlockPool)
        );
        assert_eq!(
            arena.allocate(ObjectTypeId(9)),
            Err(ArenaError::UnknownType(ObjectTypeId(9)))
        );
        assert_eq!(arena.type_name(ObjectTypeId(9)), UNKNOWN_TYPE_NAME);
        assert_eq!(arena.type_name(MSG), "message");
    }

    #[test]
    fn test_pool_reuse_up_to_threshold() {
        let mut arena = arena_with_msg(2, 0);

        let handles: Vec<_> = (0..3).map(|_| arena.allocate(MSG).expect("allocate")).collect();
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.in_use, 3);
        assert_eq!(stats.system_allocs, 3);

        for h in handles {
            arena.dispose(h).expect("dispose");
        }
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.in_pool, 2);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.objects, 2);

        let _first = arena.allocate(MSG).expect("allocate from pool");
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.system_allocs, 3);
        assert_eq!(stats.pool_hits, 1);
        assert_eq!(stats.in_pool, 1);

        let _second = arena.allocate(MSG).expect("allocate from pool");
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.pool_hits, 2);
        assert_eq!(stats.system_allocs, 3);
        assert_eq!(stats.in_pool, 0);

        // Pool drained: the third comes from the system.
        let _third = arena.allocate(MSG).expect("allocate from system");
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.pool_hits, 2);
        assert_eq!(stats.system_allocs, 4);
        assert_eq!(stats.in_use, 3);
    }

    #[test]
    fn test_pooled_storage_is_zeroed() {
        let mut arena = arena_with_msg(1, 0);
        let h = arena.allocate(MSG).expect("allocate");
        arena.get_mut(h).expect("live").fill(0xab);
        arena.dispose(h).expect("dispose");

        let h = arena.allocate(MSG).expect("reuse");
        assert!(arena.get(h).expect("live").iter().all(|&b| b == 0));
        assert_eq!(arena.len(h), Ok(64));
    }

    #[test]
    fn test_prepopulated_pool() {
        let mut arena = arena_with_msg(4, 3);
        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.in_pool, 3);
        assert_eq!(stats.objects, 3);
        assert_eq!(stats.in_use, 0);

        let _ = arena.allocate(MSG).expect("allocate");
        assert_eq!(arena.type_stats(MSG).expect("stats").pool_hits, 1);
    }

    #[test]
    fn test_disable_pool_cache() {
        let mut arena = Arena::with_config(&ArenaConfig {
            disable_pool_cache: true,
        });
        arena.register_type(MSG, "message", 16, 8, 0).expect("register");
        let h = arena.allocate(MSG).expect("allocate");
        arena.dispose(h).expect("dispose");

        let stats = arena.type_stats(MSG).expect("stats");
        assert_eq!(stats.in_pool, 0);
        assert_eq!(stats.objects, 0);
        assert_eq!(stats.bytes_allocated, 0);
    }

    #[test]
    fn test_double_dispose_is_detected() {
        let mut arena = arena_with_msg(2, 0);
        let h = arena.allocate(MSG).expect("allocate");
        arena.dispose(h).expect("dispose");

        assert_eq!(arena.dispose(h), Err(ArenaError::StaleHandle(h)));
        assert_eq!(arena.type_stats(MSG).expect("stats").in_pool, 1);

        // The slot is reused; the old handle must not reach the new object.
        let fresh = arena.allocate(MSG).expect("allocate");
        assert_eq!(fresh.index(), h.index());
        assert_eq!(arena.dispose(h), Err(ArenaError::StaleHandle(h)));
        assert!(arena.is_live(fresh));
    }

    #[test]
    fn test_dispose_null_is_noop() {
        let mut arena = Arena::new();
        assert_eq!(arena.dispose(None), Ok(()));
        assert_eq!(arena.dec_ref(None), Ok(0));
        assert_eq!(arena.ref_count(None), Ok(0));
    }

    #[test]
    fn test_raw_blocks() {
        let mut arena = Arena::new();
        assert_eq!(arena.allocate_raw(0), None);

        let h = arena.allocate_raw(100).expect("block");
        assert_eq!(arena.object_type(h), Ok(RAW_BLOCK_TYPE));
        assert_eq!(arena.len(h), Ok(100));
        assert_eq!(arena.type_name(RAW_BLOCK_TYPE), RAW_BLOCK_NAME);

        arena.dispose(h).expect("dispose");
        let stats = arena.type_stats(RAW_BLOCK_TYPE).expect("stats");
        assert_eq!(stats.in_pool, 0);
        assert_eq!(stats.bytes_allocated, 0);
        assert_eq!(arena.stats().objects, 0);
    }

    #[test]
    fn test_copy_preserves_type_and_length() {
        let mut arena = arena_with_msg(0, 0);
        let h = arena.allocate(MSG).expect("allocate");
        arena.get_mut(h).expect("live")[..4].copy_from_slice(b"ping");

        let dup = arena.copy(h).expect("copy");
        assert_ne!(dup, h);
        assert_eq!(arena.object_type(dup), Ok(MSG));
        assert_eq!(arena.get(dup).expect("live"), arena.get(h).expect("live"));
        assert_eq!(arena.is_ref_counted(dup), Ok(false));

        let block = arena.allocate_raw(5).expect("block");
        arena.get_mut(block).expect("live").copy_from_slice(b"hello");
        let dup = arena.copy(block).expect("copy block");
        assert_eq!(arena.get(dup).expect("live"), b"hello");
    }

    #[test]
    fn test_ref_counted_lifecycle() {
        let mut arena = arena_with_msg(1, 0);
        let h = arena.allocate_ref_counted(MSG).expect("allocate");
        assert_eq!(arena.ref_count(h), Ok(1));

        let n = 5;
        for i in 0..n {
            assert_eq!(arena.inc_ref(h), Ok(i + 2));
        }
        assert_eq!(arena.dispose(h), Err(ArenaError::StillReferenced { handle: h, count: 6 }));

        for i in (0..=n).rev() {
            assert_eq!(arena.dec_ref(h), Ok(i));
        }
        assert!(!arena.is_live(h));
        assert_eq!(arena.dec_ref(h), Err(ArenaError::StaleHandle(h)));
        assert_eq!(arena.type_stats(MSG).expect("stats").in_pool, 1);
    }

    #[test]
    fn test_ref_ops_on_uncounted_object() {
        let mut arena = arena_with_msg(0, 0);
        let h = arena.allocate(MSG).expect("allocate");
        assert_eq!(arena.inc_ref(h), Err(ArenaError::NotRefCounted(h)));
        assert_eq!(arena.dec_ref(h), Err(ArenaError::NotRefCounted(h)));
        assert_eq!(arena.ref_count(h), Err(ArenaError::NotRefCounted(h)));
        assert!(arena.is_live(h));
    }

    #[test]
    fn test_in_use_tracks_random_sequences() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let mut arena = arena_with_msg(3, 0);
        let mut live = Vec::new();

        for _ in 0..500 {
            if live.is_empty() || rng.bool() {
                live.push(arena.allocate(MSG).expect("allocate"));
            } else {
                let h = live.swap_remove(rng.usize(..live.len()));
                arena.dispose(h).expect("dispose");
            }
            let stats = arena.type_stats(MSG).expect("stats");
            assert_eq!(stats.in_use, live.len());
            assert!(stats.in_pool <= 3);
            assert_eq!(stats.objects, stats.in_use + stats.in_pool);
        }
        assert_eq!(arena.live_objects(), live.len());
    }
}
