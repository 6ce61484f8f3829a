// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generation-checked object handles and the slot table behind them.

use std::fmt;

/// Opaque reference to one live arena object.
///
/// Released slots bump their generation, so a handle kept past dispose is
/// recognized as stale instead of aliasing the slot's next occupant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct ObjHandle {
    index: u32,
    generation: u32,
}

impl ObjHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single word (slot index high, generation low).
    pub fn to_raw(self) -> u64 {
        (u64::from(self.index) << 32) | u64::from(self.generation)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

impl fmt::Debug for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjHandle({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot table with free-list reuse and generation counters.
pub(crate) struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> SlotTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> ObjHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ObjHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ObjHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: ObjHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Take the value out and retire the handle.
    pub fn remove(&mut self, handle: ObjHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table = SlotTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.remove(a), None);
        assert_eq!(table.get(b), Some(&"b"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut table = SlotTable::new();
        let first = table.insert(1u32);
        let _ = table.remove(first);
        let second = table.insert(2u32);

        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(table.get(first), None);
        assert_eq!(table.get(second), Some(&2));
    }

    #[test]
    fn test_raw_round_trip() {
        let mut table = SlotTable::new();
        for _ in 0..3 {
            let h = table.insert(());
            let _ = table.remove(h);
        }
        let h = table.insert(());
        assert_eq!(ObjHandle::from_raw(h.to_raw()), h);
    }
}
