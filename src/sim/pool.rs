//! Fixed-capacity entity pool with weak generational handles
//!
//! Slots are never moved; a freed slot is chained onto a free list and reused
//! before the high-water mark grows. Entity uids are world-unique and never
//! reused, so a handle captured before a slot was recycled can always be
//! detected as stale.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_ENTITIES;
use crate::sim::entity::Entity;

/// Weak reference to a pooled entity. Resolves only while the slot still
/// holds the same incarnation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHandle {
    pub uid: u64,
    pub slot: u32,
}

impl EntityHandle {
    /// The null handle; uid 0 is never issued
    pub const NONE: EntityHandle = EntityHandle { uid: 0, slot: 0 };

    pub fn is_set(self) -> bool {
        self.uid > 0
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        EntityHandle::NONE
    }
}

pub struct EntityPool {
    slots: Vec<Entity>,
    free_head: Option<u32>,
    /// High-water mark: slots at or above this index have never been used
    allocated: usize,
    next_uid: u64,
}

impl EntityPool {
    pub fn new() -> Self {
        Self {
            slots: vec![Entity::default(); MAX_ENTITIES],
            free_head: None,
            allocated: 0,
            next_uid: 0,
        }
    }

    /// Claim a slot: free list first, then the high-water mark.
    ///
    /// Panics when the pool is exhausted; running out of entities is a
    /// content bug, not a runtime condition.
    pub fn spawn(&mut self) -> u32 {
        let slot = match self.free_head {
            Some(i) => {
                self.free_head = self.slots[i as usize].free_next;
                i
            }
            None => {
                assert!(
                    self.allocated < MAX_ENTITIES,
                    "entity pool exhausted ({MAX_ENTITIES} slots)"
                );
                let i = self.allocated as u32;
                self.allocated += 1;
                i
            }
        };

        self.next_uid += 1;
        self.slots[slot as usize] = Entity {
            live: true,
            uid: self.next_uid,
            ..Default::default()
        };

        slot
    }

    /// Release a slot back to the free list. The rest of the entity state is
    /// left in place until the slot is reused.
    pub fn die(&mut self, slot: u32) {
        let ent = &mut self.slots[slot as usize];
        ent.live = false;
        ent.free_next = self.free_head;
        self.free_head = Some(slot);
    }

    pub fn handle(&self, slot: u32) -> EntityHandle {
        EntityHandle {
            uid: self.slots[slot as usize].uid,
            slot,
        }
    }

    /// Dereference a weak handle; `None` when unset, dead, or recycled
    pub fn resolve(&self, handle: EntityHandle) -> Option<u32> {
        if !handle.is_set() {
            return None;
        }
        let ent = &self.slots[handle.slot as usize];
        (ent.live && ent.uid == handle.uid).then_some(handle.slot)
    }

    /// Linear scan over used slots for a live entity with this uid
    pub fn slot_from_uid(&self, uid: u64) -> Option<u32> {
        (0..self.allocated).find(|&i| {
            let ent = &self.slots[i];
            ent.live && ent.uid == uid
        }).map(|i| i as u32)
    }

    pub fn get(&self, slot: u32) -> &Entity {
        &self.slots[slot as usize]
    }

    pub fn get_mut(&mut self, slot: u32) -> &mut Entity {
        &mut self.slots[slot as usize]
    }

    /// Number of slots ever claimed (iteration bound)
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn iter_slots(&self) -> impl Iterator<Item = u32> {
        0..self.allocated as u32
    }
}

impl Default for EntityPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_spawn_reuses_freed_slot() {
        let mut pool = EntityPool::new();
        let a = pool.spawn();
        let b = pool.spawn();
        assert_eq!((a, b), (0, 1));

        pool.die(a);
        let c = pool.spawn();
        assert_eq!(c, a);
        assert_eq!(pool.allocated(), 2);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut pool = EntityPool::new();
        let slot = pool.spawn();
        let h = pool.handle(slot);
        assert_eq!(pool.resolve(h), Some(slot));

        pool.die(slot);
        assert_eq!(pool.resolve(h), None);

        // Same slot, new incarnation: old handle must still miss
        let reused = pool.spawn();
        assert_eq!(reused, slot);
        assert_eq!(pool.resolve(h), None);
        assert_eq!(pool.resolve(pool.handle(reused)), Some(slot));
    }

    #[test]
    fn test_null_handle_never_resolves() {
        let pool = EntityPool::new();
        assert_eq!(pool.resolve(EntityHandle::NONE), None);
    }

    #[test]
    fn test_slot_from_uid() {
        let mut pool = EntityPool::new();
        let a = pool.spawn();
        let b = pool.spawn();
        let uid_b = pool.get(b).uid;

        assert_eq!(pool.slot_from_uid(uid_b), Some(b));
        pool.die(a);
        assert_eq!(pool.slot_from_uid(pool.handle(a).uid), None);
        assert_eq!(pool.slot_from_uid(9999), None);
    }

    #[test]
    #[should_panic(expected = "entity pool exhausted")]
    fn test_capacity_overflow_panics() {
        let mut pool = EntityPool::new();
        for _ in 0..=MAX_ENTITIES {
            pool.spawn();
        }
    }

    proptest! {
        /// uids stay strictly increasing across arbitrary spawn/die churn
        #[test]
        fn prop_uids_monotonic(ops in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut pool = EntityPool::new();
            let mut last_uid = 0u64;
            let mut live: Vec<u32> = Vec::new();

            for spawn in ops {
                if spawn || live.is_empty() {
                    let slot = pool.spawn();
                    let uid = pool.get(slot).uid;
                    prop_assert!(uid > last_uid);
                    last_uid = uid;
                    live.push(slot);
                } else {
                    let slot = live.pop().unwrap();
                    pool.die(slot);
                }
            }
        }
    }
}
