//! Entity handles and the generation-checked slot allocator.
//!
//! Entities are lightweight identifiers consisting of:
//! - an index into the slot arena (reused after destruction)
//! - a generation counter that distinguishes stale handles from live ones

use std::fmt;

/// Generation-checked entity handle.
///
/// Lower 32 bits hold the slot index, upper 32 bits the generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index portion of the handle.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation portion of the handle.
    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw 64-bit representation.
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from `to_bits`. Liveness is the caller's concern.
    #[inline]
    pub(crate) const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

/// Slot arena handing out entity handles.
///
/// Destroyed slots go on a free list and come back with their generation bumped.
/// A slot whose generation would wrap is retired instead of being reused, so an
/// old handle can never alias a new one.
#[derive(Debug, Default)]
pub(crate) struct Entities {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    live: usize,
}

impl Entities {
    pub(crate) fn alloc(&mut self) -> Entity {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let i = index as usize;
            self.alive[i] = true;
            return Entity::new(index, self.generations[i]);
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        Entity::new(index, 0)
    }

    /// Invalidates `entity`. Returns `false` if the handle was already stale.
    pub(crate) fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let i = entity.index() as usize;
        self.alive[i] = false;
        self.live -= 1;

        let next = self.generations[i].wrapping_add(1);
        self.generations[i] = next;

        if next != u32::MAX {
            self.free.push(entity.index());
        }
        true
    }

    #[inline]
    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        let i = entity.index() as usize;
        self.alive.get(i).copied().unwrap_or(false)
            && self.generations[i] == entity.generation()
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Iterates live handles in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Entity::new(i as u32, self.generations[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_packs_index_and_generation() {
        let e = Entity::new(12345, 678);
        assert_eq!(e.index(), 12345);
        assert_eq!(e.generation(), 678);
    }

    #[test]
    fn recycled_slot_bumps_generation() {
        let mut entities = Entities::default();
        let a = entities.alloc();
        assert!(entities.free(a));

        let b = entities.alloc();
        assert_eq!(a.index(), b.index());
        assert_eq!(b.generation(), a.generation() + 1);
        assert!(!entities.is_alive(a));
        assert!(entities.is_alive(b));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut entities = Entities::default();
        let a = entities.alloc();
        assert!(entities.free(a));
        assert!(!entities.free(a));
        assert_eq!(entities.live(), 0);
    }

    #[test]
    fn exhausted_generation_retires_slot() {
        let mut entities = Entities::default();
        let a = entities.alloc();
        entities.generations[a.index() as usize] = u32::MAX - 1;
        let worn = Entity::new(a.index(), u32::MAX - 1);

        assert!(entities.free(worn));
        let b = entities.alloc();
        assert_ne!(b.index(), a.index());
    }
}
