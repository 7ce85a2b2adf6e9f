use std::any::Any;

use super::Entity;

/// Marker for types that can be stored as components.
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

const EMPTY: u32 = u32::MAX;

/// Dense storage for one component type (sparse set).
///
/// Performance characteristics:
/// - `insert`, `remove`, `get` are O(1)
/// - iteration walks a packed array; order is insertion order, perturbed by
///   swap-removal compaction, and carries no meaning
///
/// `epoch` increments on every structural change (new entry or removal). Value
/// replacement and in-place mutation leave it untouched.
pub struct ComponentTable<T> {
    sparse: Vec<u32>,
    entities: Vec<Entity>,
    values: Vec<T>,
    epoch: u64,
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            values: Vec::new(),
            epoch: 0,
        }
    }
}

impl<T> ComponentTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Entities holding this component, in storage order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == EMPTY {
            return None;
        }
        let dense = slot as usize;
        // The full handle is compared so a recycled index never sees old data.
        (self.entities[dense] == entity).then_some(dense)
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Inserts or replaces the value for `entity`; returns the replaced value.
    ///
    /// An entry left at the same index by an older generation is evicted
    /// first, so a slot never holds two handles.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(dense) = self.dense_index(entity) {
            return Some(std::mem::replace(&mut self.values[dense], value));
        }

        let i = entity.index() as usize;
        if i >= self.sparse.len() {
            self.sparse.resize(i + 1, EMPTY);
        }
        if self.sparse[i] != EMPTY {
            let stale = self.entities[self.sparse[i] as usize];
            self.remove(stale);
        }

        self.sparse[i] = self.values.len() as u32;
        self.entities.push(entity);
        self.values.push(value);
        self.epoch += 1;
        None
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let dense = self.dense_index(entity)?;

        self.sparse[entity.index() as usize] = EMPTY;
        let last = self.values.len() - 1;
        if dense != last {
            let moved = self.entities[last];
            self.sparse[moved.index() as usize] = dense as u32;
        }

        self.entities.swap_remove(dense);
        self.epoch += 1;
        Some(self.values.swap_remove(dense))
    }

    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|i| &self.values[i])
    }

    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity).map(|i| &mut self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.values.iter_mut())
    }
}

/// Type-erased view of a table used by the store for bookkeeping.
pub(crate) trait AnyTable: Send + Sync {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn epoch(&self) -> u64;
    fn entities(&self) -> &[Entity];
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyTable for ComponentTable<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        ComponentTable::len(self)
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
