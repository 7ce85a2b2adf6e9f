use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::entity::Entities;
use super::query::{ComponentSet, Query, QueryCursor};
use super::table::{AnyTable, Component, ComponentTable};
use super::{Entity, StoreError};

/// Owns every live entity and its components.
///
/// Components are stored per type in dense tables keyed by `TypeId`. The store
/// does no scheduling; it is mutated only by the thread driving the frame loop.
#[derive(Default)]
pub struct EntityStore {
    entities: Entities,
    tables: HashMap<TypeId, Box<dyn AnyTable>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entity with no components.
    pub fn create(&mut self) -> Entity {
        self.entities.alloc()
    }

    /// Destroys `entity` and drops all of its components.
    ///
    /// Fails with `StaleReference` if the handle was already destroyed.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), StoreError> {
        if !self.entities.free(entity) {
            return Err(StoreError::StaleReference { entity });
        }

        for table in self.tables.values_mut() {
            table.remove_entity(entity);
        }
        Ok(())
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.live()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.live() == 0
    }

    /// Iterates every live entity in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    /// Attaches `value` to `entity`, returning the previous value if one existed.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Option<T>, StoreError> {
        self.check_alive(entity)?;
        Ok(self.table_or_insert::<T>().insert(entity, value))
    }

    /// Detaches and returns the `T` component of `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, StoreError> {
        self.check_alive(entity)?;
        self.table_mut::<T>()
            .and_then(|t| t.remove(entity))
            .ok_or(StoreError::NotFound {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        self.check_alive(entity)?;
        self.table::<T>()
            .and_then(|t| t.get(entity))
            .ok_or(StoreError::NotFound {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        self.check_alive(entity)?;
        self.table_mut::<T>()
            .and_then(|t| t.get_mut(entity))
            .ok_or(StoreError::NotFound {
                entity,
                component: type_name::<T>(),
            })
    }

    /// Returns `true` if `entity` is alive and carries a `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity) && self.table::<T>().is_some_and(|t| t.contains(entity))
    }

    /// Borrowing view over all entities that carry every component in `Q`.
    ///
    /// The view is lazy and can be iterated any number of times. It borrows the
    /// store, so structural mutation is impossible while it is alive.
    pub fn each<Q: ComponentSet>(&self) -> Query<'_, Q> {
        Query::new(self)
    }

    /// Detached cursor over `Q` that survives across mutable borrows of the
    /// store and fails with `ConcurrentModification` once a spanned table changes
    /// structure.
    pub fn cursor<Q: ComponentSet>(&self) -> QueryCursor<Q> {
        QueryCursor::new(self)
    }

    /// Mutable iteration over a single component type.
    pub fn each_mut<T: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.table_mut::<T>().into_iter().flat_map(|t| t.iter_mut())
    }

    pub fn table<T: Component>(&self) -> Option<&ComponentTable<T>> {
        self.tables
            .get(&TypeId::of::<T>())
            .and_then(|t| t.as_any().downcast_ref())
    }

    pub(crate) fn table_mut<T: Component>(&mut self) -> Option<&mut ComponentTable<T>> {
        self.tables
            .get_mut(&TypeId::of::<T>())
            .and_then(|t| t.as_any_mut().downcast_mut())
    }

    /// Structural epoch of the table for `type_id`; 0 if the table does not exist.
    pub(crate) fn epoch_of(&self, type_id: TypeId) -> u64 {
        self.tables.get(&type_id).map_or(0, |t| t.epoch())
    }

    /// Number of component tables and the total component count, for diagnostics.
    pub fn table_stats(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.tables.values().map(|t| (t.type_name(), t.len()))
    }

    fn table_or_insert<T: Component>(&mut self) -> &mut ComponentTable<T> {
        self.tables
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentTable::<T>::new()))
            .as_any_mut()
            .downcast_mut()
            .unwrap_or_else(|| unreachable!("table keyed by TypeId::of::<T>() holds T"))
    }

    #[inline]
    fn check_alive(&self, entity: Entity) -> Result<(), StoreError> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(StoreError::StaleReference { entity })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Tag;

    #[test]
    fn create_returns_unique_handles() {
        let mut store = EntityStore::new();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn stale_handle_never_resolves() {
        let mut store = EntityStore::new();
        let a = store.create();
        store.add_component(a, Health(10)).unwrap();
        store.destroy(a).unwrap();

        let b = store.create();
        store.add_component(b, Health(99)).unwrap();
        assert_eq!(a.index(), b.index());

        assert_eq!(
            store.get::<Health>(a),
            Err(StoreError::StaleReference { entity: a })
        );
        assert_eq!(store.get::<Health>(b), Ok(&Health(99)));
    }

    #[test]
    fn destroy_twice_reports_stale() {
        let mut store = EntityStore::new();
        let a = store.create();
        store.destroy(a).unwrap();
        assert_eq!(store.destroy(a), Err(StoreError::StaleReference { entity: a }));
    }

    #[test]
    fn missing_component_is_not_found() {
        let mut store = EntityStore::new();
        let a = store.create();
        store.add_component(a, Tag).unwrap();

        let err = store.get::<Health>(a).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity, .. } if entity == a));
        assert!(store.remove_component::<Health>(a).is_err());
    }

    #[test]
    fn destroy_drops_components() {
        let mut store = EntityStore::new();
        let a = store.create();
        store.add_component(a, Health(1)).unwrap();
        store.add_component(a, Tag).unwrap();
        store.destroy(a).unwrap();

        assert_eq!(store.table::<Health>().map(|t| t.len()), Some(0));
        assert_eq!(store.table::<Tag>().map(|t| t.len()), Some(0));
    }

    #[test]
    fn add_component_to_dead_entity_fails() {
        let mut store = EntityStore::new();
        let a = store.create();
        store.destroy(a).unwrap();
        assert_eq!(
            store.add_component(a, Health(3)),
            Err(StoreError::StaleReference { entity: a })
        );
    }

    #[test]
    fn each_mut_updates_in_place() {
        let mut store = EntityStore::new();
        for i in 0..4 {
            let e = store.create();
            store.add_component(e, Health(i)).unwrap();
        }

        for (_, h) in store.each_mut::<Health>() {
            h.0 *= 10;
        }

        let total: i32 = store.each::<(Health,)>().iter().map(|(_, (h,))| h.0).sum();
        assert_eq!(total, 60);
    }

    #[test]
    fn recycled_slot_never_yields_the_dead_handle() {
        let mut store = EntityStore::new();
        let dead = store.create();
        store.destroy(dead).unwrap();
        let live = store.create();
        assert_eq!(dead.index(), live.index());

        // A crate-internal write that skipped the liveness check.
        store.table_or_insert::<u32>().insert(dead, 99);
        store.add_component(live, 7u32).unwrap();

        let seen: Vec<_> = store.each::<(u32,)>().iter().map(|(e, (v,))| (e, *v)).collect();
        assert_eq!(seen, vec![(live, 7)]);
        assert_eq!(store.get::<u32>(dead), Err(StoreError::StaleReference { entity: dead }));
    }

    #[test]
    fn interleaved_create_and_destroy_keeps_handles_unique() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut store = EntityStore::new();
        let mut live: Vec<Entity> = Vec::new();
        let mut ever: HashSet<Entity> = HashSet::new();

        for round in 0..200 {
            for _ in 0..rng.gen_range(0..12) {
                let e = store.create();
                assert!(ever.insert(e), "round {round}: handle {e:?} handed out twice");
                store.add_component(e, Health(round)).unwrap();
                live.push(e);
            }
            for _ in 0..rng.gen_range(0..10) {
                if live.is_empty() {
                    break;
                }
                let e = live.swap_remove(rng.gen_range(0..live.len()));
                store.destroy(e).unwrap();
            }

            let listed: HashSet<Entity> = store.entities().collect();
            assert_eq!(listed.len(), store.len());
            assert_eq!(listed, live.iter().copied().collect());
            let queried: Vec<Entity> = store.each::<(Health,)>().iter().map(|(e, _)| e).collect();
            assert_eq!(queried.len(), live.len());
            assert!(queried.iter().all(|e| store.is_alive(*e)));
        }
    }
}
