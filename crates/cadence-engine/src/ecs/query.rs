//! Multi-component iteration.
//!
//! Two flavours:
//! - [`Query`] borrows the store; the borrow checker rules out mutation while it lives.
//! - [`QueryCursor`] is detached; it records the structural epoch of every table
//!   it spans and refuses to continue once any of them changed.

use std::any::{type_name, TypeId};
use std::marker::PhantomData;

use super::table::{Component, ComponentTable};
use super::{Entity, EntityStore, StoreError};

/// Identity of one table spanned by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl Span {
    fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// A tuple of component types that can be fetched together.
///
/// Implemented for tuples of one to four components.
pub trait ComponentSet: 'static {
    type Item<'a>;
    type Tables<'a>: Copy;

    fn spans() -> Vec<Span>;

    /// Resolves every table; `None` if any of them does not exist yet.
    fn tables(store: &EntityStore) -> Option<Self::Tables<'_>>;

    /// The shortest entity list among the spanned tables.
    fn driver<'a>(tables: &Self::Tables<'a>) -> &'a [Entity];

    fn fetch<'a>(tables: &Self::Tables<'a>, entity: Entity) -> Option<Self::Item<'a>>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            type Item<'a> = ($(&'a $name,)+);
            type Tables<'a> = ($(&'a ComponentTable<$name>,)+);

            fn spans() -> Vec<Span> {
                vec![$(Span::of::<$name>()),+]
            }

            fn tables(store: &EntityStore) -> Option<Self::Tables<'_>> {
                Some(($(store.table::<$name>()?,)+))
            }

            #[allow(non_snake_case)]
            fn driver<'a>(tables: &Self::Tables<'a>) -> &'a [Entity] {
                let ($($name,)+) = *tables;
                let lists = [$($name.entities()),+];
                lists.into_iter().min_by_key(|l| l.len()).unwrap_or(&[])
            }

            #[allow(non_snake_case)]
            fn fetch<'a>(tables: &Self::Tables<'a>, entity: Entity) -> Option<Self::Item<'a>> {
                let ($($name,)+) = *tables;
                Some(($($name.get(entity)?,)+))
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);

/// Lazy, restartable view over entities carrying every component in `Q`.
pub struct Query<'s, Q: ComponentSet> {
    tables: Option<Q::Tables<'s>>,
}

impl<'s, Q: ComponentSet> Query<'s, Q> {
    pub(crate) fn new(store: &'s EntityStore) -> Self {
        Self {
            tables: Q::tables(store),
        }
    }

    /// Starts a fresh pass over the matching entities.
    pub fn iter(&self) -> QueryIter<'s, Q> {
        let driver = self.tables.as_ref().map_or(&[][..], |t| Q::driver(t));
        QueryIter {
            tables: self.tables,
            driver: driver.iter(),
        }
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'q, 's, Q: ComponentSet> IntoIterator for &'q Query<'s, Q> {
    type Item = (Entity, Q::Item<'s>);
    type IntoIter = QueryIter<'s, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct QueryIter<'s, Q: ComponentSet> {
    tables: Option<Q::Tables<'s>>,
    driver: std::slice::Iter<'s, Entity>,
}

impl<'s, Q: ComponentSet> Iterator for QueryIter<'s, Q> {
    type Item = (Entity, Q::Item<'s>);

    fn next(&mut self) -> Option<Self::Item> {
        let tables = self.tables?;
        for &entity in self.driver.by_ref() {
            if let Some(item) = Q::fetch(&tables, entity) {
                return Some((entity, item));
            }
        }
        None
    }
}

/// Detached iteration state over `Q`.
///
/// Holds no borrow, so the owner may keep it across frames or interleave it with
/// `&mut EntityStore` calls. Every step re-validates the structural epochs
/// captured at creation and fails fast with `ConcurrentModification` on mismatch.
pub struct QueryCursor<Q: ComponentSet> {
    spans: Vec<Span>,
    epochs: Vec<u64>,
    position: usize,
    _set: PhantomData<fn() -> Q>,
}

impl<Q: ComponentSet> QueryCursor<Q> {
    pub(crate) fn new(store: &EntityStore) -> Self {
        let spans = Q::spans();
        let epochs = spans.iter().map(|s| store.epoch_of(s.type_id)).collect();
        Self {
            spans,
            epochs,
            position: 0,
            _set: PhantomData,
        }
    }

    /// Checks that no spanned table changed structure since the cursor was made.
    pub fn validate(&self, store: &EntityStore) -> Result<(), StoreError> {
        for (span, &epoch) in self.spans.iter().zip(&self.epochs) {
            if store.epoch_of(span.type_id) != epoch {
                return Err(StoreError::ConcurrentModification {
                    component: span.name,
                });
            }
        }
        Ok(())
    }

    /// Advances to the next matching entity.
    pub fn next<'s>(
        &mut self,
        store: &'s EntityStore,
    ) -> Result<Option<(Entity, Q::Item<'s>)>, StoreError> {
        self.validate(store)?;

        let Some(tables) = Q::tables(store) else {
            return Ok(None);
        };
        let driver = Q::driver(&tables);

        while let Some(&entity) = driver.get(self.position) {
            self.position += 1;
            if let Some(item) = Q::fetch(&tables, entity) {
                return Ok(Some((entity, item)));
            }
        }
        Ok(None)
    }

    /// Rewinds to the first entity. Does not refresh the captured epochs.
    pub fn restart(&mut self) {
        self.position = 0;
    }
}
