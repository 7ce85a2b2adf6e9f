use super::Entity;

/// Entity store misuse.
///
/// Every variant is a programmer error: callers either hold a handle they should
/// have dropped, ask for data that was never attached, or mutate structure while
/// a cursor is still walking it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The handle's generation no longer matches its slot.
    #[error("stale entity reference {entity:?}")]
    StaleReference { entity: Entity },

    /// The entity is alive but carries no component of the requested type.
    #[error("{entity:?} has no `{component}` component")]
    NotFound {
        entity: Entity,
        component: &'static str,
    },

    /// A table spanned by a live cursor was structurally modified.
    #[error("`{component}` table changed structure while a cursor was iterating it")]
    ConcurrentModification { component: &'static str },
}
