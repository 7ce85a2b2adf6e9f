use std::collections::HashMap;

use super::components::Transform;
use crate::ecs::{Entity, EntityStore};

/// Transforms of every entity at the end of one fixed step.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    step: u64,
    transforms: HashMap<Entity, Transform>,
}

impl Snapshot {
    /// Copies every `Transform` in `store`.
    pub fn capture(store: &EntityStore, step: u64) -> Self {
        let transforms = store
            .each::<(Transform,)>()
            .iter()
            .map(|(e, (t,))| (e, *t))
            .collect();
        Self { step, transforms }
    }

    /// Index of the fixed step this snapshot was taken after.
    #[inline]
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn get(&self, entity: Entity) -> Option<&Transform> {
        self.transforms.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &Transform)> {
        self.transforms.iter().map(|(e, t)| (*e, t))
    }
}
