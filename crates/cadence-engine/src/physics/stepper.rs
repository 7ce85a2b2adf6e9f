use std::collections::BTreeSet;

use thiserror::Error;

use super::backend::{BodyState, PhysicsBackend};
use super::components::{RigidBody, Transform};
use super::snapshot::Snapshot;
use crate::ecs::{Entity, EntityStore, StoreError};

/// Largest difference tolerated between the fixed step and the requested one.
const DT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("physics stepped with dt {got}, fixed step is {expected}")]
    VariableTimestep { expected: f64, got: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a single fixed step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub step_index: u64,
    /// Bodies handed to the backend.
    pub integrated: usize,
    /// Bodies isolated by this step because their state went non-finite.
    pub diverged: Vec<Entity>,
}

/// Advances every `(Transform, RigidBody)` entity by exactly one fixed step.
///
/// Sync is one-directional per phase: the store is read into the backend's
/// body list, the backend integrates, then results are written back. Nothing
/// touches the store while the backend holds the bodies.
pub struct PhysicsStepper<B: PhysicsBackend> {
    backend: B,
    fixed_dt: f64,
    bodies: Vec<BodyState>,
    isolated: BTreeSet<Entity>,
    previous: Snapshot,
    current: Snapshot,
    steps: u64,
}

impl<B: PhysicsBackend> PhysicsStepper<B> {
    pub fn new(backend: B, fixed_dt: f64) -> Self {
        log::debug!("physics backend '{}' at dt {fixed_dt}", backend.name());
        Self {
            backend,
            fixed_dt,
            bodies: Vec::new(),
            isolated: BTreeSet::new(),
            previous: Snapshot::default(),
            current: Snapshot::default(),
            steps: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Snapshot from the step before the most recent one.
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    /// Snapshot from the most recent step.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Entities excluded from stepping after diverging.
    pub fn isolated(&self) -> impl Iterator<Item = Entity> + '_ {
        self.isolated.iter().copied()
    }

    pub fn is_isolated(&self, entity: Entity) -> bool {
        self.isolated.contains(&entity)
    }

    /// Lets an isolated body take part in stepping again, typically after the
    /// caller has repaired its state. Returns `false` if it was not isolated.
    pub fn reinstate(&mut self, entity: Entity) -> bool {
        self.isolated.remove(&entity)
    }

    /// Resets both snapshots to the store's present state, so the next frame
    /// renders without interpolating from stale positions.
    pub fn sync_snapshot(&mut self, store: &EntityStore) {
        self.current = Snapshot::capture(store, self.steps);
        self.previous = self.current.clone();
    }

    /// Runs one fixed step of `dt` seconds, which must equal the fixed step.
    pub fn step(&mut self, store: &mut EntityStore, dt: f64) -> Result<StepReport, StepError> {
        if (dt - self.fixed_dt).abs() > DT_TOLERANCE {
            return Err(StepError::VariableTimestep {
                expected: self.fixed_dt,
                got: dt,
            });
        }

        self.isolated.retain(|e| store.is_alive(*e));

        // store -> backend; bodies already broken never reach the backend
        let mut diverged = Vec::new();
        self.bodies.clear();
        for (entity, (transform, body)) in &store.each::<(Transform, RigidBody)>() {
            if self.isolated.contains(&entity) {
                continue;
            }
            let state = BodyState::new(entity, transform, body);
            if state.is_finite() {
                self.bodies.push(state);
            } else {
                diverged.push(entity);
            }
        }
        self.bodies.sort_unstable_by_key(|b| b.entity.index());
        for &entity in &diverged {
            log::warn!("{entity:?} entered step {} non-finite; isolating", self.steps);
            self.isolated.insert(entity);
        }

        self.backend.integrate(&mut self.bodies, dt as f32);

        // backend -> store
        for state in &self.bodies {
            if !state.is_finite() {
                log::warn!("{:?} diverged during step {}; isolating", state.entity, self.steps);
                self.isolated.insert(state.entity);
                diverged.push(state.entity);
                continue;
            }

            let transform = store.get_mut::<Transform>(state.entity)?;
            transform.position = state.position;
            transform.rotation = state.rotation;

            let body = store.get_mut::<RigidBody>(state.entity)?;
            body.linear_velocity = state.linear_velocity;
            body.angular_velocity = state.angular_velocity;
        }

        let step_index = self.steps;
        self.steps += 1;
        self.previous = std::mem::replace(&mut self.current, Snapshot::capture(store, self.steps));

        Ok(StepReport {
            step_index,
            integrated: self.bodies.len(),
            diverged,
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::physics::{BuiltinIntegrator, Shape};

    const DT: f64 = 1.0 / 60.0;

    fn spawn(store: &mut EntityStore, y: f32) -> Entity {
        let e = store.create();
        store
            .add_component(e, Transform::from_position(Vec3::new(0.0, y, 0.0)))
            .unwrap();
        store
            .add_component(e, RigidBody::dynamic(1.0, Shape::Sphere { radius: 0.5 }))
            .unwrap();
        e
    }

    #[test]
    fn rejects_variable_dt() {
        let mut store = EntityStore::new();
        let mut stepper = PhysicsStepper::new(BuiltinIntegrator::default(), DT);
        let err = stepper.step(&mut store, 0.03).unwrap_err();
        assert!(matches!(err, StepError::VariableTimestep { .. }));
        assert_eq!(stepper.steps(), 0);
    }

    #[test]
    fn step_writes_back_and_rotates_snapshots() {
        let mut store = EntityStore::new();
        let e = spawn(&mut store, 10.0);
        let mut stepper = PhysicsStepper::new(BuiltinIntegrator::default(), DT);

        stepper.step(&mut store, DT).unwrap();
        let after_one = store.get::<Transform>(e).unwrap().position.y;
        assert!(after_one < 10.0);

        stepper.step(&mut store, DT).unwrap();
        let prev = stepper.previous().get(e).unwrap().position.y;
        let curr = stepper.current().get(e).unwrap().position.y;
        assert_eq!(prev, after_one);
        assert_eq!(curr, store.get::<Transform>(e).unwrap().position.y);
        assert_eq!(stepper.current().step(), 2);
    }

    #[test]
    fn non_finite_body_is_isolated() {
        let mut store = EntityStore::new();
        let good = spawn(&mut store, 10.0);
        let bad = spawn(&mut store, 10.0);
        store.get_mut::<RigidBody>(bad).unwrap().linear_velocity = Vec3::new(f32::NAN, 0.0, 0.0);

        let mut stepper = PhysicsStepper::new(BuiltinIntegrator::default(), DT);
        let report = stepper.step(&mut store, DT).unwrap();
        assert_eq!(report.diverged, vec![bad]);
        assert!(stepper.is_isolated(bad));
        assert_eq!(store.get::<Transform>(bad).unwrap().position.y, 10.0);

        let report = stepper.step(&mut store, DT).unwrap();
        assert_eq!(report.integrated, 1);
        assert!(report.diverged.is_empty());
        assert!(store.get::<Transform>(good).unwrap().position.y < 10.0);
    }

    #[test]
    fn infinite_velocity_diverges_before_integration() {
        let mut store = EntityStore::new();
        let good = spawn(&mut store, 10.0);
        let runaway = spawn(&mut store, 10.0);
        store.get_mut::<RigidBody>(runaway).unwrap().linear_velocity =
            Vec3::new(f32::INFINITY, 0.0, 0.0);

        let mut stepper = PhysicsStepper::new(BuiltinIntegrator::default(), DT);
        let report = stepper.step(&mut store, DT).unwrap();
        assert_eq!(report.diverged, vec![runaway]);
        assert_eq!(report.integrated, 1);
        assert!(stepper.is_isolated(runaway));
        assert_eq!(store.get::<Transform>(runaway).unwrap().position, Vec3::new(0.0, 10.0, 0.0));
        assert!(store.get::<Transform>(good).unwrap().position.y < 10.0);
    }

    #[test]
    fn destroyed_isolated_body_is_forgotten() {
        let mut store = EntityStore::new();
        let bad = spawn(&mut store, 1.0);
        store.get_mut::<RigidBody>(bad).unwrap().linear_velocity = Vec3::splat(f32::NAN);

        let mut stepper = PhysicsStepper::new(BuiltinIntegrator::default(), DT);
        stepper.step(&mut store, DT).unwrap();
        store.destroy(bad).unwrap();
        stepper.step(&mut store, DT).unwrap();
        assert_eq!(stepper.isolated().count(), 0);
    }
}
