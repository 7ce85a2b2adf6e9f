use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use rapier3d::na::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::{
    CCDSolver, Collider, ColliderBuilder, ColliderHandle, ColliderSet, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase,
    PhysicsPipeline, QueryFilter, QueryPipeline, Ray, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet,
};

use super::backend::{BodyState, ColliderBounds, PhysicsBackend, RayHit};
use super::components::{BodyKind, Shape};
use super::config::PhysicsConfig;
use crate::ecs::Entity;

/// What a rapier body was built from; a change means it is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tracked {
    handle: RigidBodyHandle,
    kind: BodyKind,
    shape: Shape,
    inv_mass: f32,
}

/// Rigid body dynamics with contacts, backed by rapier.
///
/// The rapier world persists across steps and mirrors the stepper's body list:
/// bodies missing from a step are removed, new ones are inserted, and any
/// position or velocity the simulation changed between steps is pushed in
/// before stepping. Every collider carries its entity in `user_data` (offset
/// by one, zero marks the ground plane).
pub struct RapierBackend {
    config: PhysicsConfig,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    tracked: BTreeMap<Entity, Tracked>,
    ground: Option<ColliderHandle>,
}

impl RapierBackend {
    pub fn new(config: PhysicsConfig) -> Self {
        let mut colliders = ColliderSet::new();
        let ground = config.ground_height.map(|height| {
            colliders.insert(
                ColliderBuilder::halfspace(Vector3::y_axis())
                    .translation(Vector3::new(0.0, height, 0.0))
                    .restitution(config.restitution)
                    .friction(config.friction),
            )
        });

        Self {
            config,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            tracked: BTreeMap::new(),
            ground,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    /// Number of bodies currently mirrored in the rapier world.
    pub fn body_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn has_ground(&self) -> bool {
        self.ground.is_some()
    }

    fn insert(&mut self, body: &BodyState) -> Tracked {
        let builder = match body.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic().ccd_enabled(true),
        };
        let handle = self.bodies.insert(
            builder
                .position(isometry(body.position, body.rotation))
                .linvel(vector(body.linear_velocity))
                .angvel(vector(body.angular_velocity))
                .linear_damping(self.config.linear_damping),
        );

        let collider = match body.shape {
            Shape::Sphere { radius } => ColliderBuilder::ball(radius),
            Shape::Box { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
        }
        .restitution(self.config.restitution)
        .friction(self.config.friction)
        .user_data(body.entity.to_bits() as u128 + 1);
        let collider = if body.inv_mass > 0.0 {
            collider.mass(1.0 / body.inv_mass)
        } else {
            collider
        };
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        Tracked {
            handle,
            kind: body.kind,
            shape: body.shape,
            inv_mass: body.inv_mass,
        }
    }

    fn remove(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Mirrors `bodies` into the rapier world.
    fn sync(&mut self, bodies: &[BodyState]) {
        // Bodies arrive sorted by index with at most one handle per index.
        let gone: Vec<(Entity, RigidBodyHandle)> = self
            .tracked
            .iter()
            .filter(|(entity, _)| {
                bodies
                    .binary_search_by_key(&entity.index(), |b| b.entity.index())
                    .map_or(true, |i| bodies[i].entity != **entity)
            })
            .map(|(entity, t)| (*entity, t.handle))
            .collect();
        for (entity, handle) in gone {
            self.tracked.remove(&entity);
            self.remove(handle);
        }

        for body in bodies {
            let existing = self.tracked.get(&body.entity).copied();
            match existing {
                Some(t)
                    if t.kind == body.kind
                        && t.shape == body.shape
                        && t.inv_mass == body.inv_mass =>
                {
                    let rb = &mut self.bodies[t.handle];
                    let pose = isometry(body.position, body.rotation);
                    if *rb.position() != pose {
                        rb.set_position(pose, true);
                    }
                    let linvel = vector(body.linear_velocity);
                    if *rb.linvel() != linvel {
                        rb.set_linvel(linvel, true);
                    }
                    let angvel = vector(body.angular_velocity);
                    if *rb.angvel() != angvel {
                        rb.set_angvel(angvel, true);
                    }
                }
                stale => {
                    if let Some(t) = stale {
                        self.remove(t.handle);
                    }
                    let tracked = self.insert(body);
                    self.tracked.insert(body.entity, tracked);
                }
            }
        }
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsBackend for RapierBackend {
    fn name(&self) -> &'static str {
        "rapier"
    }

    fn integrate(&mut self, bodies: &mut [BodyState], dt: f32) {
        self.params.dt = dt;
        self.sync(bodies);

        self.pipeline.step(
            &vector(self.config.gravity),
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &(),
        );
        self.queries.update(&self.colliders);

        let max_speed = self.config.max_speed;
        for body in bodies.iter_mut() {
            let Some(t) = self.tracked.get(&body.entity) else {
                continue;
            };
            let rb = &mut self.bodies[t.handle];

            let mut linvel = vec3(rb.linvel());
            if linvel.is_finite() && linvel.length_squared() > max_speed * max_speed {
                linvel = linvel.normalize() * max_speed;
                rb.set_linvel(vector(linvel), false);
            }

            let q = rb.rotation();
            body.position = vec3(rb.translation());
            body.rotation = Quat::from_xyzw(q.i, q.j, q.k, q.w);
            body.linear_velocity = linvel;
            body.angular_velocity = vec3(rb.angvel());
        }
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        let len = delta.length();
        if len <= f32::EPSILON || !len.is_finite() {
            return None;
        }
        let dir = delta / len;

        let ray = Ray::new(Point3::new(from.x, from.y, from.z), vector(dir));
        let bodies_only = |_: ColliderHandle, c: &Collider| c.user_data != 0;
        let filter = QueryFilter::default().predicate(&bodies_only);
        let (handle, distance) =
            self.queries
                .cast_ray(&self.bodies, &self.colliders, &ray, len, true, filter)?;

        let entity = entity_of(self.colliders.get(handle)?.user_data)?;
        Some(RayHit {
            entity,
            point: from + dir * distance,
            distance,
        })
    }

    fn collider_bounds(&self, out: &mut Vec<ColliderBounds>) {
        for (_, collider) in self.colliders.iter() {
            let Some(entity) = entity_of(collider.user_data) else {
                continue;
            };
            let aabb = collider.compute_aabb();
            out.push(ColliderBounds {
                entity,
                min: Vec3::new(aabb.mins.x, aabb.mins.y, aabb.mins.z),
                max: Vec3::new(aabb.maxs.x, aabb.maxs.y, aabb.maxs.z),
            });
        }
    }
}

fn entity_of(user_data: u128) -> Option<Entity> {
    let bits = u64::try_from(user_data.checked_sub(1)?).ok()?;
    Some(Entity::from_bits(bits))
}

#[inline]
fn vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

#[inline]
fn vec3(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn isometry(position: Vec3, rotation: Quat) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::new_unchecked(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z)),
    )
}
