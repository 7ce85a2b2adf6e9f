use glam::{Mat3, Quat, Vec3};

use super::components::{BodyKind, RigidBody, Shape, Transform};
use crate::ecs::Entity;

/// A body as seen by a backend for the duration of one step.
///
/// The stepper pulls these out of the store before the step and pushes them
/// back afterwards; the backend owns them in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub entity: Entity,
    pub kind: BodyKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Zero for static and kinematic bodies.
    pub inv_mass: f32,
    pub shape: Shape,
}

impl BodyState {
    pub fn new(entity: Entity, transform: &Transform, body: &RigidBody) -> Self {
        let kind = body.effective_kind();
        let inv_mass = match kind {
            BodyKind::Dynamic => 1.0 / body.mass,
            _ => 0.0,
        };
        Self {
            entity,
            kind,
            position: transform.position,
            rotation: transform.rotation,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            inv_mass,
            shape: body.shape,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// First collider struck by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: Entity,
    /// World-space point of impact.
    pub point: Vec3,
    /// Distance from the ray origin to `point`.
    pub distance: f32,
}

/// World-space axis-aligned bounds of one body's collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderBounds {
    pub entity: Entity,
    pub min: Vec3,
    pub max: Vec3,
}

impl ColliderBounds {
    /// Bounds of `shape` placed at `position` with `rotation`.
    pub fn of(entity: Entity, position: Vec3, rotation: Quat, shape: Shape) -> Self {
        let half = match shape {
            Shape::Sphere { radius } => Vec3::splat(radius),
            Shape::Box { half_extents } => {
                let r = Mat3::from_quat(rotation);
                let abs = Mat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs());
                abs * half_extents
            }
        };
        Self {
            entity,
            min: position - half,
            max: position + half,
        }
    }

    /// The twelve edges of the box as line segments.
    pub fn edges(&self) -> [[Vec3; 2]; 12] {
        let (a, b) = (self.min, self.max);
        let c = |x: bool, y: bool, z: bool| {
            Vec3::new(
                if x { b.x } else { a.x },
                if y { b.y } else { a.y },
                if z { b.z } else { a.z },
            )
        };
        [
            [c(false, false, false), c(true, false, false)],
            [c(false, true, false), c(true, true, false)],
            [c(false, false, true), c(true, false, true)],
            [c(false, true, true), c(true, true, true)],
            [c(false, false, false), c(false, true, false)],
            [c(true, false, false), c(true, true, false)],
            [c(false, false, true), c(false, true, true)],
            [c(true, false, true), c(true, true, true)],
            [c(false, false, false), c(false, false, true)],
            [c(true, false, false), c(true, false, true)],
            [c(false, true, false), c(false, true, true)],
            [c(true, true, false), c(true, true, true)],
        ]
    }
}

/// Something that can advance a set of bodies by a fixed increment.
///
/// Implementations must be deterministic: the same bodies in the same order
/// with the same `dt` produce bit-identical results.
pub trait PhysicsBackend {
    fn name(&self) -> &'static str;

    /// Advances every body in `bodies` by exactly `dt` seconds. Bodies arrive
    /// sorted by entity index.
    fn integrate(&mut self, bodies: &mut [BodyState], dt: f32);

    /// First body hit on the segment `from -> to`, as of the last `integrate`.
    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit>;

    /// Appends the bounds of every body collider, as of the last `integrate`.
    fn collider_bounds(&self, out: &mut Vec<ColliderBounds>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_box_bounds_grow() {
        let e = Entity::new(0, 0);
        let shape = Shape::Box { half_extents: Vec3::new(1.0, 0.5, 0.5) };
        let flat = ColliderBounds::of(e, Vec3::ZERO, Quat::IDENTITY, shape);
        assert_eq!((flat.min, flat.max), (Vec3::new(-1.0, -0.5, -0.5), Vec3::new(1.0, 0.5, 0.5)));

        let turned = ColliderBounds::of(
            e,
            Vec3::Y,
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            shape,
        );
        assert!((turned.max.y - 2.0).abs() < 1e-5);
        assert!((turned.max.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn edges_span_the_box() {
        let b = ColliderBounds {
            entity: Entity::new(0, 0),
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        let total: f32 = b.edges().iter().map(|[p, q]| p.distance(*q)).sum();
        assert!((total - 12.0).abs() < 1e-6);
    }
}
