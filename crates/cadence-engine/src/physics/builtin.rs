use glam::{Quat, Vec3};

use super::backend::{BodyState, ColliderBounds, PhysicsBackend, RayHit};
use super::components::{BodyKind, Shape};
use super::config::PhysicsConfig;

/// Vertical speed below which a ground bounce comes to rest.
const REST_SPEED: f32 = 0.05;

/// Semi-implicit Euler integrator with gravity and a ground plane.
///
/// Bodies never touch each other: there is no broad phase and no contact
/// solving, only the ground plane. Useful as a cheap stand-in for
/// `RapierBackend` in tests that care about stepping and not about contacts.
/// Results only depend on the input order the stepper already fixes.
#[derive(Debug, Clone)]
pub struct BuiltinIntegrator {
    config: PhysicsConfig,
    /// Bodies as left by the last `integrate`, for queries.
    last: Vec<BodyState>,
}

impl BuiltinIntegrator {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            last: Vec::new(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    fn integrate_dynamic(&self, body: &mut BodyState, dt: f32) {
        let c = &self.config;

        body.linear_velocity += c.gravity * dt;
        body.linear_velocity *= 1.0 / (1.0 + c.linear_damping * dt);
        // A non-finite velocity is left alone so the stepper sees it diverge.
        if body.linear_velocity.is_finite()
            && body.linear_velocity.length_squared() > c.max_speed * c.max_speed
        {
            body.linear_velocity = body.linear_velocity.normalize_or_zero() * c.max_speed;
        }

        body.position += body.linear_velocity * dt;
        integrate_rotation(body, dt);

        if let Some(ground) = c.ground_height {
            let half = body.shape.half_height();
            if body.position.y - half < ground {
                body.position.y = ground + half;
                if body.linear_velocity.y < 0.0 {
                    let bounce = -body.linear_velocity.y * c.restitution;
                    body.linear_velocity.y = if bounce < REST_SPEED { 0.0 } else { bounce };
                }
            }
        }
    }
}

impl Default for BuiltinIntegrator {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsBackend for BuiltinIntegrator {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn integrate(&mut self, bodies: &mut [BodyState], dt: f32) {
        for body in &mut *bodies {
            match body.kind {
                BodyKind::Static => {}
                BodyKind::Kinematic => {
                    body.position += body.linear_velocity * dt;
                    integrate_rotation(body, dt);
                }
                BodyKind::Dynamic => self.integrate_dynamic(body, dt),
            }
        }
        self.last.clear();
        self.last.extend_from_slice(bodies);
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        let len = delta.length();
        if len <= f32::EPSILON || !len.is_finite() {
            return None;
        }
        let dir = delta / len;

        let mut best: Option<RayHit> = None;
        for body in &self.last {
            let Some(t) = ray_shape(from, dir, body) else {
                continue;
            };
            if t <= len && best.is_none_or(|b| t < b.distance) {
                best = Some(RayHit {
                    entity: body.entity,
                    point: from + dir * t,
                    distance: t,
                });
            }
        }
        best
    }

    fn collider_bounds(&self, out: &mut Vec<ColliderBounds>) {
        out.extend(
            self.last
                .iter()
                .map(|b| ColliderBounds::of(b.entity, b.position, b.rotation, b.shape)),
        );
    }
}

/// Distance along the unit ray to the body's surface, `Some(0.0)` from inside.
fn ray_shape(origin: Vec3, dir: Vec3, body: &BodyState) -> Option<f32> {
    match body.shape {
        Shape::Sphere { radius } => {
            let m = origin - body.position;
            let b = m.dot(dir);
            let c = m.length_squared() - radius * radius;
            if c <= 0.0 {
                return Some(0.0);
            }
            let disc = b * b - c;
            if b > 0.0 || disc < 0.0 {
                return None;
            }
            Some(-b - disc.sqrt())
        }
        Shape::Box { half_extents } => {
            // Slab test in the box's local frame.
            let inv = body.rotation.inverse();
            let o = inv * (origin - body.position);
            let d = inv * dir;
            let (mut near, mut far) = (0.0f32, f32::INFINITY);
            for axis in 0..3 {
                let (o, d, h) = (o[axis], d[axis], half_extents[axis]);
                if d.abs() < f32::EPSILON {
                    if o.abs() > h {
                        return None;
                    }
                    continue;
                }
                let (t0, t1) = ((-h - o) / d, (h - o) / d);
                near = near.max(t0.min(t1));
                far = far.min(t0.max(t1));
                if near > far {
                    return None;
                }
            }
            Some(near)
        }
    }
}

fn integrate_rotation(body: &mut BodyState, dt: f32) {
    if body.angular_velocity != Vec3::ZERO {
        let delta = Quat::from_scaled_axis(body.angular_velocity * dt);
        body.rotation = (delta * body.rotation).normalize();
    }
}
