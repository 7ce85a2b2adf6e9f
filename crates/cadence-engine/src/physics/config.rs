use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World parameters shared by every physics backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Height of the horizontal ground plane, `None` for no ground.
    pub ground_height: Option<f32>,
    /// Fraction of normal speed kept after an impact, `0..=1`.
    pub restitution: f32,
    /// Coulomb friction coefficient for contacts. The builtin integrator has
    /// no contacts and ignores it.
    pub friction: f32,
    /// Per-second linear velocity damping.
    pub linear_damping: f32,
    pub max_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground_height: Some(0.0),
            restitution: 0.4,
            friction: 0.5,
            linear_damping: 0.01,
            max_speed: 100.0,
        }
    }
}
