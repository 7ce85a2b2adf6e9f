use glam::{Mat4, Quat, Vec3};

/// Position, orientation and scale of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Blends `self` toward `other`. Position and scale are linear, orientation
    /// uses spherical interpolation.
    pub fn lerp(&self, other: &Self, alpha: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, alpha),
            rotation: self.rotation.slerp(other.rotation, alpha),
            scale: self.scale.lerp(other.scale, alpha),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// How a body takes part in stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    /// Never moves.
    Static,
    /// Moves by its velocity; ignores forces and contacts.
    Kinematic,
    /// Fully simulated.
    #[default]
    Dynamic,
}

/// Collision shape, centred on the body's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl Shape {
    /// Distance from the centre to the lowest point along -Y, ignoring rotation.
    pub fn half_height(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => radius,
            Shape::Box { half_extents } => half_extents.y,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Sphere { radius: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub kind: BodyKind,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Mass in kilograms; zero makes a dynamic body behave as static.
    pub mass: f32,
    pub shape: Shape,
}

impl RigidBody {
    pub fn dynamic(mass: f32, shape: Shape) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            shape,
        }
    }

    pub fn kinematic(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Kinematic,
            mass: 0.0,
            ..Self::dynamic(0.0, shape)
        }
    }

    pub fn fixed(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Static,
            ..Self::kinematic(shape)
        }
    }

    pub fn with_velocity(mut self, linear: Vec3) -> Self {
        self.linear_velocity = linear;
        self
    }

    pub fn with_angular_velocity(mut self, angular: Vec3) -> Self {
        self.angular_velocity = angular;
        self
    }

    /// Kind after applying the zero-mass rule.
    pub fn effective_kind(&self) -> BodyKind {
        match self.kind {
            BodyKind::Dynamic if self.mass <= 0.0 => BodyKind::Static,
            kind => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_hits_endpoints() {
        let a = Transform::from_position(Vec3::ZERO);
        let b = Transform::from_position(Vec3::new(2.0, 4.0, 0.0))
            .with_rotation(Quat::from_rotation_y(1.0));

        assert_eq!(a.lerp(&b, 0.0).position, a.position);
        assert!(a.lerp(&b, 1.0).position.abs_diff_eq(b.position, 1e-6));
        assert!(a.lerp(&b, 0.5).position.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert!(a.lerp(&b, 1.0).rotation.abs_diff_eq(b.rotation, 1e-5));
    }

    #[test]
    fn zero_mass_dynamic_is_static() {
        let body = RigidBody::dynamic(0.0, Shape::default());
        assert_eq!(body.effective_kind(), BodyKind::Static);
        assert_eq!(RigidBody::kinematic(Shape::default()).effective_kind(), BodyKind::Kinematic);
    }
}
