use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::Color;

/// Built-in meshes known to every backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshId {
    Cube,
    Sphere,
    /// Unit quad in the XZ plane, used for ground tiles.
    Plane,
}

impl MeshId {
    pub const ALL: [MeshId; 3] = [MeshId::Cube, MeshId::Sphere, MeshId::Plane];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// How an entity is drawn. Entities without one are not rendered.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub color: Color,
    pub visible: bool,
}

impl Renderable {
    pub fn new(mesh: MeshId, color: Color) -> Self {
        Self {
            mesh,
            color,
            visible: true,
        }
    }
}

/// Per-instance data for world geometry, uploaded verbatim.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    pub fn new(model: Mat4, color: Color) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

/// Per-instance data for overlay rectangles, in physical pixels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct OverlayQuad {
    pub origin: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 4],
}

/// One end of a world-space debug line segment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }
}
