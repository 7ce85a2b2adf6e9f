use super::FrameStats;
use crate::device::Extent;
use crate::ecs::EntityStore;
use crate::physics::PhysicsBackend;
use crate::render::Camera;
use crate::time::SimulationTime;

/// Per-frame context passed to `Simulation::update`.
pub struct UpdateCtx<'a> {
    pub store: &'a mut EntityStore,
    pub camera: &'a mut Camera,
    /// Read-only physics queries (ray casts, collider bounds) as of the last step.
    pub physics: &'a dyn PhysicsBackend,
    /// Draw collider outlines this frame and onwards.
    pub debug_physics: &'a mut bool,
    /// Wall-clock seconds since the previous frame.
    pub frame_dt: f64,
    pub time: SimulationTime,
    pub extent: Extent,
    pub stats: &'a FrameStats,
}
