use std::collections::BTreeMap;

use super::{Camera, Color, InstanceRaw, LineVertex, MeshId, Overlay, OverlayRecorder, Renderable};
use crate::device::Extent;
use crate::ecs::EntityStore;
use crate::frame::{FrameError, FrameSlot};
use crate::physics::{ColliderBounds, Snapshot, Transform};

/// Premultiplied green used for collider outlines.
const DEBUG_LINE_COLOR: Color = Color::from_premul(0.2, 1.0, 0.4, 1.0);

/// Counts from one `RenderGraph::record` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub instances: usize,
    pub hidden: usize,
    pub draw_calls: usize,
    pub debug_lines: usize,
    pub overlay_quads: usize,
}

/// Records one frame of draw work into a slot.
///
/// World transforms are blended between the two most recent physics
/// snapshots; entities a snapshot does not know yet fall back to the
/// store's current `Transform`. The store is only read.
///
/// With `debug_physics` set, collider bounds handed to `record` are drawn as
/// line boxes after world geometry and before the overlay.
#[derive(Debug)]
pub struct RenderGraph {
    pub camera: Camera,
    pub clear_color: Color,
    pub debug_physics: bool,
    batches: BTreeMap<MeshId, Vec<InstanceRaw>>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
            clear_color: Color::from_srgb_u8(18, 20, 26, 255),
            debug_physics: false,
            batches: BTreeMap::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        slot: &mut FrameSlot,
        store: &EntityStore,
        prev: &Snapshot,
        curr: &Snapshot,
        alpha: f32,
        extent: Extent,
        debug_bounds: &[ColliderBounds],
        overlay: Option<&mut dyn Overlay>,
    ) -> Result<RecordStats, FrameError> {
        let (commands, arena) = slot.recording_mut()?;
        let mut stats = RecordStats::default();

        for batch in self.batches.values_mut() {
            batch.clear();
        }

        for (entity, (renderable,)) in &store.each::<(Renderable,)>() {
            if !renderable.visible {
                stats.hidden += 1;
                continue;
            }
            let Some(current) = curr
                .get(entity)
                .or_else(|| store.get::<Transform>(entity).ok())
            else {
                continue;
            };
            let previous = prev.get(entity).unwrap_or(current);
            let blended = previous.lerp(current, alpha);

            self.batches
                .entry(renderable.mesh)
                .or_default()
                .push(InstanceRaw::new(blended.to_matrix(), renderable.color));
        }

        commands.clear(self.clear_color)?;
        commands.set_camera(self.camera.view_proj(extent.aspect()))?;
        for (&mesh, batch) in &mut self.batches {
            if batch.is_empty() {
                continue;
            }
            stats.instances += batch.len();
            stats.draw_calls += 1;
            let range = arena.push_instances(batch.drain(..));
            commands.draw_meshes(mesh, range)?;
        }

        if self.debug_physics && !debug_bounds.is_empty() {
            let range = arena.push_lines(
                debug_bounds
                    .iter()
                    .flat_map(ColliderBounds::edges)
                    .flat_map(|[a, b]| [a, b])
                    .map(|p| LineVertex::new(p, DEBUG_LINE_COLOR)),
            );
            stats.debug_lines = range.len() / 2;
            commands.draw_lines(range)?;
        }

        if let Some(overlay) = overlay {
            let mut ui = OverlayRecorder::new(extent);
            overlay.record(&mut ui);
            stats.overlay_quads = ui.len();
            let range = arena.push_quads(ui.drain());
            commands.draw_overlay(range)?;
        }

        commands.seal()?;
        Ok(stats)
    }
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::device::sim::{CompletionMode, SimulatedBackend};
    use crate::frame::{FrameRing, RingConfig};
    use crate::render::DrawCommand;

    struct Hud;

    impl Overlay for Hud {
        fn record(&mut self, ui: &mut OverlayRecorder) {
            ui.rect(0.0, 0.0, 10.0, 10.0, Color::WHITE);
        }
    }

    fn setup() -> (EntityStore, FrameRing, SimulatedBackend) {
        let backend = SimulatedBackend::new(Extent::new(320, 240), CompletionMode::Immediate);
        let ring = FrameRing::new(&RingConfig::default()).unwrap();
        (EntityStore::new(), ring, backend)
    }

    #[test]
    fn interpolates_between_snapshots() {
        let (mut store, mut ring, mut backend) = setup();
        let e = store.create();
        store
            .add_component(e, Transform::from_position(Vec3::ZERO))
            .unwrap();
        store
            .add_component(e, Renderable::new(MeshId::Cube, Color::WHITE))
            .unwrap();
        let prev = Snapshot::capture(&store, 0);
        store.get_mut::<Transform>(e).unwrap().position = Vec3::new(2.0, 0.0, 0.0);
        let curr = Snapshot::capture(&store, 1);

        let slot = ring.acquire_slot(&mut backend).unwrap();
        let mut graph = RenderGraph::new();
        let stats = graph
            .record(slot, &store, &prev, &curr, 0.25, backend_extent(), &[], None)
            .unwrap();

        assert_eq!(stats.instances, 1);
        let x = slot.arena().instances()[0].model[3][0];
        assert!((x - 0.5).abs() < 1e-6);
        assert_eq!(slot.commands().commands().last(), Some(&DrawCommand::PresentBarrier));
    }

    #[test]
    fn overlay_is_recorded_after_world() {
        let (mut store, mut ring, mut backend) = setup();
        let e = store.create();
        store.add_component(e, Transform::default()).unwrap();
        store
            .add_component(e, Renderable::new(MeshId::Sphere, Color::WHITE))
            .unwrap();

        let slot = ring.acquire_slot(&mut backend).unwrap();
        let empty = Snapshot::default();
        let mut hud = Hud;
        RenderGraph::new()
            .record(slot, &store, &empty, &empty, 0.0, backend_extent(), &[], Some(&mut hud))
            .unwrap();

        let cmds = slot.commands().commands();
        let world = cmds
            .iter()
            .position(|c| matches!(c, DrawCommand::DrawMeshes { .. }))
            .unwrap();
        let ui = cmds
            .iter()
            .position(|c| matches!(c, DrawCommand::DrawOverlay { .. }))
            .unwrap();
        assert!(world < ui && ui + 1 == cmds.len() - 1);
    }

    #[test]
    fn collider_outlines_sit_between_world_and_overlay() {
        let (mut store, mut ring, mut backend) = setup();
        let e = store.create();
        store.add_component(e, Transform::default()).unwrap();
        store
            .add_component(e, Renderable::new(MeshId::Cube, Color::WHITE))
            .unwrap();
        let bounds = [ColliderBounds {
            entity: e,
            min: Vec3::splat(-0.5),
            max: Vec3::splat(0.5),
        }];

        let slot = ring.acquire_slot(&mut backend).unwrap();
        let empty = Snapshot::default();
        let mut hud = Hud;
        let mut graph = RenderGraph::new();
        graph.debug_physics = true;
        let stats = graph
            .record(slot, &store, &empty, &empty, 0.0, backend_extent(), &bounds, Some(&mut hud))
            .unwrap();

        assert_eq!(stats.debug_lines, 12);
        assert_eq!(slot.arena().lines().len(), 24);
        let kinds: Vec<&str> = slot
            .commands()
            .commands()
            .iter()
            .map(|c| match c {
                DrawCommand::DrawMeshes { .. } => "meshes",
                DrawCommand::DrawLines { .. } => "lines",
                DrawCommand::DrawOverlay { .. } => "overlay",
                DrawCommand::PresentBarrier => "barrier",
                _ => "setup",
            })
            .collect();
        assert_eq!(kinds, ["setup", "setup", "meshes", "lines", "overlay", "barrier"]);
    }

    #[test]
    fn outlines_need_the_debug_flag() {
        let (store, mut ring, mut backend) = setup();
        let bounds = [ColliderBounds {
            entity: store_entity(),
            min: Vec3::ZERO,
            max: Vec3::ONE,
        }];

        let slot = ring.acquire_slot(&mut backend).unwrap();
        let empty = Snapshot::default();
        let stats = RenderGraph::new()
            .record(slot, &store, &empty, &empty, 0.0, backend_extent(), &bounds, None)
            .unwrap();
        assert_eq!(stats.debug_lines, 0);
        assert!(slot.arena().lines().is_empty());
    }

    #[test]
    fn hidden_entities_are_skipped() {
        let (mut store, mut ring, mut backend) = setup();
        let e = store.create();
        store.add_component(e, Transform::default()).unwrap();
        let mut r = Renderable::new(MeshId::Cube, Color::WHITE);
        r.visible = false;
        store.add_component(e, r).unwrap();

        let slot = ring.acquire_slot(&mut backend).unwrap();
        let empty = Snapshot::default();
        let stats = RenderGraph::new()
            .record(slot, &store, &empty, &empty, 0.0, backend_extent(), &[], None)
            .unwrap();
        assert_eq!((stats.instances, stats.hidden), (0, 1));
    }

    #[test]
    fn recording_requires_an_acquired_slot() {
        let (store, mut ring, mut backend) = setup();
        let slot = ring.acquire_slot(&mut backend).unwrap();
        slot.abandon().unwrap();

        let empty = Snapshot::default();
        let err = RenderGraph::new()
            .record(slot, &store, &empty, &empty, 0.0, backend_extent(), &[], None)
            .unwrap_err();
        assert!(matches!(err, FrameError::IllegalTransition { .. }));
    }

    fn backend_extent() -> Extent {
        Extent::new(320, 240)
    }

    fn store_entity() -> crate::ecs::Entity {
        EntityStore::new().create()
    }
}
