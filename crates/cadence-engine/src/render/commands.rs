use std::ops::Range;

use glam::Mat4;
use thiserror::Error;

use super::{Color, MeshId};

/// One recorded device command. Instance ranges index into the slot's
/// `TransientArena`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    SetCamera(Mat4),
    DrawMeshes { mesh: MeshId, instances: Range<u32> },
    /// World-space line segments, two vertices each.
    DrawLines { vertices: Range<u32> },
    DrawOverlay { quads: Range<u32> },
    /// Last command of every frame; nothing may follow it.
    PresentBarrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    World,
    Overlay,
    Sealed,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("world geometry recorded after the overlay phase began")]
    WorldAfterOverlay,
    #[error("command list is sealed by its present barrier")]
    Sealed,
}

/// Per-slot command buffer.
///
/// Enforces the frame layout: world geometry and debug lines, then overlay,
/// then the present barrier. Cleared and reused when its slot is reacquired.
#[derive(Debug)]
pub struct CommandList {
    commands: Vec<DrawCommand>,
    phase: Phase,
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            phase: Phase::World,
        }
    }

    /// Drops recorded commands, keeping capacity.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.phase = Phase::World;
    }

    #[inline]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.phase == Phase::Sealed
    }

    pub fn clear(&mut self, color: Color) -> Result<(), RecordError> {
        self.push_world(DrawCommand::Clear(color))
    }

    pub fn set_camera(&mut self, view_proj: Mat4) -> Result<(), RecordError> {
        self.push_world(DrawCommand::SetCamera(view_proj))
    }

    pub fn draw_meshes(&mut self, mesh: MeshId, instances: Range<u32>) -> Result<(), RecordError> {
        if instances.is_empty() {
            return Ok(());
        }
        self.push_world(DrawCommand::DrawMeshes { mesh, instances })
    }

    /// Appends debug line segments. They belong to the world phase.
    pub fn draw_lines(&mut self, vertices: Range<u32>) -> Result<(), RecordError> {
        if vertices.is_empty() {
            return Ok(());
        }
        self.push_world(DrawCommand::DrawLines { vertices })
    }

    /// Appends overlay quads. Switches the list into the overlay phase.
    pub fn draw_overlay(&mut self, quads: Range<u32>) -> Result<(), RecordError> {
        self.enter(Phase::Overlay)?;
        if !quads.is_empty() {
            self.commands.push(DrawCommand::DrawOverlay { quads });
        }
        Ok(())
    }

    pub fn seal(&mut self) -> Result<(), RecordError> {
        self.enter(Phase::Sealed)?;
        self.commands.push(DrawCommand::PresentBarrier);
        Ok(())
    }

    fn push_world(&mut self, cmd: DrawCommand) -> Result<(), RecordError> {
        match self.phase {
            Phase::World => {
                self.commands.push(cmd);
                Ok(())
            }
            Phase::Overlay => Err(RecordError::WorldAfterOverlay),
            Phase::Sealed => Err(RecordError::Sealed),
        }
    }

    fn enter(&mut self, phase: Phase) -> Result<(), RecordError> {
        if self.phase == Phase::Sealed {
            return Err(RecordError::Sealed);
        }
        self.phase = self.phase.max(phase);
        Ok(())
    }
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_follows_world_and_precedes_barrier() {
        let mut list = CommandList::new();
        list.clear(Color::BLACK).unwrap();
        list.draw_meshes(MeshId::Cube, 0..4).unwrap();
        list.draw_overlay(0..2).unwrap();
        list.seal().unwrap();

        let kinds: Vec<_> = list
            .commands()
            .iter()
            .map(std::mem::discriminant)
            .collect();
        assert_eq!(kinds.len(), 4);
        assert_eq!(list.commands().last(), Some(&DrawCommand::PresentBarrier));
    }

    #[test]
    fn world_after_overlay_is_rejected() {
        let mut list = CommandList::new();
        list.draw_overlay(0..1).unwrap();
        assert_eq!(
            list.draw_meshes(MeshId::Cube, 0..1),
            Err(RecordError::WorldAfterOverlay)
        );
    }

    #[test]
    fn lines_are_rejected_after_overlay() {
        let mut list = CommandList::new();
        list.draw_meshes(MeshId::Cube, 0..1).unwrap();
        list.draw_lines(0..24).unwrap();
        list.draw_overlay(0..1).unwrap();
        assert_eq!(list.draw_lines(24..26), Err(RecordError::WorldAfterOverlay));
        assert!(matches!(list.commands()[1], DrawCommand::DrawLines { .. }));
    }

    #[test]
    fn sealed_list_rejects_everything_until_reset() {
        let mut list = CommandList::new();
        list.seal().unwrap();
        assert_eq!(list.clear(Color::BLACK), Err(RecordError::Sealed));
        assert_eq!(list.seal(), Err(RecordError::Sealed));

        list.reset();
        assert!(list.is_empty());
        assert!(list.clear(Color::BLACK).is_ok());
    }

    #[test]
    fn empty_ranges_are_elided() {
        let mut list = CommandList::new();
        list.draw_meshes(MeshId::Sphere, 3..3).unwrap();
        list.draw_overlay(0..0).unwrap();
        assert!(list.is_empty());
    }
}
