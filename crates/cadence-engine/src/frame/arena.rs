use std::ops::Range;

use crate::render::{InstanceRaw, LineVertex, OverlayQuad};

/// Per-slot bump storage for instance data uploaded with the slot's commands.
///
/// Reset wholesale when the slot is reacquired; capacity is kept across frames.
#[derive(Debug, Default)]
pub struct TransientArena {
    instances: Vec<InstanceRaw>,
    quads: Vec<OverlayQuad>,
    lines: Vec<LineVertex>,
    peak_instances: usize,
    peak_quads: usize,
}

impl TransientArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.instances.clear();
        self.quads.clear();
        self.lines.clear();
    }

    /// Appends world instances and returns their range.
    pub fn push_instances(&mut self, items: impl IntoIterator<Item = InstanceRaw>) -> Range<u32> {
        let start = self.instances.len() as u32;
        self.instances.extend(items);
        self.peak_instances = self.peak_instances.max(self.instances.len());
        start..self.instances.len() as u32
    }

    pub fn push_quads(&mut self, items: impl IntoIterator<Item = OverlayQuad>) -> Range<u32> {
        let start = self.quads.len() as u32;
        self.quads.extend(items);
        self.peak_quads = self.peak_quads.max(self.quads.len());
        start..self.quads.len() as u32
    }

    /// Appends line vertices, two per segment, and returns their range.
    pub fn push_lines(&mut self, items: impl IntoIterator<Item = LineVertex>) -> Range<u32> {
        let start = self.lines.len() as u32;
        self.lines.extend(items);
        start..self.lines.len() as u32
    }

    #[inline]
    pub fn instances(&self) -> &[InstanceRaw] {
        &self.instances
    }

    #[inline]
    pub fn quads(&self) -> &[OverlayQuad] {
        &self.quads
    }

    #[inline]
    pub fn lines(&self) -> &[LineVertex] {
        &self.lines
    }

    /// Largest instance count held since creation, for sizing GPU buffers.
    #[inline]
    pub fn peak_instances(&self) -> usize {
        self.peak_instances
    }

    #[inline]
    pub fn peak_quads(&self) -> usize {
        self.peak_quads
    }
}
