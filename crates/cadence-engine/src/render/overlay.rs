use super::{Color, OverlayQuad};
use crate::device::Extent;

/// UI layer hook. Called once per recorded frame, after world geometry.
pub trait Overlay {
    fn record(&mut self, ui: &mut OverlayRecorder);
}

/// Collects overlay rectangles in physical pixels, origin top-left.
#[derive(Debug)]
pub struct OverlayRecorder {
    extent: Extent,
    quads: Vec<OverlayQuad>,
}

impl OverlayRecorder {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            quads: Vec::new(),
        }
    }

    /// Drawable size of the frame being recorded.
    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Fills a rectangle. Parts outside the drawable are clipped; empty
    /// rectangles are dropped.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let (w, h) = (self.extent.width as f32, self.extent.height as f32);
        let x0 = x.clamp(0.0, w);
        let y0 = y.clamp(0.0, h);
        let x1 = (x + width).clamp(0.0, w);
        let y1 = (y + height).clamp(0.0, h);
        if x1 <= x0 || y1 <= y0 || color.a <= 0.0 {
            return;
        }
        self.quads.push(OverlayQuad {
            origin: [x0, y0],
            size: [x1 - x0, y1 - y0],
            color: color.to_array(),
        });
    }

    /// Horizontal bar filled to `fraction` of `width` over a background track.
    #[allow(clippy::too_many_arguments)]
    pub fn meter(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fraction: f32,
        fill: Color,
        track: Color,
    ) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.rect(x, y, width, height, track);
        self.rect(x, y, width * fraction, height, fill);
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = OverlayQuad> + '_ {
        self.quads.drain(..)
    }
}
