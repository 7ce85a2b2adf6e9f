use winit::event::WindowEvent;

use super::ctx::UpdateCtx;
use crate::ecs::{EntityStore, StoreError};
use crate::render::Overlay;

/// Control directive returned by simulation callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Gameplay contract driven by the `FrameLoop`.
///
/// Per frame: `fixed_update` runs before each physics step (zero or more times),
/// then `update` runs once, then the frame is recorded.
pub trait Simulation {
    /// Called once before the first frame.
    fn setup(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        let _ = store;
        Ok(())
    }

    /// Called before every fixed physics step with the fixed `dt`.
    fn fixed_update(&mut self, store: &mut EntityStore, dt: f64) -> Result<(), StoreError> {
        let _ = (store, dt);
        Ok(())
    }

    /// Called once per frame with the variable frame delta.
    fn update(&mut self, ctx: &mut UpdateCtx<'_>) -> AppControl;

    /// Called for window events before the engine reacts to them.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// UI drawn over the world this frame.
    fn overlay(&mut self) -> Option<&mut dyn Overlay> {
        None
    }
}
