//! Frame recording and submission.
//!
//! `RenderGraph` turns interpolated entity state plus an optional `Overlay`
//! into a slot's `CommandList`; `Submitter` hands that list to the device.

mod camera;
mod color;
mod commands;
mod graph;
mod instance;
mod overlay;
mod submit;

pub use camera::Camera;
pub use color::Color;
pub use commands::{CommandList, DrawCommand, RecordError};
pub use graph::{RecordStats, RenderGraph};
pub use instance::{InstanceRaw, LineVertex, MeshId, OverlayQuad, Renderable};
pub use overlay::{Overlay, OverlayRecorder};
pub use submit::Submitter;
