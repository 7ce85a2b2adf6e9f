//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the window, and drives the frame loop from
//! redraw requests on the event loop thread.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
