//! Cadence engine crate.
//!
//! Fixed-step simulation synchronized with a pipelined GPU renderer: an entity
//! store, a simulation clock, a physics stepper, a ring of frames in flight,
//! a render graph that records interpolated state, and a presentation engine.

pub mod ecs;
pub mod time;
pub mod physics;

pub mod device;
pub mod frame;
pub mod render;
pub mod present;

pub mod core;
pub mod window;
pub mod logging;
