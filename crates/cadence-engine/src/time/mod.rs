//! Time subsystem.
//!
//! Two clocks with different jobs:
//! - `FrameClock` measures wall-clock time between presented frames
//! - `SimClock` turns those variable deltas into a whole number of fixed steps
//!   plus an interpolation alpha for rendering between them

mod frame_clock;
mod sim_clock;

pub use frame_clock::{FrameClock, FrameTime};
pub use sim_clock::{ClockConfig, ClockTick, FallingBehind, SimClock, SimulationTime};
