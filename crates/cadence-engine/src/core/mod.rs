//! Core engine-facing contracts and the frame loop.
//!
//! This module defines the interface between the runtime (platform loop) and
//! gameplay code, and owns the per-frame orchestration of clock, physics,
//! frame ring, render graph and presentation.

mod app;
mod config;
mod ctx;
mod error;
mod frame_loop;
mod stats;

pub use app::{AppControl, Simulation};
pub use config::{ConfigError, EngineConfig};
pub use ctx::UpdateCtx;
pub use error::LoopError;
pub use frame_loop::{FrameLoop, FrameOutcome, FrameReport};
pub use stats::FrameStats;
