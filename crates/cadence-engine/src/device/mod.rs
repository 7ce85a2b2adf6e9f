//! GPU device abstraction.
//!
//! This module is responsible for:
//! - the `GpuBackend` seam the frame loop drives (fences, semaphores, swap chain)
//! - `WgpuBackend`, the windowed implementation
//! - `sim::SimulatedBackend`, a deterministic timeline for tests and headless runs

mod backend;
mod error;
mod gpu;
mod init;
mod pipeline;
pub mod sim;
mod surface;
mod types;

pub use backend::GpuBackend;
pub use error::{DeviceError, PresentError};
pub use gpu::{WgpuBackend, WgpuImage};
pub use init::GpuInit;
pub use types::{Extent, FenceValue, Semaphore, Submission};
