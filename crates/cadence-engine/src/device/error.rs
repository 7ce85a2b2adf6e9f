use std::time::Duration;

use thiserror::Error;

use super::FenceValue;

/// Device failures. All of them end the frame loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("device lost: {reason}")]
    Lost { reason: String },

    #[error("fence {fence} not reached after {waited:?}")]
    Timeout { fence: FenceValue, waited: Duration },

    #[error("device out of memory")]
    OutOfMemory,
}

/// Swap chain failures reported by image acquisition and presentation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PresentError {
    /// Surface configuration no longer matches the window.
    #[error("swap chain out of date")]
    OutOfDate,

    #[error("surface lost")]
    SurfaceLost,

    #[error("timed out acquiring a swap chain image")]
    Timeout,

    #[error(transparent)]
    Device(#[from] DeviceError),
}
