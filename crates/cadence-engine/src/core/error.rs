use thiserror::Error;

use crate::device::DeviceError;
use crate::ecs::StoreError;
use crate::frame::FrameError;
use crate::physics::StepError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoopError {
    /// Fatal: the loop refuses to run further frames.
    #[error("device lost: {0}")]
    DeviceLost(DeviceError),

    #[error(transparent)]
    Frame(FrameError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("frame loop terminated by an earlier fatal error")]
    Terminated,
}

impl LoopError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoopError::DeviceLost(_) | LoopError::Terminated)
    }
}

impl From<DeviceError> for LoopError {
    fn from(err: DeviceError) -> Self {
        LoopError::DeviceLost(err)
    }
}

impl From<FrameError> for LoopError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Device(err) => LoopError::DeviceLost(err),
            other => LoopError::Frame(other),
        }
    }
}
