use thiserror::Error;

use super::SlotState;
use crate::device::{DeviceError, FenceValue};
use crate::render::RecordError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("slot {0} submitted without its present barrier")]
    Unsealed(usize),

    #[error("slot {slot}: illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        slot: usize,
        from: SlotState,
        to: SlotState,
    },

    #[error("slot {slot} retired before fence {fence} completed (device at {completed})")]
    PrematureRetire {
        slot: usize,
        fence: FenceValue,
        completed: FenceValue,
    },

    #[error("fence {fence} issued after {last}; submissions must follow frame order")]
    OutOfOrder { fence: FenceValue, last: FenceValue },

    #[error("ring size {0} outside 2..=3")]
    InvalidRingSize(usize),
}
