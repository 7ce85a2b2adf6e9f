use crate::device::{FenceValue, GpuBackend, Submission};
use crate::frame::{FrameError, FrameSlot};

/// Hands recorded slots to the device queue in frame order.
///
/// Each submission waits on the slot's image-available signal and raises the
/// slot's render-finished signal; the returned fence is the slot-finished signal
/// the ring waits on before reusing the slot.
#[derive(Debug, Default)]
pub struct Submitter {
    last_fence: FenceValue,
    submitted: u64,
}

impl Submitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fence of the most recent submission.
    #[inline]
    pub fn last_fence(&self) -> FenceValue {
        self.last_fence
    }

    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn submit<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        slot: &mut FrameSlot,
        image: &B::Image,
    ) -> Result<FenceValue, FrameError> {
        if !slot.commands().is_sealed() {
            return Err(FrameError::Unsealed(slot.index()));
        }

        let wait = [slot.image_available()];
        let signal = [slot.render_finished()];
        let submission = Submission {
            slot: slot.index(),
            frame: slot.frame(),
            commands: slot.commands(),
            arena: slot.arena(),
            wait: &wait,
            signal: &signal,
        };

        let fence = backend.submit(&submission, image)?;
        if fence <= self.last_fence {
            return Err(FrameError::OutOfOrder {
                fence,
                last: self.last_fence,
            });
        }

        slot.mark_submitted(fence)?;
        self.last_fence = fence;
        self.submitted += 1;
        log::trace!("slot {} frame {}: submitted as {fence}", slot.index(), slot.frame());
        Ok(fence)
    }
}
