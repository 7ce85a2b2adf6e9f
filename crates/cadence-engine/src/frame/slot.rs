use super::{FrameError, TransientArena};
use crate::device::{FenceValue, Semaphore};
use crate::render::CommandList;

/// Lifecycle of a frame slot.
///
/// `Idle -> Recording -> Submitted -> Idle`, with `Recording -> Idle` allowed
/// when a frame is abandoned before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording,
    Submitted,
}

/// One bundle of per-frame resources owned by the `FrameRing`.
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
    state: SlotState,
    commands: CommandList,
    arena: TransientArena,
    image_available: Semaphore,
    render_finished: Semaphore,
    fence: Option<FenceValue>,
    frame: u64,
    uses: u64,
}

impl FrameSlot {
    pub(crate) fn new(index: usize) -> Self {
        let base = index as u32 * 2;
        Self {
            index,
            state: SlotState::Idle,
            commands: CommandList::new(),
            arena: TransientArena::new(),
            image_available: Semaphore(base),
            render_finished: Semaphore(base + 1),
            fence: None,
            frame: 0,
            uses: 0,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Frame number of the current (or most recent) use.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// How many times the slot has been acquired.
    #[inline]
    pub fn uses(&self) -> u64 {
        self.uses
    }

    /// Fence of the outstanding submission, if any.
    #[inline]
    pub fn fence(&self) -> Option<FenceValue> {
        self.fence
    }

    /// Fires when the swap chain image is ready to be rendered into.
    #[inline]
    pub fn image_available(&self) -> Semaphore {
        self.image_available
    }

    /// Fires when this slot's rendering finished; presentation waits on it.
    #[inline]
    pub fn render_finished(&self) -> Semaphore {
        self.render_finished
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn arena(&self) -> &TransientArena {
        &self.arena
    }

    /// Mutable access to the recording targets. Only valid while `Recording`.
    pub fn recording_mut(&mut self) -> Result<(&mut CommandList, &mut TransientArena), FrameError> {
        if self.state != SlotState::Recording {
            return Err(self.illegal(SlotState::Recording));
        }
        Ok((&mut self.commands, &mut self.arena))
    }

    pub(crate) fn begin_recording(&mut self, frame: u64) -> Result<(), FrameError> {
        if self.state != SlotState::Idle {
            return Err(self.illegal(SlotState::Recording));
        }
        self.commands.reset();
        self.arena.reset();
        self.state = SlotState::Recording;
        self.frame = frame;
        self.uses += 1;
        Ok(())
    }

    pub(crate) fn mark_submitted(&mut self, fence: FenceValue) -> Result<(), FrameError> {
        if self.state != SlotState::Recording {
            return Err(self.illegal(SlotState::Submitted));
        }
        self.state = SlotState::Submitted;
        self.fence = Some(fence);
        Ok(())
    }

    /// Returns a slot that never reached submission to `Idle`.
    pub(crate) fn abandon(&mut self) -> Result<(), FrameError> {
        if self.state != SlotState::Recording {
            return Err(self.illegal(SlotState::Idle));
        }
        self.state = SlotState::Idle;
        Ok(())
    }

    /// Returns a submitted slot to `Idle` once `completed` covers its fence.
    pub(crate) fn retire(&mut self, completed: FenceValue) -> Result<(), FrameError> {
        if self.state != SlotState::Submitted {
            return Err(self.illegal(SlotState::Idle));
        }
        let fence = self.fence.unwrap_or(FenceValue::ZERO);
        if !fence.is_reached_by(completed) {
            return Err(FrameError::PrematureRetire {
                slot: self.index,
                fence,
                completed,
            });
        }
        self.state = SlotState::Idle;
        self.fence = None;
        Ok(())
    }

    fn illegal(&self, to: SlotState) -> FrameError {
        FrameError::IllegalTransition {
            slot: self.index,
            from: self.state,
            to,
        }
    }
}
