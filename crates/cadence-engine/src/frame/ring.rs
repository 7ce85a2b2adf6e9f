use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{FrameError, FrameSlot, SlotState};
use crate::device::GpuBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Number of slots, 2 or 3.
    pub frames_in_flight: usize,
    /// Longest acceptable wait for a slot's previous submission.
    pub fence_timeout_ms: u64,
}

impl RingConfig {
    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            fence_timeout_ms: 2_000,
        }
    }
}

/// Fixed set of frame slots cycled round-robin.
///
/// `acquire_slot` is the single point where CPU recording is serialized
/// against the device: it blocks on the slot's previous fence before handing
/// the slot out again.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<FrameSlot>,
    next: usize,
    frame: u64,
    fence_timeout: Duration,
}

impl FrameRing {
    pub fn new(config: &RingConfig) -> Result<Self, FrameError> {
        let n = config.frames_in_flight;
        if !(2..=3).contains(&n) {
            return Err(FrameError::InvalidRingSize(n));
        }
        Ok(Self {
            slots: (0..n).map(FrameSlot::new).collect(),
            next: 0,
            frame: 0,
            fence_timeout: config.fence_timeout(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Frames handed out so far.
    #[inline]
    pub fn frames_started(&self) -> u64 {
        self.frame
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FrameSlot> {
        self.slots.get_mut(index)
    }

    /// Slots whose submission has not been retired yet.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state() == SlotState::Submitted)
            .count()
    }

    /// Takes the next slot, waiting for the device to finish its previous use.
    pub fn acquire_slot<B: GpuBackend>(
        &mut self,
        backend: &mut B,
    ) -> Result<&mut FrameSlot, FrameError> {
        let index = self.next;
        let frame = self.frame;
        let timeout = self.fence_timeout;
        let slot = &mut self.slots[index];

        if let (SlotState::Submitted, Some(fence)) = (slot.state(), slot.fence()) {
            log::trace!("slot {index}: waiting on {fence}");
            backend.wait_for_fence(fence, timeout)?;
            slot.retire(backend.completed_fence())?;
        }

        slot.begin_recording(frame)?;
        log::trace!("slot {index}: recording frame {frame}");

        self.next = (index + 1) % self.slots.len();
        self.frame += 1;
        Ok(&mut self.slots[index])
    }

    /// Waits for every in-flight slot, oldest first, and returns how many were retired.
    pub fn drain<B: GpuBackend>(&mut self, backend: &mut B) -> Result<usize, FrameError> {
        let mut pending: Vec<usize> = self
            .slots
            .iter()
            .filter(|s| s.state() == SlotState::Submitted)
            .map(|s| s.index())
            .collect();
        pending.sort_by_key(|&i| self.slots[i].fence());

        for &i in &pending {
            let slot = &mut self.slots[i];
            if let Some(fence) = slot.fence() {
                backend.wait_for_fence(fence, self.fence_timeout)?;
            }
            slot.retire(backend.completed_fence())?;
        }
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::{CompletionMode, SimulatedBackend, TimelineEvent};
    use crate::device::{Extent, FenceValue};

    fn ring(n: usize) -> FrameRing {
        FrameRing::new(&RingConfig {
            frames_in_flight: n,
            ..RingConfig::default()
        })
        .unwrap()
    }

    fn submit(slot: &mut FrameSlot, backend: &mut SimulatedBackend) -> FenceValue {
        let fence = backend.submit_raw(slot.index(), slot.frame());
        slot.mark_submitted(fence).unwrap();
        fence
    }

    #[test]
    fn rejects_bad_sizes() {
        for n in [0, 1, 4] {
            let err = FrameRing::new(&RingConfig {
                frames_in_flight: n,
                ..RingConfig::default()
            })
            .unwrap_err();
            assert_eq!(err, FrameError::InvalidRingSize(n));
        }
    }

    #[test]
    fn cycles_round_robin() {
        let mut backend = SimulatedBackend::new(Extent::new(64, 64), CompletionMode::Immediate);
        let mut ring = ring(3);

        let order: Vec<usize> = (0..5)
            .map(|_| {
                let slot = ring.acquire_slot(&mut backend).unwrap();
                let index = slot.index();
                submit(slot, &mut backend);
                index
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn reuse_waits_for_previous_fence() {
        let mut backend = SimulatedBackend::new(Extent::new(64, 64), CompletionMode::OnWait);
        let mut ring = ring(2);

        let first = {
            let slot = ring.acquire_slot(&mut backend).unwrap();
            submit(slot, &mut backend)
        };
        let slot = ring.acquire_slot(&mut backend).unwrap();
        submit(slot, &mut backend);
        assert_eq!(backend.completed_fence(), FenceValue::ZERO);

        let slot = ring.acquire_slot(&mut backend).unwrap();
        assert_eq!(slot.index(), 0);
        assert!(backend.completed_fence() >= first);
        assert!(
            backend
                .events()
                .contains(&TimelineEvent::WaitBegan { fence: first })
        );
    }

    #[test]
    fn unsubmitted_slot_cannot_be_reacquired() {
        let mut backend = SimulatedBackend::new(Extent::new(64, 64), CompletionMode::Immediate);
        let mut ring = ring(2);
        ring.acquire_slot(&mut backend).unwrap();
        ring.acquire_slot(&mut backend).unwrap();

        assert!(matches!(
            ring.acquire_slot(&mut backend),
            Err(FrameError::IllegalTransition { slot: 0, .. })
        ));
    }

    #[test]
    fn drain_retires_everything() {
        let mut backend = SimulatedBackend::new(Extent::new(64, 64), CompletionMode::OnWait);
        let mut ring = ring(3);
        for _ in 0..3 {
            let slot = ring.acquire_slot(&mut backend).unwrap();
            submit(slot, &mut backend);
        }
        assert_eq!(ring.in_flight(), 3);
        assert_eq!(ring.drain(&mut backend).unwrap(), 3);
        assert_eq!(ring.in_flight(), 0);
    }
}
