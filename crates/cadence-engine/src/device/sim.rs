//! Deterministic in-process device used by tests and headless runs.
//!
//! `SimulatedBackend` keeps a fence timeline, a small swap chain and an event
//! log. How fences complete is chosen with [`CompletionMode`]; with
//! `CompletionMode::External` a [`GpuHandle`] can complete them from another
//! thread while the frame loop genuinely blocks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{
    DeviceError, Extent, FenceValue, GpuBackend, PresentError, Semaphore, Submission,
};

/// Number of images in the simulated swap chain.
const SWAPCHAIN_IMAGES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Work completes the moment it is submitted.
    Immediate,
    /// Work completes only when the CPU waits for it.
    OnWait,
    /// Work completes only through a [`GpuHandle`].
    External,
}

/// Everything observable that happened on the simulated device, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    Acquired { image: u32, signal: Semaphore },
    AcquireFailed(PresentError),
    Submitted {
        slot: usize,
        frame: u64,
        fence: FenceValue,
        wait: Vec<Semaphore>,
        signal: Vec<Semaphore>,
        draws: usize,
    },
    WaitBegan { fence: FenceValue },
    WaitEnded { fence: FenceValue },
    Completed { fence: FenceValue },
    Presented { image: u32, wait: Vec<Semaphore> },
    SwapchainRebuilt { extent: Extent },
}

/// A swap chain image handed out by `SimulatedBackend`.
#[derive(Debug, PartialEq, Eq)]
pub struct SimImage {
    pub index: u32,
    generation: u64,
}

#[derive(Debug, Default)]
struct Timeline {
    submitted: FenceValue,
    completed: FenceValue,
    events: Vec<TimelineEvent>,
    lost: Option<String>,
    /// Submissions that reused a slot whose previous fence was still pending.
    hazards: usize,
}

impl Timeline {
    fn complete_through(&mut self, fence: FenceValue) {
        let target = fence.min(self.submitted);
        while self.completed < target {
            self.completed = self.completed.next();
            let fence = self.completed;
            self.events.push(TimelineEvent::Completed { fence });
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    timeline: Mutex<Timeline>,
    changed: Condvar,
}

impl Shared {
    /// Blocks until notified or `deadline` passes; `None` waits without limit.
    /// Returns `true` on timeout.
    fn wait(&self, guard: &mut MutexGuard<'_, Timeline>, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => self.changed.wait_until(guard, deadline).timed_out(),
            None => {
                self.changed.wait(guard);
                false
            }
        }
    }
}

/// Cloneable, thread-safe control over a `SimulatedBackend`'s timeline.
#[derive(Debug, Clone)]
pub struct GpuHandle {
    shared: Arc<Shared>,
}

impl GpuHandle {
    /// Completes the oldest pending submission, if any.
    pub fn complete_next(&self) -> Option<FenceValue> {
        let mut t = self.shared.timeline.lock();
        if t.completed >= t.submitted {
            return None;
        }
        let next = t.completed.next();
        t.complete_through(next);
        drop(t);
        self.shared.changed.notify_all();
        Some(next)
    }

    pub fn complete_through(&self, fence: FenceValue) {
        self.shared.timeline.lock().complete_through(fence);
        self.shared.changed.notify_all();
    }

    /// Blocks until some submission is pending. Returns `false` on timeout.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        // Timeouts past what `Instant` can represent wait without limit.
        let deadline = Instant::now().checked_add(timeout);
        let mut t = self.shared.timeline.lock();
        while t.completed >= t.submitted && t.lost.is_none() {
            if self.shared.wait(&mut t, deadline) {
                break;
            }
        }
        t.completed < t.submitted
    }

    pub fn lose_device(&self, reason: impl Into<String>) {
        self.shared.timeline.lock().lost = Some(reason.into());
        self.shared.changed.notify_all();
    }

    pub fn completed(&self) -> FenceValue {
        self.shared.timeline.lock().completed
    }
}

#[derive(Debug)]
pub struct SimulatedBackend {
    shared: Arc<Shared>,
    mode: CompletionMode,
    extent: Extent,
    surface_extent: Extent,
    generation: u64,
    next_image: u32,
    acquire_failures: VecDeque<PresentError>,
    present_failures: VecDeque<PresentError>,
    submit_failures: VecDeque<DeviceError>,
    slot_fences: HashMap<usize, FenceValue>,
}

impl SimulatedBackend {
    pub fn new(extent: Extent, mode: CompletionMode) -> Self {
        Self {
            shared: Arc::default(),
            mode,
            extent,
            surface_extent: extent,
            generation: 0,
            next_image: 0,
            acquire_failures: VecDeque::new(),
            present_failures: VecDeque::new(),
            submit_failures: VecDeque::new(),
            slot_fences: HashMap::new(),
        }
    }

    pub fn handle(&self) -> GpuHandle {
        GpuHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<TimelineEvent> {
        self.shared.timeline.lock().events.clone()
    }

    pub fn clear_events(&mut self) {
        self.shared.timeline.lock().events.clear();
    }

    /// Times a slot was submitted again while its previous use was still pending.
    pub fn hazards(&self) -> usize {
        self.shared.timeline.lock().hazards
    }

    pub fn submitted_fence(&self) -> FenceValue {
        self.shared.timeline.lock().submitted
    }

    /// Makes the next `acquire_image` fail with `err`.
    pub fn fail_next_acquire(&mut self, err: PresentError) {
        self.acquire_failures.push_back(err);
    }

    pub fn fail_next_present(&mut self, err: PresentError) {
        self.present_failures.push_back(err);
    }

    /// Makes the next `submit` fail with `err` without enqueuing anything.
    pub fn fail_next_submit(&mut self, err: DeviceError) {
        self.submit_failures.push_back(err);
    }

    /// Changes the window size. The swap chain reports `OutOfDate` until rebuilt.
    pub fn resize_surface(&mut self, extent: Extent) {
        self.surface_extent = extent;
    }

    /// Enqueues an empty submission for `slot`, bypassing command recording.
    pub fn submit_raw(&mut self, slot: usize, frame: u64) -> FenceValue {
        self.enqueue(slot, frame, &[], &[], 0)
    }

    fn enqueue(
        &mut self,
        slot: usize,
        frame: u64,
        wait: &[Semaphore],
        signal: &[Semaphore],
        draws: usize,
    ) -> FenceValue {
        let mut t = self.shared.timeline.lock();

        if let Some(prev) = self.slot_fences.get(&slot) {
            if !prev.is_reached_by(t.completed) {
                log::error!("slot {slot} resubmitted while {prev} is pending");
                t.hazards += 1;
            }
        }

        t.submitted = t.submitted.next();
        let fence = t.submitted;
        self.slot_fences.insert(slot, fence);
        t.events.push(TimelineEvent::Submitted {
            slot,
            frame,
            fence,
            wait: wait.to_vec(),
            signal: signal.to_vec(),
            draws,
        });

        if self.mode == CompletionMode::Immediate {
            t.complete_through(fence);
        }
        drop(t);
        self.shared.changed.notify_all();
        fence
    }

    fn check_lost(t: &Timeline) -> Result<(), DeviceError> {
        match &t.lost {
            Some(reason) => Err(DeviceError::Lost {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl GpuBackend for SimulatedBackend {
    type Image = SimImage;

    fn name(&self) -> &str {
        "simulated"
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn acquire_image(
        &mut self,
        signal: Semaphore,
        _timeout: Duration,
    ) -> Result<SimImage, PresentError> {
        let failure = self.acquire_failures.pop_front().or_else(|| {
            (self.surface_extent != self.extent).then_some(PresentError::OutOfDate)
        });

        let mut t = self.shared.timeline.lock();
        Self::check_lost(&t)?;
        if let Some(err) = failure {
            t.events.push(TimelineEvent::AcquireFailed(err.clone()));
            return Err(err);
        }

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % SWAPCHAIN_IMAGES;
        t.events.push(TimelineEvent::Acquired { image: index, signal });
        Ok(SimImage {
            index,
            generation: self.generation,
        })
    }

    fn submit(
        &mut self,
        submission: &Submission<'_>,
        _image: &SimImage,
    ) -> Result<FenceValue, DeviceError> {
        if let Some(err) = self.submit_failures.pop_front() {
            return Err(err);
        }
        Self::check_lost(&self.shared.timeline.lock())?;
        Ok(self.enqueue(
            submission.slot,
            submission.frame,
            submission.wait,
            submission.signal,
            submission.commands.len(),
        ))
    }

    fn present(&mut self, image: SimImage, wait: &[Semaphore]) -> Result<(), PresentError> {
        if let Some(err) = self.present_failures.pop_front() {
            return Err(err);
        }
        if image.generation != self.generation {
            return Err(PresentError::OutOfDate);
        }
        let mut t = self.shared.timeline.lock();
        Self::check_lost(&t)?;
        t.events.push(TimelineEvent::Presented {
            image: image.index,
            wait: wait.to_vec(),
        });
        Ok(())
    }

    fn completed_fence(&mut self) -> FenceValue {
        self.shared.timeline.lock().completed
    }

    fn wait_for_fence(&mut self, fence: FenceValue, timeout: Duration) -> Result<(), DeviceError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut t = self.shared.timeline.lock();
        if fence.is_reached_by(t.completed) {
            return Ok(());
        }

        t.events.push(TimelineEvent::WaitBegan { fence });
        if self.mode == CompletionMode::OnWait {
            t.complete_through(fence);
        }

        while !fence.is_reached_by(t.completed) {
            Self::check_lost(&t)?;
            if self.shared.wait(&mut t, deadline) && !fence.is_reached_by(t.completed)
            {
                Self::check_lost(&t)?;
                return Err(DeviceError::Timeout {
                    fence,
                    waited: timeout,
                });
            }
        }

        t.events.push(TimelineEvent::WaitEnded { fence });
        Ok(())
    }

    fn rebuild_swapchain(&mut self, extent: Extent) -> Result<(), DeviceError> {
        let mut t = self.shared.timeline.lock();
        Self::check_lost(&t)?;
        self.extent = extent;
        self.surface_extent = extent;
        self.generation += 1;
        t.events.push(TimelineEvent::SwapchainRebuilt { extent });
        Ok(())
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        let submitted = self.shared.timeline.lock().submitted;
        self.wait_for_fence(submitted, timeout)
    }
}
