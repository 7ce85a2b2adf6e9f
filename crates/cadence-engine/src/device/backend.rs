use std::time::Duration;

use super::{DeviceError, Extent, FenceValue, PresentError, Semaphore, Submission};

/// The device and its swap chain, as seen by the frame loop.
///
/// The device executes asynchronously: `submit` only enqueues. Completion is
/// observed through the fence timeline, either by polling `completed_fence` or
/// by blocking in `wait_for_fence`.
pub trait GpuBackend {
    /// A swap chain image held between acquisition and presentation.
    type Image;

    fn name(&self) -> &str;

    /// Size the swap chain was last built for.
    fn extent(&self) -> Extent;

    /// Takes the next presentable image. `signal` fires once it is safe to render into.
    fn acquire_image(
        &mut self,
        signal: Semaphore,
        timeout: Duration,
    ) -> Result<Self::Image, PresentError>;

    /// Enqueues recorded work targeting `image` and returns its fence value.
    fn submit(
        &mut self,
        submission: &Submission<'_>,
        image: &Self::Image,
    ) -> Result<FenceValue, DeviceError>;

    /// Queues `image` for display once every signal in `wait` has fired.
    /// Does not block beyond enqueuing.
    fn present(&mut self, image: Self::Image, wait: &[Semaphore]) -> Result<(), PresentError>;

    /// Highest fence value known complete. Non-blocking.
    fn completed_fence(&mut self) -> FenceValue;

    /// Blocks until `fence` completes or `timeout` elapses.
    fn wait_for_fence(&mut self, fence: FenceValue, timeout: Duration) -> Result<(), DeviceError>;

    /// Recreates the swap chain at `extent`. Never called with an empty extent.
    fn rebuild_swapchain(&mut self, extent: Extent) -> Result<(), DeviceError>;

    /// Blocks until every submitted fence completes.
    fn wait_idle(&mut self, timeout: Duration) -> Result<(), DeviceError>;
}
