use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, Extent, GpuBackend, PresentError, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    pub acquire_timeout_ms: u64,
    /// Pace presentation to the display (FIFO) instead of presenting immediately.
    pub vsync: bool,
    pub prefer_srgb: bool,
    /// Swap chain latency hint; keep at or below the frame ring size.
    pub frame_latency: u32,
}

impl PresentConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 1_000,
            vsync: true,
            prefer_srgb: true,
            frame_latency: 2,
        }
    }
}

/// A swap chain image lent to the render graph for one frame.
#[derive(Debug)]
pub struct PresentableImage<I> {
    pub image: I,
    /// Fires when the image may be rendered into.
    pub ready: Semaphore,
}

/// Why a frame produced no image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero-area surface; nothing can be presented.
    Minimized,
    /// The swap chain was out of date or lost and has just been rebuilt.
    SwapchainRebuilt,
    AcquireTimeout,
}

#[derive(Debug)]
pub enum AcquireOutcome<I> {
    Acquired(PresentableImage<I>),
    Skipped(SkipReason),
}

/// Owns swap chain policy: when to rebuild, when to skip a frame.
///
/// Resizes only mark the swap chain dirty; the rebuild happens at the next
/// acquisition and is deferred while the surface has no area.
#[derive(Debug)]
pub struct PresentationEngine {
    requested: Extent,
    dirty: bool,
    rebuilds: u64,
    acquire_timeout: Duration,
}

impl PresentationEngine {
    pub fn new(config: &PresentConfig, extent: Extent) -> Self {
        Self {
            requested: extent,
            dirty: false,
            rebuilds: 0,
            acquire_timeout: config.acquire_timeout(),
        }
    }

    /// Records the window's new drawable size.
    pub fn resize(&mut self, extent: Extent) {
        if extent != self.requested {
            log::debug!("surface resized to {}x{}", extent.width, extent.height);
            self.requested = extent;
            self.dirty = true;
        }
    }

    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.requested.is_empty()
    }

    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.dirty
    }

    /// Swap chain rebuilds performed so far.
    #[inline]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Acquires the next image, rebuilding the swap chain first if it is dirty.
    ///
    /// Only device failures are errors; every surface problem turns into a skip.
    pub fn acquire_image<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        signal: Semaphore,
    ) -> Result<AcquireOutcome<B::Image>, DeviceError> {
        if self.is_minimized() {
            return Ok(AcquireOutcome::Skipped(SkipReason::Minimized));
        }
        if self.dirty {
            self.rebuild(backend)?;
        }

        match backend.acquire_image(signal, self.acquire_timeout) {
            Ok(image) => Ok(AcquireOutcome::Acquired(PresentableImage {
                image,
                ready: signal,
            })),
            Err(err @ (PresentError::OutOfDate | PresentError::SurfaceLost)) => {
                log::warn!("{err}; rebuilding swap chain and skipping frame");
                self.rebuild(backend)?;
                Ok(AcquireOutcome::Skipped(SkipReason::SwapchainRebuilt))
            }
            Err(PresentError::Timeout) => {
                log::debug!("swap chain image acquisition timed out");
                Ok(AcquireOutcome::Skipped(SkipReason::AcquireTimeout))
            }
            Err(PresentError::Device(err)) => Err(err),
        }
    }

    /// Queues `image` for display after `wait`. Returns `false` if the swap chain
    /// turned out stale; it is rebuilt at the next acquisition.
    pub fn present<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        image: B::Image,
        wait: &[Semaphore],
    ) -> Result<bool, DeviceError> {
        match backend.present(image, wait) {
            Ok(()) => Ok(true),
            Err(err @ (PresentError::OutOfDate | PresentError::SurfaceLost)) => {
                log::warn!("{err} at present; rebuilding before next frame");
                self.dirty = true;
                Ok(false)
            }
            Err(PresentError::Timeout) => Ok(false),
            Err(PresentError::Device(err)) => Err(err),
        }
    }

    fn rebuild<B: GpuBackend>(&mut self, backend: &mut B) -> Result<(), DeviceError> {
        backend.rebuild_swapchain(self.requested)?;
        self.dirty = false;
        self.rebuilds += 1;
        log::info!(
            "swap chain rebuilt at {}x{}",
            self.requested.width,
            self.requested.height
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::{CompletionMode, SimulatedBackend, TimelineEvent};

    fn setup() -> (PresentationEngine, SimulatedBackend) {
        let extent = Extent::new(64, 64);
        (
            PresentationEngine::new(&PresentConfig::default(), extent),
            SimulatedBackend::new(extent, CompletionMode::Immediate),
        )
    }

    #[test]
    fn out_of_date_rebuilds_and_skips() {
        let (mut engine, mut gpu) = setup();
        gpu.fail_next_acquire(PresentError::OutOfDate);

        let outcome = engine.acquire_image(&mut gpu, Semaphore(0)).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Skipped(SkipReason::SwapchainRebuilt)));
        assert_eq!(engine.rebuilds(), 1);

        let outcome = engine.acquire_image(&mut gpu, Semaphore(0)).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired(_)));
    }

    #[test]
    fn resize_defers_rebuild_to_next_acquire() {
        let (mut engine, mut gpu) = setup();
        engine.resize(Extent::new(128, 96));
        gpu.resize_surface(Extent::new(128, 96));
        assert!(engine.needs_rebuild());
        assert_eq!(gpu.extent(), Extent::new(64, 64));

        let outcome = engine.acquire_image(&mut gpu, Semaphore(0)).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired(_)));
        assert_eq!(gpu.extent(), Extent::new(128, 96));
        assert!(
            gpu.events()
                .contains(&TimelineEvent::SwapchainRebuilt { extent: Extent::new(128, 96) })
        );
    }

    #[test]
    fn minimized_surface_is_never_rebuilt() {
        let (mut engine, mut gpu) = setup();
        engine.resize(Extent::new(0, 0));

        let outcome = engine.acquire_image(&mut gpu, Semaphore(0)).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Skipped(SkipReason::Minimized)));
        assert_eq!(engine.rebuilds(), 0);
        assert!(engine.needs_rebuild());
    }

    #[test]
    fn device_errors_propagate() {
        let (mut engine, mut gpu) = setup();
        gpu.fail_next_acquire(PresentError::Device(DeviceError::OutOfMemory));
        assert_eq!(
            engine.acquire_image(&mut gpu, Semaphore(0)).unwrap_err(),
            DeviceError::OutOfMemory
        );
    }

    #[test]
    fn stale_present_marks_dirty() {
        let (mut engine, mut gpu) = setup();
        let AcquireOutcome::Acquired(img) = engine.acquire_image(&mut gpu, Semaphore(0)).unwrap()
        else {
            panic!("expected an image");
        };
        gpu.fail_next_present(PresentError::OutOfDate);

        assert!(!engine.present(&mut gpu, img.image, &[Semaphore(1)]).unwrap());
        assert!(engine.needs_rebuild());
    }
}
