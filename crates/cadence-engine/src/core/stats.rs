use std::fmt;

/// Running totals kept by the `FrameLoop`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    pub presented: u64,
    pub skipped: u64,
    pub steps: u64,
    /// Fixed steps discarded because the clock fell behind.
    pub dropped_steps: u64,
    pub dropped_time: f64,
    pub isolated_bodies: u64,
    pub swapchain_rebuilds: u64,
    /// Instances drawn in the most recent presented frame.
    pub last_instances: usize,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames {} (presented {}, skipped {}), steps {} (dropped {}), isolated {}, rebuilds {}",
            self.frames,
            self.presented,
            self.skipped,
            self.steps,
            self.dropped_steps,
            self.isolated_bodies,
            self.swapchain_rebuilds
        )
    }
}
