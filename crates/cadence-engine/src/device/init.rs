use crate::present::PresentConfig;

/// Settings for `WgpuBackend::new`.
///
/// Usually built from `PresentConfig` with `GpuInit::from_present`; the
/// remaining fields only matter for hosts with unusual adapters.
#[derive(Debug, Clone)]
pub struct GpuInit {
    pub prefer_srgb: bool,

    /// `Fifo` when vsync is on; paces the frame loop to the display.
    pub present_mode: wgpu::PresentMode,

    /// Falls back to the first supported mode when unset or unsupported.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Surface latency hint. Keep it at or below the frame ring size, otherwise
    /// fence waits in the ring become the only throttle.
    pub desired_maximum_frame_latency: u32,
}

impl GpuInit {
    pub fn from_present(config: &PresentConfig) -> Self {
        let present_mode = if config.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        Self {
            prefer_srgb: config.prefer_srgb,
            present_mode,
            desired_maximum_frame_latency: config.frame_latency,
            ..Self::default()
        }
    }
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
