use super::{DeviceError, Extent, PresentError};

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(f) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Some(f);
        }
    }

    caps.formats.first().copied()
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn map_surface_error(err: wgpu::SurfaceError) -> PresentError {
    match err {
        wgpu::SurfaceError::Outdated => PresentError::OutOfDate,
        wgpu::SurfaceError::Lost => PresentError::SurfaceLost,
        wgpu::SurfaceError::Timeout => PresentError::Timeout,
        wgpu::SurfaceError::OutOfMemory => PresentError::Device(DeviceError::OutOfMemory),
        // Unspecified platform failure; treat like a lost surface and rebuild.
        wgpu::SurfaceError::Other => PresentError::SurfaceLost,
    }
}

pub(crate) fn configure(
    surface: &wgpu::Surface<'_>,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    extent: Extent,
) {
    config.width = extent.width;
    config.height = extent.height;
    surface.configure(device, config);
}
