use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec3;
use parking_lot::Mutex;
use winit::window::Window;

use super::pipeline::{
    CORNER_INDICES, CameraUniform, Pipelines, UniformBinding, ViewportUniform, create_depth_view,
};
use super::surface::{choose_alpha_mode, choose_surface_format, configure, map_surface_error};
use super::{
    DeviceError, Extent, FenceValue, GpuBackend, GpuInit, PresentError, Semaphore, Submission,
};
use crate::render::{Color, DrawCommand, InstanceRaw, LineVertex, OverlayQuad};

/// Direction the scene's single light travels.
const LIGHT_DIR: Vec3 = Vec3::new(-0.4, -1.0, -0.3);

/// GPU objects that belong to one frame slot and are rewritten every use.
struct SlotResources {
    camera: UniformBinding,
    viewport: UniformBinding,
    instances: Option<wgpu::Buffer>,
    instance_capacity: usize,
    quads: Option<wgpu::Buffer>,
    quad_capacity: usize,
    lines: Option<wgpu::Buffer>,
    line_capacity: usize,
}

/// A swap chain image between acquisition and presentation.
pub struct WgpuImage {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// `GpuBackend` on top of wgpu.
///
/// wgpu orders queue work and swap chain access internally, so semaphores are
/// tracked only for logging. Fences map to wgpu submission indices; completion
/// is reported through `on_submitted_work_done` and device polling.
pub struct WgpuBackend<'w> {
    window: &'w Window,

    /// Surface lifetime is tied to `window` via `'w`.
    surface: wgpu::Surface<'w>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    extent: Extent,
    adapter_name: String,

    depth: wgpu::TextureView,
    pipelines: Pipelines,
    slots: Vec<SlotResources>,

    next_fence: FenceValue,
    pending: VecDeque<(FenceValue, wgpu::SubmissionIndex)>,
    completed: Arc<AtomicU64>,
    lost: Arc<Mutex<Option<String>>>,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the device and swap chain for `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("cadence device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(Mutex::new(None));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            *lost_flag.lock() = Some(message);
        });

        let caps = surface.get_capabilities(&adapter);
        let format =
            choose_surface_format(&caps, init.prefer_srgb).context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode: choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let adapter_name = adapter.get_info().name;
        log::info!("wgpu adapter '{adapter_name}', surface format {format:?}");

        let depth = create_depth_view(&device, size.width, size.height);
        let pipelines = Pipelines::new(&device, format);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            extent: Extent::new(size.width, size.height),
            adapter_name,
            depth,
            pipelines,
            slots: Vec::new(),
            next_fence: FenceValue::ZERO,
            pending: VecDeque::new(),
            completed: Arc::new(AtomicU64::new(0)),
            lost,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn check_lost(&self) -> Result<(), DeviceError> {
        match self.lost.lock().as_ref() {
            Some(reason) => Err(DeviceError::Lost {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn completed(&self) -> FenceValue {
        FenceValue(self.completed.load(Ordering::Acquire))
    }

    fn mark_completed(&self, fence: FenceValue) {
        self.completed.fetch_max(fence.0, Ordering::AcqRel);
    }

    fn forget_completed(&mut self) {
        let completed = self.completed();
        while self.pending.front().is_some_and(|(f, _)| f.is_reached_by(completed)) {
            self.pending.pop_front();
        }
    }

    fn ensure_slot(&mut self, slot: usize) {
        while self.slots.len() <= slot {
            self.slots.push(SlotResources {
                camera: self.pipelines.camera_binding(&self.device),
                viewport: self.pipelines.viewport_binding(&self.device),
                instances: None,
                instance_capacity: 0,
                quads: None,
                quad_capacity: 0,
                lines: None,
                line_capacity: 0,
            });
        }
    }

    /// Copies the slot's transient instance data into its GPU buffers.
    fn upload(&mut self, submission: &Submission<'_>) {
        self.ensure_slot(submission.slot);
        let device = &self.device;
        let queue = &self.queue;
        let res = &mut self.slots[submission.slot];

        let instances = submission.arena.instances();
        if !instances.is_empty() {
            ensure_capacity::<InstanceRaw>(
                device,
                &mut res.instances,
                &mut res.instance_capacity,
                instances.len(),
                "cadence instance vbo",
            );
            if let Some(buf) = res.instances.as_ref() {
                queue.write_buffer(buf, 0, bytemuck::cast_slice(instances));
            }
        }

        let quads = submission.arena.quads();
        if !quads.is_empty() {
            ensure_capacity::<OverlayQuad>(
                device,
                &mut res.quads,
                &mut res.quad_capacity,
                quads.len(),
                "cadence overlay vbo",
            );
            if let Some(buf) = res.quads.as_ref() {
                queue.write_buffer(buf, 0, bytemuck::cast_slice(quads));
            }
        }

        let lines = submission.arena.lines();
        if !lines.is_empty() {
            ensure_capacity::<LineVertex>(
                device,
                &mut res.lines,
                &mut res.line_capacity,
                lines.len(),
                "cadence debug line vbo",
            );
            if let Some(buf) = res.lines.as_ref() {
                queue.write_buffer(buf, 0, bytemuck::cast_slice(lines));
            }
        }

        let viewport = ViewportUniform {
            size: [self.extent.width.max(1) as f32, self.extent.height.max(1) as f32],
            _pad: [0.0; 2],
        };
        queue.write_buffer(&res.viewport.buffer, 0, bytemuck::bytes_of(&viewport));

        for cmd in submission.commands.commands() {
            if let DrawCommand::SetCamera(view_proj) = cmd {
                let camera = CameraUniform {
                    view_proj: view_proj.to_cols_array_2d(),
                    light_dir: LIGHT_DIR.normalize().extend(0.0).to_array(),
                };
                queue.write_buffer(&res.camera.buffer, 0, bytemuck::bytes_of(&camera));
            }
        }
    }

    fn encode(&self, submission: &Submission<'_>, image: &WgpuImage) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("cadence frame encoder"),
            });

        let clear = submission
            .commands
            .commands()
            .iter()
            .find_map(|c| match c {
                DrawCommand::Clear(color) => Some(*color),
                _ => None,
            })
            .unwrap_or(Color::BLACK);

        let res = &self.slots[submission.slot];
        let p = &self.pipelines;

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("cadence frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &image.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for cmd in submission.commands.commands() {
                match cmd {
                    DrawCommand::Clear(_) | DrawCommand::SetCamera(_) => {}
                    DrawCommand::DrawMeshes { mesh, instances } => {
                        let (Some(vbo), Some(gpu_mesh)) =
                            (res.instances.as_ref(), p.meshes.get(mesh.index()))
                        else {
                            continue;
                        };
                        rpass.set_pipeline(&p.world);
                        rpass.set_bind_group(0, &res.camera.bind_group, &[]);
                        rpass.set_vertex_buffer(0, gpu_mesh.vbo.slice(..));
                        rpass.set_vertex_buffer(1, vbo.slice(..));
                        rpass.set_index_buffer(gpu_mesh.ibo.slice(..), wgpu::IndexFormat::Uint16);
                        rpass.draw_indexed(0..gpu_mesh.index_count, 0, instances.clone());
                    }
                    DrawCommand::DrawLines { vertices } => {
                        let Some(vbo) = res.lines.as_ref() else { continue };
                        rpass.set_pipeline(&p.lines);
                        rpass.set_bind_group(0, &res.camera.bind_group, &[]);
                        rpass.set_vertex_buffer(0, vbo.slice(..));
                        rpass.draw(vertices.clone(), 0..1);
                    }
                    DrawCommand::DrawOverlay { quads } => {
                        let Some(vbo) = res.quads.as_ref() else { continue };
                        rpass.set_pipeline(&p.overlay);
                        rpass.set_bind_group(0, &res.viewport.bind_group, &[]);
                        rpass.set_vertex_buffer(0, p.corner_vbo.slice(..));
                        rpass.set_vertex_buffer(1, vbo.slice(..));
                        rpass.set_index_buffer(p.corner_ibo.slice(..), wgpu::IndexFormat::Uint16);
                        rpass.draw_indexed(0..CORNER_INDICES.len() as u32, 0, quads.clone());
                    }
                    DrawCommand::PresentBarrier => break,
                }
            }
        }

        encoder.finish()
    }
}

impl GpuBackend for WgpuBackend<'_> {
    type Image = WgpuImage;

    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn acquire_image(
        &mut self,
        signal: Semaphore,
        _timeout: Duration,
    ) -> Result<WgpuImage, PresentError> {
        self.check_lost()?;
        let texture = self
            .surface
            .get_current_texture()
            .map_err(map_surface_error)?;
        if texture.suboptimal {
            log::debug!("acquired suboptimal swap chain image");
        }
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        log::trace!("image acquired, signal {signal:?}");
        Ok(WgpuImage { texture, view })
    }

    fn submit(
        &mut self,
        submission: &Submission<'_>,
        image: &WgpuImage,
    ) -> Result<FenceValue, DeviceError> {
        self.check_lost()?;
        self.upload(submission);
        let commands = self.encode(submission, image);

        log::trace!(
            "slot {} frame {}: submit, wait {:?} signal {:?}",
            submission.slot,
            submission.frame,
            submission.wait,
            submission.signal
        );
        let index = self.queue.submit(std::iter::once(commands));

        self.next_fence = self.next_fence.next();
        let fence = self.next_fence;
        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(fence.0, Ordering::AcqRel);
        });
        self.pending.push_back((fence, index));
        Ok(fence)
    }

    fn present(&mut self, image: WgpuImage, wait: &[Semaphore]) -> Result<(), PresentError> {
        log::trace!("present, wait {wait:?}");
        drop(image.view);
        self.window.pre_present_notify();
        image.texture.present();
        Ok(())
    }

    fn completed_fence(&mut self) -> FenceValue {
        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            log::debug!("device poll failed: {err}");
        }
        self.forget_completed();
        self.completed()
    }

    fn wait_for_fence(&mut self, fence: FenceValue, timeout: Duration) -> Result<(), DeviceError> {
        self.check_lost()?;
        if fence.is_reached_by(self.completed()) {
            return Ok(());
        }

        let Some((_, index)) = self.pending.iter().find(|(f, _)| *f >= fence) else {
            // Never submitted through this backend; nothing to wait on.
            return Ok(());
        };

        let result = self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index.clone()),
            timeout: Some(timeout),
        });

        match result {
            Ok(_) => {
                self.mark_completed(fence);
                self.forget_completed();
                Ok(())
            }
            Err(wgpu::PollError::Timeout) => Err(DeviceError::Timeout {
                fence,
                waited: timeout,
            }),
            Err(err) => {
                self.check_lost()?;
                Err(DeviceError::Lost {
                    reason: err.to_string(),
                })
            }
        }
    }

    fn rebuild_swapchain(&mut self, extent: Extent) -> Result<(), DeviceError> {
        self.check_lost()?;
        configure(&self.surface, &self.device, &mut self.config, extent);
        self.depth = create_depth_view(&self.device, extent.width, extent.height);
        self.extent = extent;
        Ok(())
    }

    fn wait_idle(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        let latest = self.next_fence;
        self.wait_for_fence(latest, timeout)
    }
}

/// Grows `buffer` to hold at least `required` elements of `T`.
fn ensure_capacity<T>(
    device: &wgpu::Device,
    buffer: &mut Option<wgpu::Buffer>,
    capacity: &mut usize,
    required: usize,
    label: &str,
) {
    if required <= *capacity && buffer.is_some() {
        return;
    }

    let new_cap = required.next_power_of_two().max(64);
    *buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (new_cap * std::mem::size_of::<T>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    }));
    *capacity = new_cap;
}
