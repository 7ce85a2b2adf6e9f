use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{AppControl, EngineConfig, FrameLoop, Simulation};
use crate::device::{Extent, GpuInit, WgpuBackend};
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "cadence".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Entry point: opens one window and drives a `FrameLoop` from its redraws.
pub struct Runtime;

impl Runtime {
    pub fn run<S>(window: RuntimeConfig, engine: EngineConfig, sim: S) -> Result<()>
    where
        S: Simulation + 'static,
    {
        engine.validate().context("invalid engine configuration")?;

        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState {
            window,
            engine,
            sim,
            entry: None,
            failed: None,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    frame_loop: FrameLoop<WgpuBackend<'this>>,
}

struct AppState<S: Simulation + 'static> {
    window: RuntimeConfig,
    engine: EngineConfig,
    sim: S,
    entry: Option<WindowEntry>,
    /// First fatal error; returned from `Runtime::run` once the loop exits.
    failed: Option<anyhow::Error>,
}

impl<S: Simulation + 'static> AppState<S> {
    fn create_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.window.title.clone())
            .with_inner_size(self.window.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let engine = self.engine;
        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            frame_loop_builder: |w| {
                let init = GpuInit::from_present(&engine.present);
                let gpu = pollster::block_on(WgpuBackend::new(w, init))
                    .context("GPU initialization failed")?;
                Ok::<_, anyhow::Error>(FrameLoop::new(gpu, &engine)?)
            },
        }
        .try_build()?;

        let sim = &mut self.sim;
        entry.with_frame_loop_mut(|fl| fl.setup(sim))?;
        entry.with_clock_mut(|c| c.reset());

        self.entry = Some(entry);
        Ok(())
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            match entry.with_frame_loop_mut(|fl| fl.shutdown()) {
                Ok(drained) => log::debug!("window closed, {drained} frames drained"),
                Err(err) => log::warn!("shutdown did not complete: {err}"),
            }
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.failed.is_none() {
            self.failed = Some(err);
        }
        // Dropping the entry after a fatal error skips the drain.
        self.entry = None;
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let sim = &mut self.sim;
        let result = entry.with_mut(|fields| {
            let ft = fields.clock.tick();
            fields.frame_loop.run_frame(ft.dt, sim)
        });

        match result {
            Ok(report) => {
                if report.control == AppControl::Exit {
                    self.close(event_loop);
                }
            }
            Err(err) if err.is_fatal() => {
                self.fail(event_loop, anyhow::Error::new(err).context("frame loop stopped"))
            }
            Err(err) => log::warn!("frame dropped: {err}"),
        }
    }
}

fn extent_of(size: PhysicalSize<u32>) -> Extent {
    Extent::new(size.width, size.height)
}

impl<S: Simulation + 'static> ApplicationHandler for AppState<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        if let Err(err) = self.create_entry(event_loop) {
            self.fail(event_loop, err.context("failed to start"));
            return;
        }

        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        // Continuous redraw; the simulation advances only from redraws.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.entry.is_none() {
            return;
        }

        if self.sim.on_window_event(&event) == AppControl::Exit {
            self.close(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.close(event_loop),

            WindowEvent::Resized(size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_frame_loop_mut(|fl| fl.resize(extent_of(*size)));
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.with_frame_loop_mut(|fl| fl.resize(extent_of(size)));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            if let Err(err) = entry.with_frame_loop_mut(|fl| fl.shutdown()) {
                log::warn!("shutdown at exit did not complete: {err}");
            }
        }
    }
}
