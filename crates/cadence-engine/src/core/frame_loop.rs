use std::time::Duration;

use super::{AppControl, EngineConfig, FrameStats, LoopError, Simulation, UpdateCtx};
use crate::device::{Extent, FenceValue, GpuBackend};
use crate::ecs::{Entity, EntityStore};
use crate::frame::FrameRing;
use crate::physics::{ColliderBounds, PhysicsBackend, PhysicsStepper, RapierBackend};
use crate::present::{AcquireOutcome, PresentationEngine, SkipReason};
use crate::render::{RenderGraph, Submitter};
use crate::time::{FallingBehind, SimClock};

/// What happened to the frame's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: usize, fence: FenceValue },
    Skipped(SkipReason),
}

/// Summary of one `FrameLoop::run_frame` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub steps: u32,
    pub alpha: f32,
    pub falling_behind: Option<FallingBehind>,
    /// Bodies isolated during this frame's steps.
    pub diverged: Vec<Entity>,
    pub outcome: FrameOutcome,
    pub control: AppControl,
}

/// Drives one frame at a time on the calling thread:
///
/// 1. the clock converts wall time into fixed steps
/// 2. each step runs `fixed_update` then the physics stepper
/// 3. `update` runs once
/// 4. the next ring slot is acquired, waiting on the device if needed
/// 5. a swap chain image is acquired (or the frame is skipped)
/// 6. the render graph records interpolated state, the submitter submits
/// 7. the image is presented behind the slot's render-finished signal
///
/// Any device failure is fatal: the loop stops accepting frames.
pub struct FrameLoop<B: GpuBackend, P: PhysicsBackend = RapierBackend> {
    backend: B,
    store: EntityStore,
    clock: SimClock,
    stepper: PhysicsStepper<P>,
    ring: FrameRing,
    graph: RenderGraph,
    submitter: Submitter,
    presenter: PresentationEngine,
    stats: FrameStats,
    debug_bounds: Vec<ColliderBounds>,
    fence_timeout: Duration,
    terminated: bool,
    shut_down: bool,
}

impl<B: GpuBackend> FrameLoop<B, RapierBackend> {
    /// Frame loop with the default rapier physics backend.
    pub fn new(backend: B, config: &EngineConfig) -> Result<Self, LoopError> {
        Self::with_physics(backend, RapierBackend::new(config.physics), config)
    }
}

impl<B: GpuBackend, P: PhysicsBackend> FrameLoop<B, P> {
    pub fn with_physics(backend: B, physics: P, config: &EngineConfig) -> Result<Self, LoopError> {
        let ring = FrameRing::new(&config.ring)?;
        let presenter = PresentationEngine::new(&config.present, backend.extent());
        log::info!(
            "frame loop on '{}': {} slots, fixed dt {}",
            backend.name(),
            ring.len(),
            config.clock.fixed_dt
        );

        Ok(Self {
            backend,
            store: EntityStore::new(),
            clock: SimClock::new(config.clock),
            stepper: PhysicsStepper::new(physics, config.clock.fixed_dt),
            ring,
            graph: RenderGraph::new(),
            submitter: Submitter::new(),
            presenter,
            stats: FrameStats::default(),
            debug_bounds: Vec::new(),
            fence_timeout: config.ring.fence_timeout(),
            terminated: false,
            shut_down: false,
        })
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn stepper(&self) -> &PhysicsStepper<P> {
        &self.stepper
    }

    pub fn stepper_mut(&mut self) -> &mut PhysicsStepper<P> {
        &mut self.stepper
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.graph
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Runs `sim.setup` and aligns the interpolation snapshots with the result.
    pub fn setup<S: Simulation + ?Sized>(&mut self, sim: &mut S) -> Result<(), LoopError> {
        sim.setup(&mut self.store)?;
        self.stepper.sync_snapshot(&self.store);
        Ok(())
    }

    /// Forwards a new drawable size; the swap chain is rebuilt lazily.
    pub fn resize(&mut self, extent: Extent) {
        self.presenter.resize(extent);
    }

    /// Runs one frame for `wall_delta` seconds of real time.
    pub fn run_frame<S: Simulation + ?Sized>(
        &mut self,
        wall_delta: f64,
        sim: &mut S,
    ) -> Result<FrameReport, LoopError> {
        if self.terminated || self.shut_down {
            return Err(LoopError::Terminated);
        }

        let result = self.frame(wall_delta, sim);
        if let Err(err) = &result {
            if err.is_fatal() {
                log::error!("fatal error, stopping frame loop: {err}");
                self.terminated = true;
            }
        }
        result
    }

    fn frame<S: Simulation + ?Sized>(
        &mut self,
        wall_delta: f64,
        sim: &mut S,
    ) -> Result<FrameReport, LoopError> {
        let frame = self.stats.frames;
        self.stats.frames += 1;

        // simulate
        let tick = self.clock.advance(wall_delta);
        if let Some(behind) = tick.falling_behind {
            log::warn!(
                "falling behind: dropped {} of {} steps ({:.3}s)",
                behind.dropped_steps,
                behind.requested_steps,
                behind.dropped_time
            );
            self.stats.dropped_steps += behind.dropped_steps;
            self.stats.dropped_time += behind.dropped_time;
        }

        let dt = self.clock.fixed_dt();
        let mut diverged = Vec::new();
        for _ in 0..tick.steps {
            sim.fixed_update(&mut self.store, dt)?;
            let report = self.stepper.step(&mut self.store, dt)?;
            self.stats.steps += 1;
            self.stats.isolated_bodies += report.diverged.len() as u64;
            diverged.extend(report.diverged);
        }

        let control = sim.update(&mut UpdateCtx {
            store: &mut self.store,
            camera: &mut self.graph.camera,
            physics: self.stepper.backend(),
            debug_physics: &mut self.graph.debug_physics,
            frame_dt: wall_delta,
            time: self.clock.time(),
            extent: self.backend.extent(),
            stats: &self.stats,
        });

        // render
        let slot = self.ring.acquire_slot(&mut self.backend)?;

        let outcome = self
            .presenter
            .acquire_image(&mut self.backend, slot.image_available());
        self.stats.swapchain_rebuilds = self.presenter.rebuilds();
        let image = match outcome? {
            AcquireOutcome::Acquired(image) => image,
            AcquireOutcome::Skipped(reason) => {
                slot.abandon()?;
                self.stats.skipped += 1;
                log::debug!("frame {frame} skipped: {reason:?}");
                return Ok(FrameReport {
                    frame,
                    steps: tick.steps,
                    alpha: tick.alpha,
                    falling_behind: tick.falling_behind,
                    diverged,
                    outcome: FrameOutcome::Skipped(reason),
                    control,
                });
            }
        };

        self.debug_bounds.clear();
        if self.graph.debug_physics {
            self.stepper.backend().collider_bounds(&mut self.debug_bounds);
        }
        let recorded = self.graph.record(
            slot,
            &self.store,
            self.stepper.previous(),
            self.stepper.current(),
            tick.alpha,
            self.backend.extent(),
            &self.debug_bounds,
            sim.overlay(),
        );
        let submitted = recorded.and_then(|recorded| {
            let fence = self.submitter.submit(&mut self.backend, slot, &image.image)?;
            Ok((recorded, fence))
        });
        let (recorded, fence) = match submitted {
            Ok(done) => done,
            Err(err) => {
                // The slot never reached the queue; hand it back for reuse.
                if let Err(stuck) = slot.abandon() {
                    log::warn!("slot {} not released after failed frame: {stuck}", slot.index());
                }
                return Err(err.into());
            }
        };
        self.stats.last_instances = recorded.instances;
        let slot_index = slot.index();
        let render_finished = slot.render_finished();

        if self
            .presenter
            .present(&mut self.backend, image.image, &[render_finished])?
        {
            self.stats.presented += 1;
        }

        Ok(FrameReport {
            frame,
            steps: tick.steps,
            alpha: tick.alpha,
            falling_behind: tick.falling_behind,
            diverged,
            outcome: FrameOutcome::Presented {
                slot: slot_index,
                fence,
            },
            control,
        })
    }

    /// Waits for every in-flight slot, then for the device to go idle.
    ///
    /// Returns the number of slots drained. The loop accepts no frames afterwards.
    pub fn shutdown(&mut self) -> Result<usize, LoopError> {
        if self.shut_down {
            return Ok(0);
        }
        self.shut_down = true;

        let drained = self.ring.drain(&mut self.backend)?;
        self.backend.wait_idle(self.fence_timeout)?;
        log::info!("shutdown drained {drained} in-flight frames; {}", self.stats);
        Ok(drained)
    }
}

impl<B: GpuBackend, P: PhysicsBackend> Drop for FrameLoop<B, P> {
    fn drop(&mut self) {
        if self.shut_down || self.terminated {
            return;
        }
        if let Err(err) = self.shutdown() {
            log::warn!("frame loop dropped without a clean shutdown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::device::DeviceError;
    use crate::device::sim::{CompletionMode, SimulatedBackend, TimelineEvent};
    use crate::frame::SlotState;
    use crate::physics::{RigidBody, Shape, Transform};
    use crate::render::{Color, MeshId, Renderable};

    struct Faller;

    impl Simulation for Faller {
        fn setup(&mut self, store: &mut EntityStore) -> Result<(), crate::ecs::StoreError> {
            let ball = store.create();
            store.add_component(ball, Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))?;
            store.add_component(ball, RigidBody::dynamic(1.0, Shape::Sphere { radius: 0.5 }))?;
            store.add_component(ball, Renderable::new(MeshId::Sphere, Color::WHITE))?;
            Ok(())
        }

        fn update(&mut self, _ctx: &mut UpdateCtx<'_>) -> AppControl {
            AppControl::Continue
        }
    }

    fn make(mode: CompletionMode) -> FrameLoop<SimulatedBackend> {
        let gpu = SimulatedBackend::new(Extent::new(320, 240), mode);
        FrameLoop::new(gpu, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn presents_and_steps() {
        let mut fl = make(CompletionMode::Immediate);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();

        let report = fl.run_frame(1.0 / 30.0, &mut sim).unwrap();
        assert_eq!(report.steps, 2);
        assert!(matches!(report.outcome, FrameOutcome::Presented { slot: 0, .. }));
        assert_eq!(fl.stats().presented, 1);
        assert_eq!(fl.stats().last_instances, 1);
    }

    #[test]
    fn submission_waits_on_acquire_and_signals_present() {
        let mut fl = make(CompletionMode::Immediate);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();
        fl.run_frame(0.016, &mut sim).unwrap();

        let events = fl.backend().events();
        let submitted = events.iter().find_map(|e| match e {
            TimelineEvent::Submitted { wait, signal, .. } => Some((wait.clone(), signal.clone())),
            _ => None,
        });
        let presented = events.iter().find_map(|e| match e {
            TimelineEvent::Presented { wait, .. } => Some(wait.clone()),
            _ => None,
        });

        let slot = fl.ring().slot(0).unwrap();
        assert_eq!(
            submitted,
            Some((vec![slot.image_available()], vec![slot.render_finished()]))
        );
        assert_eq!(presented, Some(vec![slot.render_finished()]));
    }

    #[test]
    fn minimized_frames_skip_without_submitting() {
        let mut fl = make(CompletionMode::Immediate);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();
        fl.resize(Extent::new(0, 0));

        let report = fl.run_frame(0.05, &mut sim).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Skipped(SkipReason::Minimized));
        assert!(report.steps > 0);
        assert_eq!(fl.backend().submitted_fence(), FenceValue::ZERO);
        assert_eq!(fl.ring().in_flight(), 0);
    }

    #[test]
    fn lost_device_terminates_loop() {
        let mut fl = make(CompletionMode::Immediate);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();
        fl.backend().handle().lose_device("unplugged");

        let err = fl.run_frame(0.016, &mut sim).unwrap_err();
        assert!(matches!(err, LoopError::DeviceLost(_)));
        assert!(fl.is_terminated());
        assert_eq!(fl.run_frame(0.016, &mut sim), Err(LoopError::Terminated));
    }

    #[test]
    fn failed_submission_releases_its_slot() {
        let mut fl = make(CompletionMode::Immediate);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();
        fl.backend_mut().fail_next_submit(DeviceError::OutOfMemory);

        let err = fl.run_frame(0.016, &mut sim).unwrap_err();
        assert_eq!(err, LoopError::DeviceLost(DeviceError::OutOfMemory));
        let slot = fl.ring().slot(0).unwrap();
        assert_eq!(slot.state(), SlotState::Idle);
        assert_eq!(slot.fence(), None);
        assert_eq!(fl.ring().in_flight(), 0);
        assert_eq!(fl.backend().submitted_fence(), FenceValue::ZERO);
    }

    #[test]
    fn shutdown_drains_in_flight_slots() {
        let mut fl = make(CompletionMode::OnWait);
        let mut sim = Faller;
        fl.setup(&mut sim).unwrap();
        fl.run_frame(0.016, &mut sim).unwrap();
        fl.run_frame(0.016, &mut sim).unwrap();
        assert_eq!(fl.ring().in_flight(), 2);

        assert_eq!(fl.shutdown().unwrap(), 2);
        assert_eq!(fl.ring().in_flight(), 0);
        assert_eq!(fl.run_frame(0.016, &mut sim), Err(LoopError::Terminated));
    }
}
