//! Frame pipelining against the simulated device timeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glam::Vec3;

use cadence_engine::core::{
    AppControl, EngineConfig, FrameLoop, FrameOutcome, LoopError, Simulation, UpdateCtx,
};
use cadence_engine::device::sim::{CompletionMode, SimulatedBackend, TimelineEvent};
use cadence_engine::device::{DeviceError, Extent, FenceValue, PresentError};
use cadence_engine::ecs::{EntityStore, StoreError};
use cadence_engine::physics::{RigidBody, Shape, Transform};
use cadence_engine::present::SkipReason;
use cadence_engine::render::{Color, MeshId, Renderable};

/// A small pile of bodies, some spinning, bouncing on the ground.
struct Pile;

impl Simulation for Pile {
    fn setup(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        for i in 0..24 {
            let e = store.create();
            let x = (i % 6) as f32 - 2.5;
            let y = 2.0 + (i / 6) as f32 * 1.3;
            store.add_component(e, Transform::from_position(Vec3::new(x, y, 0.0)))?;
            let shape = if i % 2 == 0 {
                Shape::Sphere { radius: 0.4 }
            } else {
                Shape::Box { half_extents: Vec3::splat(0.3) }
            };
            store.add_component(
                e,
                RigidBody::dynamic(1.0, shape)
                    .with_velocity(Vec3::new(0.3 * x, 0.0, 0.1))
                    .with_angular_velocity(Vec3::new(0.0, 1.0, 0.5)),
            )?;
            store.add_component(e, Renderable::new(MeshId::Cube, Color::WHITE))?;
        }
        Ok(())
    }

    fn update(&mut self, _ctx: &mut UpdateCtx<'_>) -> AppControl {
        AppControl::Continue
    }
}

fn frame_loop(config: EngineConfig, mode: CompletionMode) -> FrameLoop<SimulatedBackend> {
    let mut fl =
        FrameLoop::new(SimulatedBackend::new(Extent::new(320, 200), mode), &config).unwrap();
    fl.setup(&mut Pile).unwrap();
    fl
}

/// Irregular but reproducible frame times between 4ms and 40ms.
fn deltas(n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(|i| 0.004 + ((i * 7919) % 37) as f64 * 0.001)
}

fn positions(fl: &FrameLoop<SimulatedBackend>) -> Vec<[u32; 3]> {
    fl.store()
        .each::<(Transform,)>()
        .iter()
        .map(|(_, (t,))| t.position.to_array().map(f32::to_bits))
        .collect()
}

#[test]
fn identical_inputs_give_identical_worlds() {
    let run = || {
        let mut fl = frame_loop(EngineConfig::default(), CompletionMode::Immediate);
        for dt in deltas(240) {
            fl.run_frame(dt, &mut Pile).unwrap();
        }
        (positions(&fl), fl.stats().steps)
    };

    let (a, steps_a) = run();
    let (b, steps_b) = run();
    assert!(steps_a > 0);
    assert_eq!(steps_a, steps_b);
    assert_eq!(a, b);
}

#[test]
fn slots_are_never_reused_while_in_flight() {
    for frames_in_flight in [2, 3] {
        let mut config = EngineConfig::default();
        config.ring.frames_in_flight = frames_in_flight;
        let mut fl = frame_loop(config, CompletionMode::OnWait);

        for dt in deltas(200) {
            fl.run_frame(dt, &mut Pile).unwrap();
        }

        assert_eq!(fl.backend().hazards(), 0);
        assert!(fl.ring().in_flight() <= frames_in_flight);
        assert_eq!(fl.stats().presented, 200);
    }
}

#[test]
fn frame_loop_blocks_on_a_slow_device_thread() {
    let mut config = EngineConfig::default();
    config.ring.fence_timeout_ms = 5_000;
    let mut fl = frame_loop(config, CompletionMode::External);

    let handle = fl.backend().handle();
    let stop = Arc::new(AtomicBool::new(false));
    let gpu = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut completed = 0u64;
            while !stop.load(Ordering::Acquire) {
                if handle.wait_for_work(Duration::from_millis(10)) {
                    thread::sleep(Duration::from_millis(2));
                    if handle.complete_next().is_some() {
                        completed += 1;
                    }
                }
            }
            completed
        })
    };

    for _ in 0..30 {
        let report = fl.run_frame(1.0 / 60.0, &mut Pile).unwrap();
        assert!(matches!(report.outcome, FrameOutcome::Presented { .. }));
    }
    let drained = fl.shutdown().unwrap();
    assert!(drained <= fl.ring().len());

    stop.store(true, Ordering::Release);
    let completed = gpu.join().unwrap();

    assert_eq!(completed, 30);
    assert_eq!(fl.backend().hazards(), 0);
    let waits = fl
        .backend()
        .events()
        .iter()
        .filter(|e| matches!(e, TimelineEvent::WaitBegan { .. }))
        .count();
    assert!(waits > 0, "a 2ms device must stall at least one frame");
}

#[test]
fn stalled_device_is_fatal() {
    let mut config = EngineConfig::default();
    config.ring.fence_timeout_ms = 30;
    let mut fl = frame_loop(config, CompletionMode::External);

    fl.run_frame(0.016, &mut Pile).unwrap();
    fl.run_frame(0.016, &mut Pile).unwrap();

    let err = fl.run_frame(0.016, &mut Pile).unwrap_err();
    assert!(matches!(
        err,
        LoopError::DeviceLost(DeviceError::Timeout { fence: FenceValue(1), .. })
    ));
    assert!(fl.is_terminated());
    assert_eq!(fl.run_frame(0.016, &mut Pile).unwrap_err(), LoopError::Terminated);
}

#[test]
fn device_lost_while_waiting_stops_the_loop() {
    let mut fl = frame_loop(EngineConfig::default(), CompletionMode::External);
    let handle = fl.backend().handle();

    fl.run_frame(0.016, &mut Pile).unwrap();
    fl.run_frame(0.016, &mut Pile).unwrap();

    let killer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.lose_device("driver reset");
    });

    let err = fl.run_frame(0.016, &mut Pile).unwrap_err();
    killer.join().unwrap();
    assert_eq!(
        err,
        LoopError::DeviceLost(DeviceError::Lost {
            reason: "driver reset".into()
        })
    );
    assert!(err.is_fatal());
}

#[test]
fn out_of_date_swap_chain_skips_one_frame() {
    let mut fl = frame_loop(EngineConfig::default(), CompletionMode::Immediate);
    fl.run_frame(0.016, &mut Pile).unwrap();
    fl.backend_mut().fail_next_acquire(PresentError::OutOfDate);

    let skipped = fl.run_frame(0.016, &mut Pile).unwrap();
    assert_eq!(
        skipped.outcome,
        FrameOutcome::Skipped(SkipReason::SwapchainRebuilt)
    );

    let next = fl.run_frame(0.016, &mut Pile).unwrap();
    assert!(matches!(next.outcome, FrameOutcome::Presented { .. }));

    let stats = fl.stats();
    assert_eq!((stats.presented, stats.skipped, stats.swapchain_rebuilds), (2, 1, 1));
    assert_eq!(fl.backend().submitted_fence(), FenceValue(2));
}

#[test]
fn resize_rebuilds_before_acquiring() {
    let mut fl = frame_loop(EngineConfig::default(), CompletionMode::Immediate);
    let size = Extent::new(800, 600);
    fl.backend_mut().resize_surface(size);
    fl.resize(size);

    let report = fl.run_frame(0.016, &mut Pile).unwrap();
    assert!(matches!(report.outcome, FrameOutcome::Presented { .. }));

    let events = fl.backend().events();
    let rebuilt = events
        .iter()
        .position(|e| *e == TimelineEvent::SwapchainRebuilt { extent: size })
        .unwrap();
    let acquired = events
        .iter()
        .position(|e| matches!(e, TimelineEvent::Acquired { .. }))
        .unwrap();
    assert!(rebuilt < acquired);
}

#[test]
fn minimized_window_keeps_simulating() {
    let mut fl = frame_loop(EngineConfig::default(), CompletionMode::Immediate);
    fl.resize(Extent::new(0, 0));

    for _ in 0..10 {
        let report = fl.run_frame(1.0 / 60.0, &mut Pile).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Skipped(SkipReason::Minimized));
    }
    assert_eq!(fl.stats().steps, 10);
    assert_eq!(fl.backend().submitted_fence(), FenceValue::ZERO);

    fl.resize(Extent::new(320, 200));
    let report = fl.run_frame(1.0 / 60.0, &mut Pile).unwrap();
    assert!(matches!(report.outcome, FrameOutcome::Presented { .. }));
}

#[test]
fn shutdown_waits_for_every_slot() {
    let mut config = EngineConfig::default();
    config.ring.frames_in_flight = 3;
    let mut fl = frame_loop(config, CompletionMode::OnWait);

    for _ in 0..3 {
        fl.run_frame(0.016, &mut Pile).unwrap();
    }
    assert_eq!(fl.ring().in_flight(), 3);

    assert_eq!(fl.shutdown().unwrap(), 3);
    assert_eq!(fl.ring().in_flight(), 0);

    let backend = fl.backend();
    assert_eq!(backend.submitted_fence(), FenceValue(3));
    let completed = backend
        .events()
        .iter()
        .filter(|e| matches!(e, TimelineEvent::Completed { .. }))
        .count();
    assert_eq!(completed, 3);
}
