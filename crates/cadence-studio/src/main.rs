//! Falling bodies scene on the wgpu backend.
//!
//! Usage: `cadence-studio [engine.toml]`. Space drops a fresh wave, R clears
//! the scene, a left click kicks the body under the cursor upwards, F1 toggles
//! collider outlines, Escape quits.

use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use cadence_engine::core::{AppControl, EngineConfig, Simulation, UpdateCtx};
use cadence_engine::ecs::{Entity, EntityStore, StoreError};
use cadence_engine::logging::{init_logging, LoggingConfig};
use cadence_engine::physics::{BodyKind, RigidBody, Shape, Transform};
use cadence_engine::render::{Color, MeshId, Overlay, OverlayRecorder, Renderable};
use cadence_engine::window::{Runtime, RuntimeConfig};

const WAVE: usize = 48;
const KILL_HEIGHT: f32 = -20.0;
const GROUND_SIZE: f32 = 40.0;
const KICK_SPEED: f32 = 8.0;

#[derive(Default)]
struct Hud {
    alpha: f32,
    steps_per_frame: f32,
    skipped_ratio: f32,
    bodies: usize,
}

impl Overlay for Hud {
    fn record(&mut self, ui: &mut OverlayRecorder) {
        let track = Color::from_straight(0.1, 0.1, 0.12, 0.8);
        let (x, w, h) = (12.0, 180.0, 8.0);

        ui.meter(x, 12.0, w, h, self.alpha, Color::from_srgb_u8(94, 196, 255, 255), track);
        ui.meter(x, 24.0, w, h, self.steps_per_frame / 4.0, Color::from_srgb_u8(140, 220, 120, 255), track);
        ui.meter(x, 36.0, w, h, self.skipped_ratio, Color::from_srgb_u8(240, 120, 90, 255), track);
        ui.meter(x, 48.0, w, h, self.bodies as f32 / 512.0, Color::from_srgb_u8(230, 210, 120, 255), track);
    }
}

/// Spawns waves of spheres and boxes over a static ground slab.
struct FallingBodies {
    bodies: Vec<Entity>,
    waves: u32,
    pending_wave: bool,
    pending_clear: bool,
    pending_kick: bool,
    toggle_outlines: bool,
    cursor: (f32, f32),
    hud: Hud,
}

impl FallingBodies {
    fn new() -> Self {
        Self {
            bodies: Vec::new(),
            waves: 0,
            pending_wave: false,
            pending_clear: false,
            pending_kick: false,
            toggle_outlines: false,
            cursor: (0.0, 0.0),
            hud: Hud::default(),
        }
    }

    fn spawn_wave(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        let wave = self.waves;
        self.waves += 1;

        for i in 0..WAVE {
            // Cheap deterministic scatter; no two waves line up exactly.
            let seed = (i as u32).wrapping_mul(2_654_435_761) ^ wave.wrapping_mul(40_503);
            let jitter = |shift: u32| ((seed >> shift) & 0xff) as f32 / 255.0 - 0.5;

            let col = (i % 8) as f32 - 3.5;
            let row = (i / 8) as f32 - 2.5;
            let position = Vec3::new(col * 1.6 + jitter(0), 8.0 + (i % 5) as f32 * 1.5, row * 1.6 + jitter(8));

            let e = store.create();
            let (shape, mesh, scale) = if i % 3 == 0 {
                let half = Vec3::splat(0.4 + 0.2 * jitter(16).abs());
                (Shape::Box { half_extents: half }, MeshId::Cube, half * 2.0)
            } else {
                let radius = 0.35 + 0.3 * jitter(24).abs();
                (Shape::Sphere { radius }, MeshId::Sphere, Vec3::splat(radius * 2.0))
            };

            let rotation = Quat::from_rotation_y(jitter(4) * std::f32::consts::PI);
            store.add_component(
                e,
                Transform::from_position(position)
                    .with_scale(scale)
                    .with_rotation(rotation),
            )?;
            store.add_component(
                e,
                RigidBody::dynamic(1.0, shape)
                    .with_velocity(Vec3::new(jitter(12) * 2.0, 0.0, jitter(20) * 2.0))
                    .with_angular_velocity(Vec3::new(0.0, jitter(2) * 3.0, jitter(6) * 3.0)),
            )?;

            let hue = (i as f32 / WAVE as f32 + wave as f32 * 0.17).fract();
            store.add_component(e, Renderable::new(mesh, palette(hue)))?;
            self.bodies.push(e);
        }

        log::info!("wave {wave}: {} bodies live", self.bodies.len());
        Ok(())
    }

    /// Casts a ray through the cursor and launches the first dynamic body hit.
    fn kick(&mut self, ctx: &mut UpdateCtx<'_>) {
        let (x, y) = self.cursor;
        let (from, to) = ctx.camera.ray_through(x, y, ctx.extent.width, ctx.extent.height);
        let Some(hit) = ctx.physics.raycast(from, to) else {
            return;
        };
        if let Ok(body) = ctx.store.get_mut::<RigidBody>(hit.entity) {
            if body.effective_kind() == BodyKind::Dynamic {
                body.linear_velocity.y += KICK_SPEED;
                log::debug!("kicked {:?} at {}", hit.entity, hit.point);
            }
        }
    }

    fn clear(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        for e in self.bodies.drain(..) {
            store.destroy(e)?;
        }
        Ok(())
    }

    /// Removes bodies that fell off the ground slab.
    fn cull(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        let mut kept = Vec::with_capacity(self.bodies.len());
        for e in self.bodies.drain(..) {
            let fallen = store
                .get::<Transform>(e)
                .map(|t| t.position.y < KILL_HEIGHT)?;
            if fallen {
                store.destroy(e)?;
            } else {
                kept.push(e);
            }
        }
        self.bodies = kept;
        Ok(())
    }
}

fn palette(t: f32) -> Color {
    let c = |phase: f32| 0.5 + 0.45 * (std::f32::consts::TAU * (t + phase)).cos();
    Color::from_straight(c(0.0), c(0.33), c(0.67), 1.0)
}

impl Simulation for FallingBodies {
    fn setup(&mut self, store: &mut EntityStore) -> Result<(), StoreError> {
        let ground = store.create();
        store.add_component(
            ground,
            Transform::IDENTITY.with_scale(Vec3::new(GROUND_SIZE, 1.0, GROUND_SIZE)),
        )?;
        store.add_component(
            ground,
            RigidBody::fixed(Shape::Box {
                half_extents: Vec3::new(GROUND_SIZE * 0.5, 0.05, GROUND_SIZE * 0.5),
            }),
        )?;
        store.add_component(
            ground,
            Renderable::new(MeshId::Plane, Color::from_srgb_u8(60, 64, 72, 255)),
        )?;

        self.spawn_wave(store)
    }

    fn fixed_update(&mut self, store: &mut EntityStore, _dt: f64) -> Result<(), StoreError> {
        if self.pending_clear {
            self.pending_clear = false;
            self.clear(store)?;
        }
        if self.pending_wave {
            self.pending_wave = false;
            self.spawn_wave(store)?;
        }
        self.cull(store)
    }

    fn update(&mut self, ctx: &mut UpdateCtx<'_>) -> AppControl {
        let t = ctx.time.elapsed as f32;
        ctx.camera.eye = Vec3::new(14.0 * (t * 0.1).sin(), 7.0, 14.0 * (t * 0.1).cos());

        if std::mem::take(&mut self.pending_kick) {
            self.kick(ctx);
        }
        if std::mem::take(&mut self.toggle_outlines) {
            *ctx.debug_physics = !*ctx.debug_physics;
        }

        let stats = ctx.stats;
        self.hud = Hud {
            alpha: ctx.time.alpha,
            steps_per_frame: (ctx.frame_dt / ctx.time.fixed_dt) as f32,
            skipped_ratio: if stats.frames == 0 {
                0.0
            } else {
                stats.skipped as f32 / stats.frames as f32
            },
            bodies: self.bodies.len(),
        };

        if stats.frames > 0 && stats.frames % 600 == 0 {
            log::info!("{stats}");
        }
        AppControl::Continue
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                return AppControl::Continue;
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.pending_kick = true;
                return AppControl::Continue;
            }
            _ => {}
        }

        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        else {
            return AppControl::Continue;
        };

        match code {
            KeyCode::Escape => return AppControl::Exit,
            KeyCode::Space => self.pending_wave = true,
            KeyCode::KeyR => self.pending_clear = true,
            KeyCode::F1 => self.toggle_outlines = true,
            _ => {}
        }
        AppControl::Continue
    }

    fn overlay(&mut self) -> Option<&mut dyn Overlay> {
        Some(&mut self.hud)
    }
}

fn load_config() -> Result<EngineConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(EngineConfig::default());
    };
    let source =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let config =
        EngineConfig::from_toml_str(&source).with_context(|| format!("invalid config {path}"))?;
    log::info!("loaded engine config from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = load_config()?;
    Runtime::run(
        RuntimeConfig {
            title: "cadence studio".to_string(),
            ..RuntimeConfig::default()
        },
        config,
        FallingBodies::new(),
    )
}
