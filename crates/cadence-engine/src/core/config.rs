use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::RingConfig;
use crate::physics::PhysicsConfig;
use crate::present::PresentConfig;
use crate::time::ClockConfig;

/// Longest accepted device wait, in milliseconds (ten minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Every tunable of the engine core.
///
/// All sections are optional in TOML; missing fields take their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub clock: ClockConfig,
    pub physics: PhysicsConfig,
    pub ring: RingConfig,
    pub present: PresentConfig,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check<T: ToString>(
            ok: bool,
            field: &'static str,
            value: T,
            expected: &'static str,
        ) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    value: value.to_string(),
                    expected,
                })
            }
        }

        let c = &self.clock;
        check(
            c.fixed_dt.is_finite() && c.fixed_dt > 0.0,
            "clock.fixed_dt",
            c.fixed_dt,
            "> 0",
        )?;
        check(
            c.max_steps_per_frame >= 1,
            "clock.max_steps_per_frame",
            c.max_steps_per_frame,
            ">= 1",
        )?;

        let p = &self.physics;
        check(p.gravity.is_finite(), "physics.gravity", p.gravity, "finite")?;
        check(
            (0.0..=1.0).contains(&p.restitution),
            "physics.restitution",
            p.restitution,
            "0..=1",
        )?;
        check(
            p.linear_damping >= 0.0,
            "physics.linear_damping",
            p.linear_damping,
            ">= 0",
        )?;
        check(p.friction >= 0.0, "physics.friction", p.friction, ">= 0")?;
        check(p.max_speed > 0.0, "physics.max_speed", p.max_speed, "> 0")?;

        let r = &self.ring;
        check(
            (2..=3).contains(&r.frames_in_flight),
            "ring.frames_in_flight",
            r.frames_in_flight,
            "2..=3",
        )?;
        check(
            (1..=MAX_TIMEOUT_MS).contains(&r.fence_timeout_ms),
            "ring.fence_timeout_ms",
            r.fence_timeout_ms,
            "1..=600000",
        )?;
        check(
            (1..=MAX_TIMEOUT_MS).contains(&self.present.acquire_timeout_ms),
            "present.acquire_timeout_ms",
            self.present.acquire_timeout_ms,
            "1..=600000",
        )?;

        check(
            self.present.frame_latency >= 1,
            "present.frame_latency",
            self.present.frame_latency,
            ">= 1",
        )?;
        Ok(())
    }
}
