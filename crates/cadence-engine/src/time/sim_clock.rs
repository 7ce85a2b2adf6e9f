use serde::{Deserialize, Serialize};

/// Tolerance for residuals that land a rounding error short of a whole step.
const STEP_EPSILON: f64 = 1e-9;

/// Fixed-step clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Fixed simulation increment in seconds.
    pub fixed_dt: f64,
    /// Upper bound on steps run in a single `advance` call.
    pub max_steps_per_frame: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_steps_per_frame: 8,
        }
    }
}

/// Accumulated time could not be consumed within the step cap.
///
/// The whole-step backlog is dropped; only the fractional residual is kept so
/// interpolation stays continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallingBehind {
    pub requested_steps: u64,
    pub dropped_steps: u64,
    pub dropped_time: f64,
}

/// Result of one `SimClock::advance` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    /// Number of fixed steps to run this frame.
    pub steps: u32,
    /// Blend factor between the last two step snapshots, in `[0, 1)`.
    pub alpha: f32,
    pub falling_behind: Option<FallingBehind>,
}

/// Snapshot of the clock's accumulated state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationTime {
    pub total_steps: u64,
    pub residual: f64,
    pub alpha: f32,
    pub fixed_dt: f64,
    /// Simulated seconds, `total_steps * fixed_dt`.
    pub elapsed: f64,
    /// Wall time dropped by the step cap since creation.
    pub dropped: f64,
}

/// Converts variable wall-clock deltas into a deterministic count of fixed steps.
#[derive(Debug, Clone)]
pub struct SimClock {
    fixed_dt: f64,
    max_steps: u32,
    residual: f64,
    total_steps: u64,
    dropped: f64,
    alpha: f32,
}

impl SimClock {
    /// Creates a clock. `fixed_dt` must be positive and finite, `max_steps_per_frame`
    /// at least one; `EngineConfig::validate` enforces both for configured loops.
    pub fn new(config: ClockConfig) -> Self {
        debug_assert!(config.fixed_dt > 0.0 && config.fixed_dt.is_finite());
        debug_assert!(config.max_steps_per_frame > 0);
        Self {
            fixed_dt: config.fixed_dt,
            max_steps: config.max_steps_per_frame.max(1),
            residual: 0.0,
            total_steps: 0,
            dropped: 0.0,
            alpha: 0.0,
        }
    }

    #[inline]
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Accumulates `wall_delta` seconds and returns how many fixed steps to run.
    ///
    /// Negative or non-finite deltas are treated as zero.
    pub fn advance(&mut self, wall_delta: f64) -> ClockTick {
        let delta = if wall_delta.is_finite() && wall_delta > 0.0 {
            wall_delta
        } else {
            if wall_delta != 0.0 {
                log::debug!("ignoring invalid wall delta {wall_delta}");
            }
            0.0
        };

        self.residual += delta;

        let available = ((self.residual + STEP_EPSILON) / self.fixed_dt).floor() as u64;
        let steps = available.min(self.max_steps as u64);

        let falling_behind = if available > steps {
            let dropped_steps = available - steps;
            let dropped_time = dropped_steps as f64 * self.fixed_dt;
            self.dropped += dropped_time;
            Some(FallingBehind {
                requested_steps: available,
                dropped_steps,
                dropped_time,
            })
        } else {
            None
        };

        self.residual = (self.residual - available as f64 * self.fixed_dt).max(0.0);
        self.total_steps += steps;
        self.alpha = (self.residual / self.fixed_dt).clamp(0.0, 1.0) as f32;

        ClockTick {
            steps: steps as u32,
            alpha: self.alpha,
            falling_behind,
        }
    }

    pub fn time(&self) -> SimulationTime {
        SimulationTime {
            total_steps: self.total_steps,
            residual: self.residual,
            alpha: self.alpha,
            fixed_dt: self.fixed_dt,
            elapsed: self.total_steps as f64 * self.fixed_dt,
            dropped: self.dropped,
        }
    }

    /// Discards accumulated residual; step count is kept.
    pub fn reset_residual(&mut self) {
        self.residual = 0.0;
        self.alpha = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn clock(dt: f64, max: u32) -> SimClock {
        SimClock::new(ClockConfig {
            fixed_dt: dt,
            max_steps_per_frame: max,
        })
    }

    #[test]
    fn sub_step_deltas_accumulate() {
        let mut c = clock(0.02, 8);
        let steps: Vec<u32> = [0.016, 0.016, 0.016]
            .into_iter()
            .map(|d| c.advance(d).steps)
            .collect();
        assert_eq!(steps, vec![0, 1, 1]);
        assert!((c.time().residual - 0.008).abs() < 1e-9);
    }

    #[test]
    fn alpha_reflects_residual() {
        let mut c = clock(0.02, 8);
        let tick = c.advance(0.03);
        assert_eq!(tick.steps, 1);
        assert!((tick.alpha - 0.5).abs() < 1e-5);
    }

    #[test]
    fn step_cap_drops_backlog() {
        let mut c = clock(0.01, 4);
        let tick = c.advance(0.105);
        assert_eq!(tick.steps, 4);

        let behind = tick.falling_behind.expect("cap must trigger");
        assert_eq!(behind.requested_steps, 10);
        assert_eq!(behind.dropped_steps, 6);
        assert!((c.time().residual - 0.005).abs() < 1e-9);
        assert!(tick.alpha < 1.0);
    }

    #[test]
    fn exact_multiples_do_not_lose_a_step() {
        let mut c = clock(0.1, 8);
        let total: u32 = (0..3).map(|_| c.advance(0.1).steps).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn invalid_deltas_are_ignored() {
        let mut c = clock(0.02, 8);
        assert_eq!(c.advance(-1.0).steps, 0);
        assert_eq!(c.advance(f64::NAN).steps, 0);
        assert_eq!(c.time().residual, 0.0);
    }

    #[test]
    fn simulated_time_never_outruns_wall_time() {
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let dt = rng.gen_range(0.001..0.05);
            let max = rng.gen_range(1..10);
            let mut c = clock(dt, max);
            let mut wall = 0.0;

            for _ in 0..2_000 {
                let delta = match rng.gen_range(0..20) {
                    0 => -rng.gen_range(0.0..1.0),
                    1 => f64::NAN,
                    2 => rng.gen_range(0.1..2.0),
                    _ => rng.gen_range(0.0..dt * 3.0),
                };
                if delta.is_finite() && delta > 0.0 {
                    wall += delta;
                }

                let tick = c.advance(delta);
                let time = c.time();
                assert!(tick.steps <= max, "seed {seed}: {} steps", tick.steps);
                assert!(
                    time.elapsed <= wall + dt + 1e-9,
                    "seed {seed}: elapsed {} wall {wall}",
                    time.elapsed
                );
                assert!((0.0..=1.0).contains(&tick.alpha));
                let accounted = time.elapsed + time.dropped + time.residual;
                assert!((accounted - wall).abs() < 1e-6 * (1.0 + wall));
            }
        }
    }
}
