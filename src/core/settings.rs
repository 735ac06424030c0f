use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Microseconds per second; simulation time is kept in whole microseconds.
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Conditions of one experiment: a box of `box_width` x `box_height`, split by a vertical
/// barrier centered at `barrier_pos_x` with a gap ("hole") centered at `hole_pos_y`.
///
/// ```text
///  ____________________________________________
/// |                  |       |                 |
/// |                  |barrier|                 |
/// |                  |_______|                 |
/// |                     hole                   y <- hole_pos_y
/// |                   _______                  |
/// |                  |barrier|                 |
/// |__________________|___x___|_________________|
///                        ^ barrier_pos_x
/// ```
///
/// Real-valued parameters are stored as `f32`, which is the precision the trajectory
/// header carries, so a settings record survives a file round trip bit for bit.
///
/// The simulator assumes a valid configuration; call [`ExperimentSettings::validate`]
/// on anything that comes from a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentSettings {
    particle_count_left: u32,
    particle_count_right: u32,
    initial_speed: f32,
    /// Fraction of the relative kinetic energy lost in a particle-particle collision.
    speed_loss: f32,
    speed_delta_top: f32,
    speed_delta_sides: f32,
    speed_delta_bottom: f32,
    g: f32,
    box_width: f32,
    box_height: f32,
    barrier_pos_x: f32,
    barrier_width: f32,
    hole_pos_y: f32,
    hole_height: f32,
    particle_radius: f32,
    fps: u32,
    /// Duration in minutes.
    duration: u32,
    seed: i32,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            particle_count_left: 50,
            particle_count_right: 50,
            initial_speed: 1.0,
            speed_loss: 0.005,
            speed_delta_top: 0.05,
            speed_delta_sides: 0.05,
            speed_delta_bottom: 0.05,
            g: 9.8,
            box_width: 100.0,
            box_height: 100.0,
            barrier_pos_x: 45.0,
            barrier_width: 10.0,
            hole_pos_y: 45.0,
            hole_height: 10.0,
            particle_radius: 0.05,
            fps: 30,
            duration: 1,
            seed: 5_553_535,
        }
    }
}

impl ExperimentSettings {
    /// Start from the reference experiment.
    pub fn builder() -> ExperimentSettingsBuilder {
        ExperimentSettingsBuilder {
            inner: Self::default(),
        }
    }

    /// Builder seeded with a copy of these settings.
    pub fn to_builder(&self) -> ExperimentSettingsBuilder {
        ExperimentSettingsBuilder {
            inner: self.clone(),
        }
    }

    pub fn particle_count_left(&self) -> u32 {
        self.particle_count_left
    }

    pub fn particle_count_right(&self) -> u32 {
        self.particle_count_right
    }

    /// Total number of particles in every state of this experiment.
    pub fn particle_count(&self) -> usize {
        self.particle_count_left as usize + self.particle_count_right as usize
    }

    pub fn initial_speed(&self) -> f32 {
        self.initial_speed
    }

    pub fn speed_loss(&self) -> f32 {
        self.speed_loss
    }

    pub fn speed_delta_top(&self) -> f32 {
        self.speed_delta_top
    }

    pub fn speed_delta_sides(&self) -> f32 {
        self.speed_delta_sides
    }

    pub fn speed_delta_bottom(&self) -> f32 {
        self.speed_delta_bottom
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    pub fn box_width(&self) -> f32 {
        self.box_width
    }

    pub fn box_height(&self) -> f32 {
        self.box_height
    }

    pub fn barrier_pos_x(&self) -> f32 {
        self.barrier_pos_x
    }

    pub fn barrier_width(&self) -> f32 {
        self.barrier_width
    }

    pub fn hole_pos_y(&self) -> f32 {
        self.hole_pos_y
    }

    pub fn hole_height(&self) -> f32 {
        self.hole_height
    }

    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Duration in minutes.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    // ============ Derived geometry ============

    /// Left face of the barrier band.
    pub fn barrier_left(&self) -> f64 {
        f64::from(self.barrier_pos_x) - f64::from(self.barrier_width) / 2.0
    }

    /// Right face of the barrier band.
    pub fn barrier_right(&self) -> f64 {
        f64::from(self.barrier_pos_x) + f64::from(self.barrier_width) / 2.0
    }

    /// Lower edge of the hole.
    pub fn hole_bottom(&self) -> f64 {
        f64::from(self.hole_pos_y) - f64::from(self.hole_height) / 2.0
    }

    /// Upper edge of the hole.
    pub fn hole_top(&self) -> f64 {
        f64::from(self.hole_pos_y) + f64::from(self.hole_height) / 2.0
    }

    // ============ Derived timing ============

    /// Length of one sampling interval, `1_000_000 / fps` microseconds (floored).
    pub fn frame_interval_us(&self) -> u64 {
        MICROS_PER_SECOND / u64::from(self.fps.max(1))
    }

    /// Simulation instant at which frame `index` is due: `floor(index * 1e6 / fps)`.
    ///
    /// Computed from the index rather than as `index * frame_interval_us()` so that the
    /// rounding error of the interval never accumulates into an extra frame.
    pub fn frame_time_us(&self, index: u64) -> u64 {
        index.saturating_mul(MICROS_PER_SECOND) / u64::from(self.fps.max(1))
    }

    /// Total simulated time in microseconds.
    pub fn duration_us(&self) -> u64 {
        u64::from(self.duration) * 60 * MICROS_PER_SECOND
    }

    /// Number of frames a complete run persists: `duration * 60 * fps`.
    pub fn expected_frame_count(&self) -> u64 {
        u64::from(self.duration) * 60 * u64::from(self.fps)
    }

    /// Check the preconditions the simulator relies on.
    ///
    /// Errors:
    /// - `Error::InvalidParam` naming the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let reals = [
            ("initial_speed", self.initial_speed),
            ("speed_loss", self.speed_loss),
            ("speed_delta_top", self.speed_delta_top),
            ("speed_delta_sides", self.speed_delta_sides),
            ("speed_delta_bottom", self.speed_delta_bottom),
            ("g", self.g),
            ("box_width", self.box_width),
            ("box_height", self.box_height),
            ("barrier_pos_x", self.barrier_pos_x),
            ("barrier_width", self.barrier_width),
            ("hole_pos_y", self.hole_pos_y),
            ("hole_height", self.hole_height),
            ("particle_radius", self.particle_radius),
        ];
        if let Some((name, _)) = reals.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite")));
        }
        for (name, v) in [
            ("initial_speed", self.initial_speed),
            ("speed_delta_top", self.speed_delta_top),
            ("speed_delta_sides", self.speed_delta_sides),
            ("speed_delta_bottom", self.speed_delta_bottom),
            ("barrier_width", self.barrier_width),
            ("hole_height", self.hole_height),
        ] {
            if v < 0.0 {
                return Err(invalid(format!("{name} must be >= 0")));
            }
        }
        if self.particle_radius <= 0.0 {
            return Err(invalid("particle_radius must be > 0"));
        }
        if !(0.0..1.0).contains(&self.speed_loss) {
            return Err(invalid("speed_loss must lie in [0, 1)"));
        }
        if self.box_width <= 0.0 || self.box_height <= 0.0 {
            return Err(invalid("box_width and box_height must be > 0"));
        }
        if self.barrier_pos_x <= 0.0 || self.barrier_pos_x >= self.box_width {
            return Err(invalid("barrier_pos_x must lie strictly inside the box"));
        }
        if self.hole_bottom() < 0.0 || self.hole_top() > f64::from(self.box_height) {
            return Err(invalid("hole must lie fully inside the box height"));
        }
        if self.fps == 0 || u64::from(self.fps) > MICROS_PER_SECOND {
            return Err(invalid("fps must lie in [1, 1000000]"));
        }
        if self.duration == 0 {
            return Err(invalid("duration must be > 0"));
        }
        if i32::try_from(self.particle_count_left).is_err()
            || i32::try_from(self.particle_count_right).is_err()
        {
            return Err(invalid("particle counts must fit in a 32-bit signed integer"));
        }

        let diameter = 2.0 * f64::from(self.particle_radius);
        if f64::from(self.box_height) < diameter {
            return Err(invalid("box_height must fit a particle"));
        }
        if self.hole_height > 0.0 && f64::from(self.hole_height) < diameter {
            return Err(invalid(
                "hole_height must be 0 (closed barrier) or at least a particle diameter",
            ));
        }
        if self.particle_count_left > 0 && self.barrier_left() < diameter {
            return Err(invalid("left of the barrier is narrower than a particle"));
        }
        if self.particle_count_right > 0
            && f64::from(self.box_width) - self.barrier_right() < diameter
        {
            return Err(invalid("right of the barrier is narrower than a particle"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidParam(msg.into())
}

/// Builder for [`ExperimentSettings`]. Unset fields keep the reference-experiment defaults.
#[derive(Debug, Clone)]
pub struct ExperimentSettingsBuilder {
    inner: ExperimentSettings,
}

impl ExperimentSettingsBuilder {
    pub fn particle_count(mut self, left: u32, right: u32) -> Self {
        self.inner.particle_count_left = left;
        self.inner.particle_count_right = right;
        self
    }

    pub fn initial_speed(mut self, speed: f32) -> Self {
        self.inner.initial_speed = speed;
        self
    }

    pub fn speed_loss(mut self, loss: f32) -> Self {
        self.inner.speed_loss = loss;
        self
    }

    /// Energy injected on reflection from the top wall, the side walls and the bottom wall.
    pub fn speed_delta(mut self, top: f32, sides: f32, bottom: f32) -> Self {
        self.inner.speed_delta_top = top;
        self.inner.speed_delta_sides = sides;
        self.inner.speed_delta_bottom = bottom;
        self
    }

    pub fn g(mut self, g: f32) -> Self {
        self.inner.g = g;
        self
    }

    pub fn box_size(mut self, width: f32, height: f32) -> Self {
        self.inner.box_width = width;
        self.inner.box_height = height;
        self
    }

    pub fn barrier(mut self, pos_x: f32, width: f32) -> Self {
        self.inner.barrier_pos_x = pos_x;
        self.inner.barrier_width = width;
        self
    }

    pub fn hole(mut self, pos_y: f32, height: f32) -> Self {
        self.inner.hole_pos_y = pos_y;
        self.inner.hole_height = height;
        self
    }

    pub fn particle_radius(mut self, radius: f32) -> Self {
        self.inner.particle_radius = radius;
        self
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.inner.fps = fps;
        self
    }

    /// Duration in minutes.
    pub fn duration(mut self, minutes: u32) -> Self {
        self.inner.duration = minutes;
        self
    }

    pub fn seed(mut self, seed: i32) -> Self {
        self.inner.seed = seed;
        self
    }

    pub fn build(self) -> ExperimentSettings {
        self.inner
    }
}
