use crate::core::particle::{Particle, Side, DIM};
use crate::core::settings::{ExperimentSettings, MICROS_PER_SECOND};
use crate::core::state::ExperimentState;
use crate::error::{Error, Result};
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Arc;

/// Default cap on placement attempts per side of the box.
pub const DEFAULT_PACKING_ATTEMPTS: u64 = 10_000_000;

/// Fraction of the particle radius a particle may travel in one step.
const MAX_DISPLACEMENT_FRACTION: f64 = 1.0 / 8.0;

/// Time-stepped engine for the barrier box.
///
/// The simulator holds no mutable state: [`Simulator::next_time_step`] maps a state to a
/// brand new successor, so any run is reproducible from the settings and the RNG seed.
#[derive(Debug, Clone)]
pub struct Simulator {
    settings: Arc<ExperimentSettings>,
    packing_attempts: u64,
}

impl Simulator {
    /// Create a simulator for `settings`. The settings are a precondition, not validated here.
    pub fn new(settings: impl Into<Arc<ExperimentSettings>>) -> Self {
        Self {
            settings: settings.into(),
            packing_attempts: DEFAULT_PACKING_ATTEMPTS,
        }
    }

    /// Override the per-side attempt budget used by [`Simulator::initial_distribution`].
    #[must_use]
    pub fn with_packing_attempts(mut self, attempts: u64) -> Self {
        self.packing_attempts = attempts;
        self
    }

    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    /// RNG seeded from the experiment seed.
    pub fn seeded_rng(&self) -> StdRng {
        // Reinterpret the signed header seed so negative seeds stay distinct.
        StdRng::seed_from_u64(u64::from(self.settings.seed() as u32))
    }

    /// Initial distribution driven by the experiment's own seed.
    pub fn initial_distribution_seeded(&self) -> Result<ExperimentState> {
        let mut rng = self.seeded_rng();
        self.initial_distribution(&mut rng)
    }

    /// Pack both halves of the box at t = 0.
    ///
    /// Left-origin particles are rejection sampled in
    /// `[r, barrier_left - r] x [r, H - r]`, right-origin ones in
    /// `[barrier_right + r, W - r] x [r, H - r]`. Every particle starts at `initial_speed`
    /// in a uniformly random direction. Ids are `2*i` (left) and `2*i + 1` (right).
    ///
    /// Errors:
    /// - `Error::PackingFailure` if a side exhausts its attempt budget.
    pub fn initial_distribution<R: Rng>(&self, rng: &mut R) -> Result<ExperimentState> {
        let s = &*self.settings;
        let radius = f64::from(s.particle_radius());
        let y_range = (radius, f64::from(s.box_height()) - radius);

        let mut particles = Vec::with_capacity(s.particle_count());
        let left = self.pack_side(
            rng,
            Side::Left,
            s.particle_count_left() as usize,
            (radius, s.barrier_left() - radius),
            y_range,
        )?;
        particles.extend(left);
        let right = self.pack_side(
            rng,
            Side::Right,
            s.particle_count_right() as usize,
            (s.barrier_right() + radius, f64::from(s.box_width()) - radius),
            y_range,
        )?;
        particles.extend(right);

        Ok(ExperimentState::new(0, particles, Arc::clone(&self.settings)))
    }

    fn pack_side<R: Rng>(
        &self,
        rng: &mut R,
        side: Side,
        count: usize,
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> Result<Vec<Particle>> {
        let mut placed: Vec<Particle> = Vec::with_capacity(count);
        if count == 0 {
            return Ok(placed);
        }
        let failure = |placed: usize, attempts: u64| Error::PackingFailure {
            side,
            placed,
            requested: count,
            attempts,
        };
        if x_range.0 > x_range.1 || y_range.0 > y_range.1 {
            return Err(failure(0, 0));
        }

        let radius = f64::from(self.settings.particle_radius());
        let speed = f64::from(self.settings.initial_speed());
        let mut grid = PackingGrid::new(2.0 * radius);
        let mut attempts = 0u64;

        for index in 0..count {
            let r = loop {
                if attempts >= self.packing_attempts {
                    return Err(failure(placed.len(), attempts));
                }
                attempts += 1;
                let r = [
                    rng.random_range(x_range.0..=x_range.1),
                    rng.random_range(y_range.0..=y_range.1),
                ];
                if !grid.overlaps(&placed, &r, radius) {
                    break r;
                }
            };

            let angle = rng.random_range(0.0..TAU);
            let v = [speed * angle.cos(), speed * angle.sin()];
            grid.insert(placed.len(), &r);
            placed.push(Particle::new(side.particle_id(index), r, v));
        }

        tracing::debug!(%side, count, attempts, "packed side");
        Ok(placed)
    }

    /// Adaptive step in microseconds, bounding per-step travel to `radius / 8`.
    ///
    /// Uses the fastest particle of `state`; when everything is at rest the initial speed
    /// stands in, and if that is zero too the sampling interval is returned. Never 0.
    pub fn time_step(&self, state: &ExperimentState) -> u64 {
        let s = &*self.settings;
        let max_displacement = f64::from(s.particle_radius()) * MAX_DISPLACEMENT_FRACTION;
        let mut speed = state.max_speed();
        if speed <= 0.0 {
            speed = f64::from(s.initial_speed());
            tracing::debug!(time = state.time(), "ensemble at rest; stepping with initial speed");
        }
        if speed <= 0.0 || !speed.is_finite() {
            return s.frame_interval_us().max(1);
        }
        let micros = (max_displacement / speed * MICROS_PER_SECOND as f64).ceil();
        // Saturating float-to-int cast; a huge step is clamped by the caller's horizon.
        (micros as u64).max(1)
    }

    /// Advance `state` by `dt` microseconds.
    ///
    /// Phases, in order:
    /// 1. free flight under gravity (exact for constant acceleration);
    /// 2. pairwise collisions, searched along a y-sorted sweep line;
    /// 3. box walls, barrier faces and the hole channel.
    pub fn next_time_step(&self, state: &ExperimentState, dt: u64) -> ExperimentState {
        let dt_s = dt as f64 / MICROS_PER_SECOND as f64;
        let g = f64::from(self.settings.g());

        let mut particles: Vec<Particle> = state
            .particles()
            .iter()
            .map(|p| free_flight(p, dt_s, g))
            .collect();

        self.resolve_collisions(&mut particles);

        for p in &mut particles {
            *p = self.resolve_geometry(p);
        }

        debug_assert!(
            particles
                .iter()
                .zip(state.particles())
                .all(|(a, b)| a.id == b.id),
            "particle ids must survive a step"
        );
        ExperimentState::new(state.time() + dt, particles, Arc::clone(&self.settings))
    }

    /// Advance by the adaptive step, never beyond `horizon` (absolute time in microseconds).
    pub fn step_until(&self, state: &ExperimentState, horizon: u64) -> ExperimentState {
        let dt = self.time_step(state);
        let dt = dt.min(horizon.saturating_sub(state.time())).max(1);
        self.next_time_step(state, dt)
    }

    // ============ Internal helpers ============

    fn resolve_collisions(&self, particles: &mut [Particle]) {
        let radius = f64::from(self.settings.particle_radius());
        let diameter = 2.0 * radius;
        let factor = (1.0 - f64::from(self.settings.speed_loss())).sqrt();

        let mut order: Vec<usize> = (0..particles.len()).collect();
        order.sort_by_key(|&k| OrderedFloat(particles[k].r[1]));

        for a in 0..order.len() {
            for b in (a + 1)..order.len() {
                let (i, j) = (order[a], order[b]);
                // Sorted by y: nothing further up can reach particle i.
                if particles[j].r[1] - particles[i].r[1] > diameter {
                    break;
                }
                if particles[i].overlaps(&particles[j], radius)
                    && particles[i].approaches(&particles[j])
                {
                    let (pi, pj) = collide(&particles[i], &particles[j], diameter, factor);
                    particles[i] = pi;
                    particles[j] = pj;
                }
            }
        }
    }

    fn resolve_geometry(&self, p: &Particle) -> Particle {
        let s = &*self.settings;
        let radius = f64::from(s.particle_radius());
        let delta_top = f64::from(s.speed_delta_top());
        let delta_bottom = f64::from(s.speed_delta_bottom());
        let delta_sides = f64::from(s.speed_delta_sides());

        let left_bound = radius;
        let right_bound = f64::from(s.box_width()) - radius;
        let bottom_bound = radius;
        let top_bound = f64::from(s.box_height()) - radius;
        let (barrier_left, barrier_right) = (s.barrier_left(), s.barrier_right());
        let (hole_bottom, hole_top) = (s.hole_bottom(), s.hole_top());

        let [mut x, mut y] = p.r;
        let [mut vx, mut vy] = p.v;

        // Box top / bottom
        if y > top_bound {
            y = top_bound;
            if vy > 0.0 {
                vy = -vy - delta_top;
            }
        } else if y < bottom_bound {
            y = bottom_bound;
            if vy < 0.0 {
                vy = -vy + delta_bottom;
            }
        }

        if x < left_bound {
            // Box left side
            x = left_bound;
            if vx < 0.0 {
                vx = -vx + delta_sides;
            }
        } else if x > right_bound {
            // Box right side
            x = right_bound;
            if vx > 0.0 {
                vx = -vx - delta_sides;
            }
        } else if x > barrier_left - radius && x < barrier_right + radius {
            let in_band = x > barrier_left && x < barrier_right;
            // A hole narrower than a particle is closed.
            let in_hole = f64::from(s.hole_height()) >= 2.0 * radius
                && y >= hole_bottom
                && y <= hole_top;
            if in_band && in_hole {
                // Inside the hole channel: its top and bottom act as walls.
                if y > hole_top - radius {
                    y = hole_top - radius;
                    if vy > 0.0 {
                        vy = -vy - delta_top;
                    }
                } else if y < hole_bottom + radius {
                    y = hole_bottom + radius;
                    if vy < 0.0 {
                        vy = -vy + delta_bottom;
                    }
                }
            } else if !in_hole {
                // Touching (or buried in) a barrier face away from the hole. Inside the band
                // the face is picked by the direction of travel.
                let from_left = if x <= barrier_left {
                    true
                } else if x >= barrier_right {
                    false
                } else if vx != 0.0 {
                    vx > 0.0
                } else {
                    x < f64::from(s.barrier_pos_x())
                };
                if from_left {
                    x = barrier_left - radius;
                    if vx > 0.0 {
                        vx = -vx - delta_sides;
                    }
                } else {
                    x = barrier_right + radius;
                    if vx < 0.0 {
                        vx = -vx + delta_sides;
                    }
                }
            }
        }

        p.with_position([x, y]).with_velocity([vx, vy])
    }
}

// ============ Utility helpers ============

#[inline]
fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Ballistic update over `dt` seconds with vertical acceleration `g`.
#[inline]
fn free_flight(p: &Particle, dt: f64, g: f64) -> Particle {
    let r = [
        p.r[0] + p.v[0] * dt,
        p.r[1] + p.v[1] * dt + 0.5 * g * dt * dt,
    ];
    let v = [p.v[0], p.v[1] + g * dt];
    Particle::new(p.id, r, v)
}

/// Equal-mass collision of an overlapping, approaching pair.
///
/// Normal velocity components are exchanged, then the relative velocity is scaled by
/// `factor` around the pair's center-of-mass velocity. The pair is separated by the
/// penetration depth, moving whichever particle sits higher.
fn collide(pi: &Particle, pj: &Particle, diameter: f64, factor: f64) -> (Particle, Particle) {
    let mut n = [0.0_f64; DIM];
    for ((nk, &rik), &rjk) in n.iter_mut().zip(pi.r.iter()).zip(pj.r.iter()) {
        *nk = rik - rjk;
    }
    let dist = dot(&n, &n).sqrt();
    if dist <= f64::EPSILON {
        // Coincident centers have no collision normal.
        return (*pi, *pj);
    }
    for nk in &mut n {
        *nk /= dist;
    }

    let mut dv = [0.0_f64; DIM];
    for ((dk, &vi), &vj) in dv.iter_mut().zip(pi.v.iter()).zip(pj.v.iter()) {
        *dk = vi - vj;
    }
    let dv_n = dot(&dv, &n);

    let mut vi = [0.0_f64; DIM];
    let mut vj = [0.0_f64; DIM];
    for k in 0..DIM {
        let center = 0.5 * (pi.v[k] + pj.v[k]);
        let ei = pi.v[k] - dv_n * n[k];
        let ej = pj.v[k] + dv_n * n[k];
        vi[k] = center + factor * (ei - center);
        vj[k] = center + factor * (ej - center);
    }

    let mut ri = pi.r;
    let mut rj = pj.r;
    let depth = diameter - dist;
    if depth > 0.0 {
        if pi.r[1] - pj.r[1] > 0.0 {
            for k in 0..DIM {
                ri[k] += depth * n[k];
            }
        } else {
            for k in 0..DIM {
                rj[k] -= depth * n[k];
            }
        }
    }

    (
        pi.with_position(ri).with_velocity(vi),
        pj.with_position(rj).with_velocity(vj),
    )
}

/// Uniform hash grid over placed centers; cells are one diameter wide, so any overlapping
/// neighbour sits in the 3x3 block around a candidate's cell.
struct PackingGrid {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl PackingGrid {
    fn new(cell: f64) -> Self {
        Self {
            cell,
            cells: HashMap::new(),
        }
    }

    fn key(&self, r: &[f64; DIM]) -> (i64, i64) {
        (
            (r[0] / self.cell).floor() as i64,
            (r[1] / self.cell).floor() as i64,
        )
    }

    fn insert(&mut self, index: usize, r: &[f64; DIM]) {
        let key = self.key(r);
        self.cells.entry(key).or_default().push(index);
    }

    fn overlaps(&self, placed: &[Particle], r: &[f64; DIM], radius: f64) -> bool {
        let (cx, cy) = self.key(r);
        let candidate = Particle::new(0, *r, [0.0; DIM]);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    if bucket
                        .iter()
                        .any(|&k| placed[k].overlaps(&candidate, radius))
                    {
                        return true;
                    }
                }
            }
        }
        false
    }
}
