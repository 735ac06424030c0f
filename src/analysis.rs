//! Statistics over experiment states, the numbers behind the demonstration charts.

use std::io::{Read, Seek};

use crate::core::{ExperimentState, Side};
use crate::error::{Error, Result};
use crate::io::TrajectoryReader;

/// Particle populations on each side of the barrier, split by origin side.
///
/// Particles whose centers sit inside the barrier band (that is, in the hole channel) are
/// not counted on either side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionCounts {
    pub left_origin_left: usize,
    pub right_origin_left: usize,
    pub left_origin_right: usize,
    pub right_origin_right: usize,
}

impl PartitionCounts {
    /// Particles currently left of the barrier.
    pub fn left(&self) -> usize {
        self.left_origin_left + self.right_origin_left
    }

    /// Particles currently right of the barrier.
    pub fn right(&self) -> usize {
        self.left_origin_right + self.right_origin_right
    }
}

pub fn partition_counts(state: &ExperimentState) -> PartitionCounts {
    let s = state.settings();
    let (left_bound, right_bound) = (s.barrier_left(), s.barrier_right());
    let mut out = PartitionCounts::default();
    for p in state.particles() {
        let x = p.r[0];
        match (x < left_bound, x > right_bound, p.origin()) {
            (true, _, Side::Left) => out.left_origin_left += 1,
            (true, _, Side::Right) => out.right_origin_left += 1,
            (_, true, Side::Left) => out.left_origin_right += 1,
            (_, true, Side::Right) => out.right_origin_right += 1,
            _ => {}
        }
    }
    out
}

/// One point of a population time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationSample {
    /// Seconds since t = 0.
    pub time: f64,
    pub counts: PartitionCounts,
}

/// Partition counts at about `samples` evenly spaced frames of a trajectory.
///
/// Errors:
/// - `Error::InvalidParam` if `samples == 0`.
/// - any error of [`TrajectoryReader::frame`].
pub fn population_series<R: Read + Seek>(
    reader: &mut TrajectoryReader<R>,
    samples: u64,
) -> Result<Vec<PopulationSample>> {
    if samples == 0 {
        return Err(Error::InvalidParam("samples must be > 0".into()));
    }
    let stride = (reader.frame_count() / samples).max(1);
    reader
        .frames(0, stride)
        .map(|frame| {
            let state = frame?;
            Ok(PopulationSample {
                time: state.time_seconds(),
                counts: partition_counts(&state),
            })
        })
        .collect()
}

/// Normalized speed distribution of one state with a fitted 2-D Maxwell curve.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedHistogram {
    /// Bin edges, `bins + 1` values starting at 0.
    pub edges: Vec<f64>,
    /// Probability density per bin (integrates to 1 over the edges).
    pub density: Vec<f64>,
    /// Maxwell density `v / vp^2 * exp(-v^2 / (2 vp^2))` at the bin centers.
    pub theoretical: Vec<f64>,
    /// Center of the fullest bin, used as the fit's most probable speed `vp`.
    pub most_probable: f64,
}

/// Errors:
/// - `Error::InvalidParam` if `bins == 0`.
pub fn speed_histogram(state: &ExperimentState, bins: usize) -> Result<SpeedHistogram> {
    if bins == 0 {
        return Err(Error::InvalidParam("bins must be > 0".into()));
    }
    let n = state.particles().len();
    let max_speed = state.max_speed();
    let width = if max_speed > 0.0 {
        max_speed / bins as f64
    } else {
        1.0 / bins as f64
    };

    let edges: Vec<f64> = (0..=bins).map(|k| k as f64 * width).collect();
    let mut counts = vec![0u64; bins];
    for p in state.particles() {
        let k = ((p.speed() / width).floor() as usize).min(bins - 1);
        counts[k] += 1;
    }

    let norm = if n > 0 { n as f64 * width } else { 1.0 };
    let density: Vec<f64> = counts.iter().map(|&c| c as f64 / norm).collect();

    let fullest = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, c)| *c)
        .map(|(k, _)| k)
        .unwrap_or(0);
    let most_probable = if n > 0 { (fullest as f64 + 0.5) * width } else { 0.0 };

    let theoretical = (0..bins)
        .map(|k| {
            let v = (k as f64 + 0.5) * width;
            if most_probable > 0.0 {
                let vp2 = most_probable * most_probable;
                v / vp2 * (-v * v / (2.0 * vp2)).exp()
            } else {
                0.0
            }
        })
        .collect();

    Ok(SpeedHistogram {
        edges,
        density,
        theoretical,
        most_probable,
    })
}

/// Particle counts in `bins` horizontal slabs of equal height, bottom first.
///
/// Errors:
/// - `Error::InvalidParam` if `bins == 0`.
pub fn height_histogram(state: &ExperimentState, bins: usize) -> Result<Vec<u64>> {
    if bins == 0 {
        return Err(Error::InvalidParam("bins must be > 0".into()));
    }
    let slab = f64::from(state.settings().box_height()) / bins as f64;
    let mut counts = vec![0u64; bins];
    for p in state.particles() {
        let k = (p.r[1] / slab).floor().max(0.0) as usize;
        counts[k.min(bins - 1)] += 1;
    }
    Ok(counts)
}
