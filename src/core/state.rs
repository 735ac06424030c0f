use std::sync::Arc;

use crate::core::particle::Particle;
use crate::core::settings::{ExperimentSettings, MICROS_PER_SECOND};

/// Immutable snapshot of an experiment at one instant.
///
/// States are never edited in place: the simulator builds a fresh state for every step,
/// and the settings are shared between all states of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentState {
    time: u64,
    particles: Vec<Particle>,
    settings: Arc<ExperimentSettings>,
}

impl ExperimentState {
    /// Assemble a state. `particles.len()` must equal `settings.particle_count()`.
    pub fn new(time: u64, particles: Vec<Particle>, settings: Arc<ExperimentSettings>) -> Self {
        assert_eq!(
            particles.len(),
            settings.particle_count(),
            "particle count must match the experiment settings"
        );
        Self {
            time,
            particles,
            settings,
        }
    }

    /// Microseconds since t = 0.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Seconds since t = 0.
    pub fn time_seconds(&self) -> f64 {
        self.time as f64 / MICROS_PER_SECOND as f64
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    /// Total kinetic energy (unit mass).
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(Particle::kinetic_energy).sum()
    }

    /// Largest particle speed, 0 for an empty or resting ensemble.
    pub fn max_speed(&self) -> f64 {
        self.particles
            .iter()
            .map(Particle::speed)
            .fold(0.0_f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let settings = Arc::new(ExperimentSettings::builder().particle_count(1, 1).build());
        let particles = vec![
            Particle::new(0, [1.0, 1.0], [3.0, 4.0]),
            Particle::new(1, [60.0, 1.0], [0.0, 1.0]),
        ];
        let s = ExperimentState::new(2_500_000, particles, settings);
        assert_eq!(s.time(), 2_500_000);
        assert!((s.time_seconds() - 2.5).abs() < 1e-12);
        assert!((s.max_speed() - 5.0).abs() < 1e-12);
        assert!((s.kinetic_energy() - 13.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "particle count")]
    fn count_mismatch_is_fatal() {
        let settings = Arc::new(ExperimentSettings::builder().particle_count(2, 0).build());
        let _ = ExperimentState::new(0, vec![], settings);
    }
}
