//! Particles bouncing in a 2-D box split by a barrier with a hole.
//!
//! - [`core`]: settings, particles, states and the time-stepped [`Simulator`].
//! - [`io`]: the binary trajectory format, a [`TrajectoryWriter`] that runs an experiment
//!   into a file, and a random-access [`TrajectoryReader`].
//! - [`analysis`]: population and velocity statistics over states.
//! - [`config`]: TOML experiment files.
//!
//! With the `python` feature the crate also builds the `boxsim` Python extension module.

pub mod analysis;
pub mod config;
pub mod core;
pub mod error;
pub mod io;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{ExperimentSettings, ExperimentState, Particle, Side, Simulator};
pub use crate::error::{Error, Result};
pub use crate::io::{open_trajectory, run_simulation, TrajectoryReader, TrajectoryWriter};
