#![allow(missing_docs)] // Doc comments live on the public items in the submodules

//! Core simulation types for the barrier box.
//!
//! Settings are immutable, states are snapshots, and the simulator maps one state to the
//! next without touching its input.

pub mod particle;
pub mod settings;
pub mod sim;
pub mod state;

pub use particle::{Particle, Side, DIM};
pub use settings::{ExperimentSettings, ExperimentSettingsBuilder, MICROS_PER_SECOND};
pub use sim::{Simulator, DEFAULT_PACKING_ATTEMPTS};
pub use state::ExperimentState;
