//! Binary trajectory files: a fixed header followed by fixed-size frames, so any frame
//! can be decoded with one seek.

pub mod format;
pub mod reader;
pub mod writer;

pub use reader::{open_trajectory, Frames, TrajectoryReader};
pub use writer::{run_simulation, Progress, ProgressHandle, RunSummary, TrajectoryWriter};
