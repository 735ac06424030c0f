use thiserror::Error;

use crate::core::Side;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core and the trajectory codec.
///
/// Internal invariants (particle count, id set, monotonic time) are asserted instead of
/// being reported here; every variant below is something a caller can act on.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid experiment parameter (reported by `ExperimentSettings::validate`).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The initial distribution could not place every particle without overlap.
    #[error(
        "packing failure on the {side} side: placed {placed} of {requested} particles \
         before exhausting {attempts} attempts; lower the density or enlarge the box"
    )]
    PackingFailure {
        side: Side,
        placed: usize,
        requested: usize,
        attempts: u64,
    },

    /// Frame index outside `[0, frame_count)`.
    #[error("frame index {index} out of range (frame count {frame_count})")]
    FrameIndex { index: u64, frame_count: u64 },

    /// Trajectory file is structurally unusable (truncated header, negative counts, ...).
    #[error("malformed trajectory file: {0}")]
    Format(String),

    /// Experiment configuration file could not be parsed or serialized.
    #[error("configuration error: {0}")]
    Config(String),

    /// Propagated I/O errors from file open/read/write.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
