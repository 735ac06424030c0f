use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::core::{ExperimentSettings, Simulator};
use crate::error::Result;
use crate::io::format;

/// Point-in-time view of a running [`TrajectoryWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Simulated time reached so far, in microseconds.
    pub time_us: u64,
    pub frames_written: u64,
    pub total_frames: u64,
    pub finished: bool,
}

impl Progress {
    /// Completed share of the run in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 1.0;
        }
        (self.frames_written as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Default)]
struct ProgressCells {
    time_us: AtomicU64,
    frames_written: AtomicU64,
    finished: AtomicBool,
}

/// Shareable, lock-free progress handle. The writer thread stores into it and any number of
/// observers may poll [`ProgressHandle::snapshot`] from other threads.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    cells: Arc<ProgressCells>,
    total_frames: u64,
}

impl ProgressHandle {
    fn new(total_frames: u64) -> Self {
        Self {
            cells: Arc::new(ProgressCells::default()),
            total_frames,
        }
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            time_us: self.cells.time_us.load(Ordering::Acquire),
            frames_written: self.cells.frames_written.load(Ordering::Acquire),
            total_frames: self.total_frames,
            finished: self.cells.finished.load(Ordering::Acquire),
        }
    }

    pub fn fraction(&self) -> f64 {
        self.snapshot().fraction()
    }

    pub fn is_finished(&self) -> bool {
        self.cells.finished.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.cells.time_us.store(0, Ordering::Release);
        self.cells.frames_written.store(0, Ordering::Release);
        self.cells.finished.store(false, Ordering::Release);
    }

    fn record_time(&self, time_us: u64) {
        self.cells.time_us.store(time_us, Ordering::Release);
    }

    fn record_frame(&self) {
        self.cells.frames_written.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        self.cells.finished.store(true, Ordering::Release);
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub steps: u64,
    /// Simulated time of the last persisted frame, in microseconds.
    pub last_frame_time_us: u64,
}

/// Runs a simulation from its initial distribution and persists sampled frames.
///
/// Frame `k` is the state at `floor(k * 1e6 / fps)` microseconds. The adaptive step is
/// clamped so the run lands exactly on each of these instants, so no frame is skipped and
/// none is written twice; a run holds `duration * 60 * fps` frames.
#[derive(Debug)]
pub struct TrajectoryWriter {
    simulator: Simulator,
    progress: ProgressHandle,
}

impl TrajectoryWriter {
    pub fn new(settings: impl Into<Arc<ExperimentSettings>>) -> Self {
        Self::from_simulator(Simulator::new(settings))
    }

    pub fn from_simulator(simulator: Simulator) -> Self {
        let total = simulator.settings().expected_frame_count();
        Self {
            simulator,
            progress: ProgressHandle::new(total),
        }
    }

    pub fn settings(&self) -> &ExperimentSettings {
        self.simulator.settings()
    }

    /// Handle for polling progress from another thread.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Create (or truncate) `path` and write the whole run into it.
    ///
    /// On error the partially written file is left in place.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<RunSummary> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))
    }

    /// Write header and every sampled frame to `out`.
    ///
    /// Errors:
    /// - `Error::PackingFailure` if the initial distribution cannot be built.
    /// - `Error::Io` on any write failure; the run stops at the first one.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<RunSummary> {
        let settings = self.simulator.settings();
        let total = settings.expected_frame_count();
        let started = Instant::now();
        self.progress.reset();

        tracing::info!(
            particles = settings.particle_count(),
            duration_us = settings.duration_us(),
            frames = total,
            "starting simulation run"
        );

        let mut state = self.simulator.initial_distribution_seeded()?;
        format::write_header(&mut out, settings)?;

        let mut steps = 0u64;
        let mut last_frame_time_us = 0u64;
        for index in 0..total {
            let due = settings.frame_time_us(index);
            while state.time() < due {
                let next = self.simulator.step_until(&state, due);
                assert!(next.time() > state.time(), "simulation time must advance");
                state = next;
                steps += 1;
                self.progress.record_time(state.time());
            }
            debug_assert_eq!(state.time(), due);

            format::write_frame(&mut out, &state)?;
            last_frame_time_us = state.time();
            self.progress.record_frame();
            tracing::trace!(index, time_us = state.time(), "frame written");
        }
        out.flush()?;
        self.progress.finish();

        tracing::info!(
            frames = total,
            steps,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "simulation run finished"
        );
        Ok(RunSummary {
            frames: total,
            steps,
            last_frame_time_us,
        })
    }
}

/// Run `settings` to completion, writing the trajectory to `path`.
pub fn run_simulation(
    settings: impl Into<Arc<ExperimentSettings>>,
    path: impl AsRef<Path>,
) -> Result<RunSummary> {
    TrajectoryWriter::new(settings).write_to_path(path)
}
