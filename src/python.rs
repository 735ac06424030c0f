use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::{PyIndexError, PyOSError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config;
use crate::core::{ExperimentSettings, DIM};
use crate::error::Error;
use crate::io::{TrajectoryReader, TrajectoryWriter};

fn py_err(e: Error) -> PyErr {
    match e {
        Error::FrameIndex { .. } => PyIndexError::new_err(e.to_string()),
        Error::Io(_) => PyOSError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn settings_from_kwargs(kwargs: Option<&Bound<'_, PyDict>>) -> PyResult<ExperimentSettings> {
    let base = ExperimentSettings::default();
    let Some(kwargs) = kwargs else {
        return Ok(base);
    };
    let mut overrides = Vec::with_capacity(kwargs.len());
    for (key, value) in kwargs.iter() {
        let key: String = key.extract()?;
        let value = if let Ok(i) = value.extract::<i64>() {
            toml::Value::Integer(i)
        } else {
            toml::Value::Float(value.extract::<f64>().map_err(|_| {
                PyValueError::new_err(format!("setting {key} must be a number"))
            })?)
        };
        overrides.push((key, value));
    }
    config::apply_overrides(&base, overrides).map_err(py_err)
}

/// Run an experiment and write its trajectory to `path`.
///
/// Keyword arguments override the reference experiment by field name, e.g.
/// `run_simulation("out.bin", particle_count_left=200, g=-9.8)`. The GIL is released
/// while the simulation runs. Returns the number of frames written.
///
/// Errors: ValueError on invalid settings or a packing failure, OSError on I/O failures.
#[pyfunction]
#[pyo3(signature = (path, **kwargs))]
fn run_simulation(
    py: Python<'_>,
    path: String,
    kwargs: Option<&Bound<'_, PyDict>>,
) -> PyResult<u64> {
    let settings = settings_from_kwargs(kwargs)?;
    settings.validate().map_err(py_err)?;
    let writer = TrajectoryWriter::new(settings);
    let summary = py.detach(|| writer.write_to_path(&path)).map_err(py_err)?;
    Ok(summary.frames)
}

/// Random-access view of a trajectory file.
///
/// - Trajectory(path)
/// - frame_count() -> int
/// - settings() -> dict
/// - get_frame(index) -> (time_us, ids, positions (N, 2), velocities (N, 2))
#[pyclass]
pub struct Trajectory {
    reader: TrajectoryReader,
}

#[pymethods]
impl Trajectory {
    /// Open a trajectory file. Raises OSError if it cannot be read and ValueError if its
    /// header is malformed.
    #[new]
    fn new(path: String) -> PyResult<Self> {
        let reader = TrajectoryReader::open(&path).map_err(py_err)?;
        Ok(Self { reader })
    }

    fn frame_count(&self) -> u64 {
        self.reader.frame_count()
    }

    /// Experiment settings stored in the header, keyed by field name.
    fn settings<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let table = config::to_table(self.reader.settings()).map_err(py_err)?;
        let out = PyDict::new(py);
        for (key, value) in table {
            match value {
                toml::Value::Integer(i) => out.set_item(key, i)?,
                toml::Value::Float(f) => out.set_item(key, f)?,
                other => out.set_item(key, other.to_string())?,
            }
        }
        Ok(out)
    }

    /// Decode one frame. Raises IndexError unless `0 <= index < frame_count()`.
    #[allow(clippy::type_complexity)]
    fn get_frame<'py>(
        &mut self,
        py: Python<'py>,
        index: u64,
    ) -> PyResult<(
        u64,
        Bound<'py, PyArray1<i32>>,
        Bound<'py, PyArray2<f64>>,
        Bound<'py, PyArray2<f64>>,
    )> {
        let state = self.reader.frame(index).map_err(py_err)?;
        let n = state.particles().len();
        let mut ids = Vec::with_capacity(n);
        let mut positions = Array2::<f64>::zeros((n, DIM));
        let mut velocities = Array2::<f64>::zeros((n, DIM));
        for (i, p) in state.particles().iter().enumerate() {
            ids.push(p.id);
            for k in 0..DIM {
                positions[[i, k]] = p.r[k];
                velocities[[i, k]] = p.v[k];
            }
        }
        Ok((
            state.time(),
            ids.into_pyarray(py),
            positions.into_pyarray(py),
            velocities.into_pyarray(py),
        ))
    }
}

/// The boxsim Python module entry point.
#[pymodule]
fn boxsim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(run_simulation, m)?)?;
    m.add_class::<Trajectory>()?;
    Ok(())
}
