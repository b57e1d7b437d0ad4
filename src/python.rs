//! Python bindings. The geometry and engine stay pure Rust; these wrappers
//! only convert arguments and release the GIL around the batch.

use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::{PyInterruptedError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::EngineConfig;
use crate::detector::Detector;
use crate::engine::WeightEngine;
use crate::error::WeightError;
use crate::evaluator;
use crate::rotation::Rotation;
use crate::shapes::{Axis, Shape, Source};
use crate::vec3::Vec3;

type PyRow = (u32, u32, String, f64);

fn to_py_err(err: WeightError) -> PyErr {
    match err {
        WeightError::Cancelled { .. } => PyInterruptedError::new_err(err.to_string()),
        WeightError::Batch { ref failures, .. } => {
            let listed: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
            PyRuntimeError::new_err(format!("{err}: {}", listed.join("; ")))
        }
        WeightError::Integration { .. } | WeightError::ThreadPool(_) => {
            PyRuntimeError::new_err(err.to_string())
        }
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn build_engine(worker_count: usize, config_json: Option<&str>) -> PyResult<WeightEngine> {
    let mut config = match config_json {
        Some(json) => EngineConfig::from_json_str(json).map_err(to_py_err)?,
        None => EngineConfig::default(),
    };
    config.worker_count = worker_count;
    WeightEngine::new(config).map_err(to_py_err)
}

fn unwrap_inputs(detectors: Vec<PyDetector>, sources: Vec<PySource>) -> (Vec<Detector>, Vec<Source>) {
    (
        detectors.into_iter().map(|d| d.inner).collect(),
        sources.into_iter().map(|s| s.inner).collect(),
    )
}

fn rows_to_py(rows: Vec<crate::aggregate::ResponseRow>) -> Vec<PyRow> {
    rows.into_iter()
        .map(|r| (r.det_num, r.run_num, r.source_name, r.weight))
        .collect()
}

#[pyclass(name = "Source", module = "posdecomp.weights")]
#[derive(Clone)]
pub struct PySource {
    inner: Source,
}

#[pymethods]
impl PySource {
    #[staticmethod]
    fn point(name: String, center: [f64; 3]) -> Self {
        Self {
            inner: Source::new(name, Shape::point(center.into())),
        }
    }

    #[staticmethod]
    fn line(name: String, start: [f64; 3], stop: [f64; 3]) -> Self {
        Self {
            inner: Source::new(name, Shape::line(start.into(), stop.into())),
        }
    }

    /// Rectangle from half-edge vectors; rotations in degrees, applied z, y, then x.
    #[staticmethod]
    #[pyo3(signature = (name, center, edge1, edge2, z_rot=0.0, y_rot=0.0, x_rot=0.0))]
    fn rectangle(
        name: String,
        center: [f64; 3],
        edge1: [f64; 3],
        edge2: [f64; 3],
        z_rot: f64,
        y_rot: f64,
        x_rot: f64,
    ) -> Self {
        let rot = Rotation::identity()
            .add_z_rot(z_rot)
            .add_y_rot(y_rot)
            .add_x_rot(x_rot);
        Self {
            inner: Source::new(
                name,
                Shape::rectangle(center.into(), edge1.into(), edge2.into(), &rot),
            ),
        }
    }

    /// Axis-aligned disk; `plane` is one of "xy", "xz", "yz".
    #[staticmethod]
    fn circle(name: String, center: [f64; 3], radius: f64, plane: &str) -> PyResult<Self> {
        let center: Vec3 = center.into();
        let shape = match plane {
            "xy" => Shape::circle_xy(center, radius),
            "xz" => Shape::circle_xz(center, radius),
            "yz" => Shape::circle_yz(center, radius),
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown circle plane '{other}', expected xy, xz or yz"
                )))
            }
        };
        Ok(Self {
            inner: Source::new(name, shape),
        })
    }

    /// Disk in the xy plane turned by rotations in degrees, applied z, y, then x.
    #[staticmethod]
    #[pyo3(signature = (name, center, radius, z_rot=0.0, y_rot=0.0, x_rot=0.0))]
    fn rotated_circle(
        name: String,
        center: [f64; 3],
        radius: f64,
        z_rot: f64,
        y_rot: f64,
        x_rot: f64,
    ) -> Self {
        let rot = Rotation::identity()
            .add_z_rot(z_rot)
            .add_y_rot(y_rot)
            .add_x_rot(x_rot);
        Self {
            inner: Source::new(name, Shape::circle(center.into(), radius, &rot)),
        }
    }

    /// Cylindrical shell along a coordinate axis ("x", "y" or "z").
    #[staticmethod]
    #[pyo3(signature = (name, center, radius, length, axis="z"))]
    fn cylinder(name: String, center: [f64; 3], radius: f64, length: f64, axis: &str) -> PyResult<Self> {
        let axis = match axis {
            "x" => Axis::X,
            "y" => Axis::Y,
            "z" => Axis::Z,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown cylinder axis '{other}', expected x, y or z"
                )))
            }
        };
        Ok(Self {
            inner: Source::new(name, Shape::axial_cylinder(axis, center.into(), radius, length)),
        })
    }

    #[staticmethod]
    fn rotated_cylinder(name: String, center: [f64; 3], radius: f64, length: f64, angle: f64) -> Self {
        Self {
            inner: Source::new(
                name,
                Shape::rotated_cylinder(center.into(), radius, length, angle),
            ),
        }
    }

    #[staticmethod]
    fn cuboid(name: String, center: [f64; 3], edge1: [f64; 3], edge2: [f64; 3], edge3: [f64; 3]) -> Self {
        Self {
            inner: Source::new(
                name,
                Shape::cuboid(
                    center.into(),
                    edge1.into(),
                    edge2.into(),
                    edge3.into(),
                    &Rotation::identity(),
                ),
            ),
        }
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn subdivide(&self, n: usize) -> PyResult<Vec<PySource>> {
        let pieces = self.inner.subdivide(n).map_err(to_py_err)?;
        Ok(pieces.into_iter().map(|inner| PySource { inner }).collect())
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

#[pyclass(name = "Detector", module = "posdecomp.weights")]
#[derive(Clone)]
pub struct PyDetector {
    inner: Detector,
}

#[pymethods]
impl PyDetector {
    /// Six-faced NaI block; `center` in centimetres.
    #[staticmethod]
    fn nai(det_num: u32, run_num: u32, center: [f64; 3]) -> Self {
        Self {
            inner: Detector::nai(det_num, run_num, center.into()),
        }
    }

    /// Single patch; the first two non-zero `extents` become its half-edges.
    #[staticmethod]
    fn patch(
        det_num: u32,
        run_num: u32,
        center: [f64; 3],
        normal: [f64; 3],
        extents: [f64; 3],
    ) -> PyResult<Self> {
        let inner = Detector::patch_from_extents(det_num, run_num, center.into(), normal.into(), extents)
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn det_num(&self) -> u32 {
        self.inner.det_num
    }

    #[getter]
    fn run_num(&self) -> u32 {
        self.inner.run_num
    }

    #[getter]
    fn n_surfaces(&self) -> usize {
        self.inner.surfaces().len()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

/// Compute summed weights as `(det_num, run_num, source_name, weight)` rows.
#[pyfunction]
#[pyo3(signature = (detectors, sources, worker_count=1, config_json=None))]
pub fn compute_weights(
    py: Python<'_>,
    detectors: Vec<PyDetector>,
    sources: Vec<PySource>,
    worker_count: usize,
    config_json: Option<&str>,
) -> PyResult<Vec<PyRow>> {
    let engine = build_engine(worker_count, config_json)?;
    let (detectors, sources) = unwrap_inputs(detectors, sources);
    let rows = py
        .allow_threads(|| engine.compute(&detectors, &sources))
        .map_err(to_py_err)?;
    Ok(rows_to_py(rows))
}

/// Compute the response matrix: `(source_names, positions, weights[source, position])`.
#[pyfunction]
#[pyo3(signature = (detectors, sources, worker_count=1, config_json=None))]
pub fn response_matrix(
    py: Python<'_>,
    detectors: Vec<PyDetector>,
    sources: Vec<PySource>,
    worker_count: usize,
    config_json: Option<&str>,
) -> PyResult<(Vec<String>, Vec<(u32, u32)>, Py<PyArray2<f64>>)> {
    let engine = build_engine(worker_count, config_json)?;
    let (detectors, sources) = unwrap_inputs(detectors, sources);
    let matrix = py
        .allow_threads(|| engine.response_matrix(&detectors, &sources))
        .map_err(to_py_err)?;
    Ok((
        matrix.sources,
        matrix.positions,
        matrix.weights.into_pyarray(py).unbind(),
    ))
}

/// Runner with pollable progress() and cancel().
///
/// Usage from Python:
///   runner = WeightRunner()
///   # launch runner.compute(...) in a thread
///   # poll runner.progress() for the number of finished work items
///   # call runner.cancel() to stop early
#[pyclass(name = "WeightRunner", module = "posdecomp.weights")]
pub struct PyWeightRunner {
    inner: evaluator::WeightRunner,
}

impl Default for PyWeightRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[pymethods]
impl PyWeightRunner {
    #[new]
    pub fn new() -> Self {
        Self {
            inner: evaluator::WeightRunner::new(),
        }
    }

    pub fn progress(&self) -> usize {
        self.inner.progress()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[pyo3(signature = (detectors, sources, worker_count=1, config_json=None))]
    pub fn compute(
        &self,
        py: Python<'_>,
        detectors: Vec<PyDetector>,
        sources: Vec<PySource>,
        worker_count: usize,
        config_json: Option<&str>,
    ) -> PyResult<Vec<PyRow>> {
        let engine = build_engine(worker_count, config_json)?;
        let (detectors, sources) = unwrap_inputs(detectors, sources);
        let runner = self.inner.clone();
        let rows = py
            .allow_threads(|| engine.compute_with_runner(&detectors, &sources, &runner))
            .map_err(to_py_err)?;
        Ok(rows_to_py(rows))
    }
}
