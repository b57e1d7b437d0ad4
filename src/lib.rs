//! Radiative source weights for position-decomposition of detector spectra.
//!
//! For every detector position and candidate source the engine integrates
//! the inverse-square flux over the detector's surfaces and sums it into one
//! [`ResponseRow`]. Python bindings are available with the `python` feature.

pub mod aggregate;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod integrate;
pub mod kernel;
#[cfg(feature = "python")]
mod python;
pub mod rotation;
pub mod shapes;
pub mod visibility;
pub mod vec3;
pub mod workitem;

pub use aggregate::{PartialWeight, ResponseMatrix, ResponseRow};
pub use config::{AdaptiveSettings, EngineConfig, GaussSettings, IntegratorConfig};
pub use detector::{DetectingSurface, Detector};
pub use engine::{compute_weights, compute_weights_with, WeightEngine};
pub use error::{WeightError, WeightResult};
pub use evaluator::{BatchPhase, ItemFailure, WeightRunner};
pub use integrate::{AdaptiveCubature, Diagnostics, GaussLegendre, IntegralEstimate, Integrator};
pub use kernel::{Integrand, KernelDim};
pub use rotation::Rotation;
pub use shapes::{Axis, Geometry, Shape, Source, SourceKind};
pub use vec3::Vec3;
pub use workitem::{Identity, WorkItem};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn posdecomp(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_weights_module(py_module)?;
    py_module.add("__doc__", "Detector response weights for position decomposition.")?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_weights_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "weights")?;
    submodule.add("__doc__", "Source/detector geometry and weight computation.")?;
    submodule.add_class::<python::PySource>()?;
    submodule.add_class::<python::PyDetector>()?;
    submodule.add_class::<python::PyWeightRunner>()?;
    submodule.add_function(wrap_pyfunction!(python::compute_weights, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::response_matrix, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
