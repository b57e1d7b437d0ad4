//! Error type shared by geometry construction, integration and batch runs.

use thiserror::Error;

use crate::aggregate::ResponseRow;
use crate::evaluator::ItemFailure;

#[derive(Error, Debug)]
pub enum WeightError {
    #[error("Geometry error in {shape}: {message}")]
    Geometry { shape: String, message: String },

    #[error("Parameter count mismatch: expected {expected}, got {got}")]
    ParameterCount { expected: usize, got: usize },

    #[error("Integration failed for {identity}: {message}")]
    Integration { identity: String, message: String },

    #[error("{} work items failed to integrate", .failures.len())]
    Batch {
        failures: Vec<ItemFailure>,
        partial: Vec<ResponseRow>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Computation cancelled after {completed} of {total} work items")]
    Cancelled { completed: usize, total: usize },

    #[error("Worker pool error: {0}")]
    ThreadPool(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeightError {
    pub(crate) fn geometry(shape: &str, message: impl Into<String>) -> Self {
        WeightError::Geometry {
            shape: shape.to_string(),
            message: message.into(),
        }
    }
}

pub type WeightResult<T> = Result<T, WeightError>;
