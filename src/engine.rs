//! Public entry points: enumerate, evaluate, aggregate.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::aggregate::{sort_and_sum, ResponseMatrix, ResponseRow};
use crate::config::EngineConfig;
use crate::detector::Detector;
use crate::error::{WeightError, WeightResult};
use crate::evaluator::{BatchEvaluator, WeightRunner};
use crate::integrate::Integrator;
use crate::shapes::Source;

/// Holds the configuration and one integrator handle for any number of batches.
pub struct WeightEngine {
    config: EngineConfig,
    integrator: Box<dyn Integrator>,
}

impl WeightEngine {
    pub fn new(config: EngineConfig) -> WeightResult<Self> {
        config.validate()?;
        let integrator = config.build_integrator();
        Ok(Self { config, integrator })
    }

    /// Engine around a caller-supplied integrator. The integrator section of
    /// the config is ignored.
    pub fn with_integrator(
        worker_count: usize,
        integrator: Box<dyn Integrator>,
    ) -> WeightResult<Self> {
        let config = EngineConfig {
            worker_count,
            ..EngineConfig::default()
        };
        config.validate()?;
        Ok(Self { config, integrator })
    }

    pub fn from_json_str(json: &str) -> WeightResult<Self> {
        Self::new(EngineConfig::from_json_str(json)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compute(&self, detectors: &[Detector], sources: &[Source]) -> WeightResult<Vec<ResponseRow>> {
        run_batch(
            detectors,
            sources,
            self.config.worker_count,
            self.integrator.as_ref(),
            None,
        )
    }

    /// Like [`WeightEngine::compute`] but reports progress to, and stops on
    /// cancellation from, `runner`.
    pub fn compute_with_runner(
        &self,
        detectors: &[Detector],
        sources: &[Source],
        runner: &WeightRunner,
    ) -> WeightResult<Vec<ResponseRow>> {
        runner.reset();
        run_batch(
            detectors,
            sources,
            self.config.worker_count,
            self.integrator.as_ref(),
            Some(runner),
        )
    }

    /// Response rows laid out as a matrix, rows in `sources` order.
    pub fn response_matrix(
        &self,
        detectors: &[Detector],
        sources: &[Source],
    ) -> WeightResult<ResponseMatrix> {
        let rows = self.compute(detectors, sources)?;
        let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
        Ok(ResponseMatrix::from_rows(&rows, &names))
    }
}

/// Weights of every source for every detector position, using the default
/// adaptive integrator.
#[instrument(level = "debug", skip(detectors, sources))]
pub fn compute_weights(
    detectors: &[Detector],
    sources: &[Source],
    worker_count: usize,
) -> WeightResult<Vec<ResponseRow>> {
    let engine = WeightEngine::new(EngineConfig {
        worker_count,
        ..EngineConfig::default()
    })?;
    engine.compute(detectors, sources)
}

/// [`compute_weights`] with an explicit integrator handle.
pub fn compute_weights_with(
    detectors: &[Detector],
    sources: &[Source],
    worker_count: usize,
    integrator: &dyn Integrator,
) -> WeightResult<Vec<ResponseRow>> {
    if worker_count == 0 {
        return Err(WeightError::Config("worker_count must be at least 1".into()));
    }
    run_batch(detectors, sources, worker_count, integrator, None)
}

#[instrument(level = "info", skip_all, fields(detectors = detectors.len(), sources = sources.len(), worker_count = worker_count))]
fn run_batch(
    detectors: &[Detector],
    sources: &[Source],
    worker_count: usize,
    integrator: &dyn Integrator,
    runner: Option<&WeightRunner>,
) -> WeightResult<Vec<ResponseRow>> {
    let mut batch = BatchEvaluator::new(integrator);
    if let Some(runner) = runner {
        batch = batch.with_runner(runner);
    }
    batch.enumerate(detectors, sources)?;
    let collected = batch.dispatch(worker_count)?;

    if collected.failures.is_empty() {
        let rows = sort_and_sum(collected.weights);
        info!(rows = rows.len(), "weights computed");
        return Ok(rows);
    }

    // Only groups whose every surface integrated are reported as partial rows.
    let failed: HashSet<(u32, u32, String)> = collected
        .failures
        .iter()
        .map(|f| {
            (
                f.identity.det_num,
                f.identity.run_num,
                f.identity.source_name.clone(),
            )
        })
        .collect();
    let partial: Vec<ResponseRow> = sort_and_sum(collected.weights)
        .into_iter()
        .filter(|r| !failed.contains(&(r.det_num, r.run_num, r.source_name.clone())))
        .collect();
    let mut failures = collected.failures;
    failures.sort_by(|a, b| a.identity.cmp(&b.identity));
    Err(WeightError::Batch { failures, partial })
}
