//! Fan-out evaluation of work items, sequentially or on a rayon pool.
//!
//! A batch moves through `Idle → Enumerated → Dispatched → Collected`.
//! Workers share nothing mutable except the optional progress counter and
//! cancel flag; every work item owns its geometry.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::PartialWeight;
use crate::detector::Detector;
use crate::error::{WeightError, WeightResult};
use crate::integrate::{Diagnostics, Integrator};
use crate::kernel::Integrand;
use crate::shapes::Source;
use crate::visibility::passes_precheck;
use crate::workitem::{enumerate_work_items, Identity, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Enumerated,
    Dispatched,
    Collected,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Idle => "idle",
            BatchPhase::Enumerated => "enumerated",
            BatchPhase::Dispatched => "dispatched",
            BatchPhase::Collected => "collected",
        };
        f.write_str(name)
    }
}

/// A work item whose integration failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub identity: Identity,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.message)
    }
}

/// Everything gathered once all workers finished, in no particular order.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub weights: Vec<PartialWeight>,
    pub failures: Vec<ItemFailure>,
}

/// Pollable progress and cancellation shared with a running batch.
#[derive(Debug, Clone)]
pub struct WeightRunner {
    progress: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl Default for WeightRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightRunner {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of work items finished so far.
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Request early termination. Items already being integrated finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.progress.store(0, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

/// Cap `requested` at the number of available execution units.
pub fn clamp_workers(requested: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let requested = requested.max(1);
    if requested > available {
        warn!(
            requested,
            available, "requested worker count exceeds available cores, clamping"
        );
        available
    } else {
        requested
    }
}

pub struct BatchEvaluator<'a> {
    integrator: &'a dyn Integrator,
    runner: Option<&'a WeightRunner>,
    phase: BatchPhase,
    items: Vec<WorkItem>,
}

impl<'a> BatchEvaluator<'a> {
    pub fn new(integrator: &'a dyn Integrator) -> Self {
        Self {
            integrator,
            runner: None,
            phase: BatchPhase::Idle,
            items: Vec::new(),
        }
    }

    pub fn with_runner(mut self, runner: &'a WeightRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// `Idle → Enumerated`. Returns the number of work items.
    pub fn enumerate(&mut self, detectors: &[Detector], sources: &[Source]) -> WeightResult<usize> {
        self.expect_phase(BatchPhase::Idle, "enumerate")?;
        self.items = enumerate_work_items(detectors, sources);
        self.phase = BatchPhase::Enumerated;
        debug!(items = self.items.len(), "work items enumerated");
        Ok(self.items.len())
    }

    /// `Enumerated → Dispatched → Collected`. With `worker_count == 1` the
    /// items run in order on the calling thread, otherwise on a fixed-size
    /// pool of the clamped worker count.
    pub fn dispatch(&mut self, worker_count: usize) -> WeightResult<Collected> {
        self.expect_phase(BatchPhase::Enumerated, "dispatch")?;
        let items = std::mem::take(&mut self.items);
        let total = items.len();
        let workers = if worker_count <= 1 {
            1
        } else {
            clamp_workers(worker_count)
        };
        self.phase = BatchPhase::Dispatched;
        info!(items = total, workers, "dispatching weight batch");

        let integrator = self.integrator;
        let runner = self.runner;
        let run_one = |item: WorkItem| -> Option<Result<PartialWeight, ItemFailure>> {
            if runner.is_some_and(|r| r.is_cancelled()) {
                return None;
            }
            let outcome = evaluate_item(item, integrator);
            if let Some(r) = runner {
                r.progress.fetch_add(1, Ordering::Relaxed);
            }
            Some(outcome)
        };

        let outcomes: Vec<Option<Result<PartialWeight, ItemFailure>>> = if workers == 1 {
            items.into_iter().map(run_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| WeightError::ThreadPool(e.to_string()))?;
            pool.install(|| items.into_par_iter().map(run_one).collect())
        };

        let mut collected = Collected::default();
        let mut completed = 0;
        for outcome in outcomes.into_iter().flatten() {
            completed += 1;
            match outcome {
                Ok(pw) => collected.weights.push(pw),
                Err(failure) => collected.failures.push(failure),
            }
        }
        if completed < total {
            return Err(WeightError::Cancelled { completed, total });
        }

        self.phase = BatchPhase::Collected;
        info!(
            items = total,
            failures = collected.failures.len(),
            "weight batch collected"
        );
        Ok(collected)
    }

    fn expect_phase(&self, expected: BatchPhase, action: &str) -> WeightResult<()> {
        if self.phase != expected {
            return Err(WeightError::Config(format!(
                "cannot {action} a batch in phase {}, expected {expected}",
                self.phase
            )));
        }
        Ok(())
    }
}

/// Weight of a single work item. Point sources that cannot see the surface
/// short-circuit to 0 without touching the integrator.
pub fn evaluate_item(
    item: WorkItem,
    integrator: &dyn Integrator,
) -> Result<PartialWeight, ItemFailure> {
    let WorkItem {
        identity,
        surface,
        source,
    } = item;

    if !passes_precheck(&surface, &source) {
        log_item(&identity, 0.0, None);
        return Ok(PartialWeight {
            identity,
            weight: 0.0,
        });
    }

    let integrand = Integrand::new(&surface, &source);
    match integrator.integrate(&integrand) {
        Ok(estimate) if estimate.value.is_finite() => {
            log_item(&identity, estimate.value, estimate.diagnostics.as_ref());
            Ok(PartialWeight {
                identity,
                weight: estimate.value,
            })
        }
        Ok(estimate) => Err(failure(identity, format!("non-finite result {}", estimate.value))),
        Err(WeightError::Integration { message, .. }) => Err(failure(identity, message)),
        Err(other) => Err(failure(identity, other.to_string())),
    }
}

fn failure(identity: Identity, message: String) -> ItemFailure {
    warn!(%identity, %message, "integration failed");
    ItemFailure { identity, message }
}

fn log_item(identity: &Identity, weight: f64, diag: Option<&Diagnostics>) {
    let d = diag.copied().unwrap_or_default();
    debug!(
        det = identity.det_num,
        run = identity.run_num,
        side = identity.surface_index,
        source = %identity.source_name,
        weight,
        depth = d.max_depth,
        single_axis = d.single_axis_recursions,
        all_axis = d.all_axis_recursions,
        evaluations = d.evaluations,
        "work item done"
    );
}
