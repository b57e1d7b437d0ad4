//! Numerical integrators for [`Integrand`]s.
//!
//! An integrator is a shareable handle (`Send + Sync`) holding only its
//! settings. Every `integrate` call builds its own scratch state and drops it
//! afterwards, so nothing leaks between work items or worker threads.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{WeightError, WeightResult};
use crate::kernel::Integrand;

/// Largest integral dimensionality the cubature supports.
pub const MAX_DIMS: usize = 6;
const MAX_SEGMENTS: usize = 1 << MAX_DIMS;

/// Informational counters from an integration. Not part of the weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub max_depth: usize,
    pub single_axis_recursions: u64,
    pub all_axis_recursions: u64,
    pub evaluations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegralEstimate {
    pub value: f64,
    pub diagnostics: Option<Diagnostics>,
}

impl IntegralEstimate {
    pub fn plain(value: f64) -> Self {
        Self {
            value,
            diagnostics: None,
        }
    }
}

/// Integrates a kernel over its concatenated surface/source bounds.
pub trait Integrator: Send + Sync {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate>;
}

impl<T: Integrator + ?Sized> Integrator for Box<T> {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        (**self).integrate(integrand)
    }
}

impl<T: Integrator + ?Sized> Integrator for &T {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        (**self).integrate(integrand)
    }
}

fn finite_or_fail(value: f64, integrand: &Integrand) -> WeightResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WeightError::Integration {
            identity: format!("{}D integrand", integrand.dimension()),
            message: format!("non-finite result {value}"),
        })
    }
}

// ── Adaptive recursive subdivision ─────────────────────────────────────────

/// Recursive-bisection cubature.
///
/// The box is first split into its 2ⁿ orthants. Each region is refined by
/// bisecting along single axes while any axis changes the estimate by more
/// than `convergence_limit`, and otherwise by a full 2ⁿ split that is accepted
/// once deeper than `min_depth` and converged. Region values are the
/// midpoint rule times the cell measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveCubature {
    pub min_depth: usize,
    pub max_depth: usize,
    pub convergence_limit: f64,
    pub value_limit: f64,
}

impl Default for AdaptiveCubature {
    fn default() -> Self {
        Self {
            min_depth: 2,
            max_depth: 24,
            convergence_limit: 1e-4,
            value_limit: 1e-14,
        }
    }
}

impl Integrator for AdaptiveCubature {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        let n = integrand.dimension();
        if n == 0 || n > MAX_DIMS {
            return Err(WeightError::Integration {
                identity: format!("{n}D integrand"),
                message: format!("adaptive cubature supports 1 to {MAX_DIMS} dimensions"),
            });
        }
        let mut calc = Calculator {
            integrand,
            settings: self,
            n,
            segments: 1 << n,
            point: [0.0; MAX_DIMS],
            diag: Diagnostics::default(),
        };
        let root = Cell::from_bounds(integrand.bounds());
        let mut total = 0.0;
        for mask in 0..calc.segments {
            let chunk = root.orthant(n, mask);
            let guess = calc.segment(&chunk);
            total += calc.refine(0, &chunk, guess);
        }
        Ok(IntegralEstimate {
            value: finite_or_fail(total, integrand)?,
            diagnostics: Some(calc.diag),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    lo: [f64; MAX_DIMS],
    hi: [f64; MAX_DIMS],
}

impl Cell {
    fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        let mut cell = Cell {
            lo: [0.0; MAX_DIMS],
            hi: [0.0; MAX_DIMS],
        };
        for (i, (lo, hi)) in bounds.iter().enumerate() {
            cell.lo[i] = *lo;
            cell.hi[i] = *hi;
        }
        cell
    }

    #[inline]
    fn mid(&self, axis: usize) -> f64 {
        0.5 * (self.lo[axis] + self.hi[axis])
    }

    fn half(&self, axis: usize, upper: bool) -> Cell {
        let mut out = *self;
        let mid = self.mid(axis);
        if upper {
            out.lo[axis] = mid;
        } else {
            out.hi[axis] = mid;
        }
        out
    }

    /// Sub-cell picking the upper half on every axis whose bit is set in `mask`.
    fn orthant(&self, n: usize, mask: usize) -> Cell {
        let mut out = *self;
        for axis in 0..n {
            let mid = self.mid(axis);
            if mask & (1 << axis) != 0 {
                out.lo[axis] = mid;
            } else {
                out.hi[axis] = mid;
            }
        }
        out
    }
}

#[inline]
fn relative_change(guess: f64, value: f64) -> f64 {
    (1.0 - value / guess).abs()
}

/// Per-call state of the adaptive cubature.
struct Calculator<'a> {
    integrand: &'a Integrand,
    settings: &'a AdaptiveCubature,
    n: usize,
    segments: usize,
    point: [f64; MAX_DIMS],
    diag: Diagnostics,
}

impl Calculator<'_> {
    fn segment(&mut self, cell: &Cell) -> f64 {
        self.diag.evaluations += 1;
        let mut measure = 1.0;
        for axis in 0..self.n {
            self.point[axis] = cell.mid(axis);
            measure *= cell.hi[axis] - cell.lo[axis];
        }
        let value = self.integrand.evaluate(&self.point[..self.n]);
        if value == 0.0 {
            return 0.0;
        }
        value * measure
    }

    fn refine(&mut self, level: usize, cell: &Cell, guess: f64) -> f64 {
        self.diag.max_depth = self.diag.max_depth.max(level);
        let s = self.settings;

        let mut halves = [[0.0; 2]; MAX_DIMS];
        let mut worst_axis = 0;
        let mut largest = 0.0;
        let mut needs_split = false;
        for axis in 0..self.n {
            let lo = self.segment(&cell.half(axis, false));
            let hi = self.segment(&cell.half(axis, true));
            halves[axis] = [lo, hi];
            let integral = lo + hi;
            if integral > s.value_limit {
                let diff = relative_change(guess, integral);
                if diff > s.convergence_limit {
                    needs_split = true;
                }
                if diff > largest {
                    largest = diff;
                    worst_axis = axis;
                }
            }
        }

        if needs_split {
            let [lo, hi] = halves[worst_axis];
            if level >= s.max_depth {
                return lo + hi;
            }
            self.diag.single_axis_recursions += 1;
            return self.refine(level + 1, &cell.half(worst_axis, false), lo)
                + self.refine(level + 1, &cell.half(worst_axis, true), hi);
        }

        let mut values = [0.0; MAX_SEGMENTS];
        let mut sum = 0.0;
        for (mask, value) in values.iter_mut().enumerate().take(self.segments) {
            *value = self.segment(&cell.orthant(self.n, mask));
            sum += *value;
        }
        let diff = relative_change(guess, sum);
        if level >= s.max_depth
            || (level > s.min_depth && (diff < s.convergence_limit || sum < s.value_limit))
        {
            return sum;
        }

        self.diag.all_axis_recursions += 1;
        let mut total = 0.0;
        for (mask, value) in values.iter().enumerate().take(self.segments) {
            total += self.refine(level + 1, &cell.orthant(self.n, mask), *value);
        }
        total
    }
}

// ── Gauss–Legendre ─────────────────────────────────────────────────────────

/// Composite tensor-product Gauss–Legendre quadrature: every axis is cut into
/// `subdivisions` equal pieces with an `order`-point rule on each.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    order: usize,
    subdivisions: usize,
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl Default for GaussLegendre {
    fn default() -> Self {
        Self::new(8, 1)
    }
}

impl GaussLegendre {
    /// `order` and `subdivisions` below 1 are raised to 1.
    pub fn new(order: usize, subdivisions: usize) -> Self {
        let order = order.max(1);
        let (nodes, weights) = legendre_nodes(order);
        Self {
            order,
            subdivisions: subdivisions.max(1),
            nodes,
            weights,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    /// Composite nodes and weights mapped onto `[lo, hi]`.
    fn axis_rule(&self, lo: f64, hi: f64) -> (Vec<f64>, Vec<f64>) {
        let width = (hi - lo) / self.subdivisions as f64;
        let half = 0.5 * width;
        let count = self.order * self.subdivisions;
        let mut xs = Vec::with_capacity(count);
        let mut ws = Vec::with_capacity(count);
        for piece in 0..self.subdivisions {
            let center = lo + (piece as f64 + 0.5) * width;
            for (x, w) in self.nodes.iter().zip(&self.weights) {
                xs.push(center + half * x);
                ws.push(half * w);
            }
        }
        (xs, ws)
    }
}

impl Integrator for GaussLegendre {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        let rules: Vec<(Vec<f64>, Vec<f64>)> = integrand
            .bounds()
            .iter()
            .map(|(lo, hi)| self.axis_rule(*lo, *hi))
            .collect();
        let n = rules.len();
        let per_axis = self.order * self.subdivisions;

        let mut index = vec![0usize; n];
        let mut point = vec![0.0; n];
        let mut total = 0.0;
        let mut evaluations = 0u64;
        loop {
            let mut weight = 1.0;
            for (axis, (xs, ws)) in rules.iter().enumerate() {
                point[axis] = xs[index[axis]];
                weight *= ws[index[axis]];
            }
            total += weight * integrand.evaluate(&point);
            evaluations += 1;

            // odometer increment, last axis fastest
            let mut axis = n;
            loop {
                if axis == 0 {
                    let value = finite_or_fail(total, integrand)?;
                    return Ok(IntegralEstimate {
                        value,
                        diagnostics: Some(Diagnostics {
                            evaluations,
                            ..Diagnostics::default()
                        }),
                    });
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < per_axis {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
}

/// Nodes and weights of the `n`-point rule on [-1, 1], by Newton iteration
/// on Pₙ from the Chebyshev-like initial guesses.
fn legendre_nodes(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let nf = n as f64;
    for i in 0..n.div_ceil(2) {
        let mut z = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (mut p1, mut p2) = (1.0, 0.0);
            for j in 0..n {
                let p3 = p2;
                p2 = p1;
                let jf = j as f64;
                p1 = ((2.0 * jf + 1.0) * z * p2 - jf * p3) / (jf + 1.0);
            }
            dp = nf * (z * p1 - p2) / (z * z - 1.0);
            let step = p1 / dp;
            z -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        let w = 2.0 / ((1.0 - z * z) * dp * dp);
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}
