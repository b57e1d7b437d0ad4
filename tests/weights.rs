//! End-to-end weight computation with stub and real integrators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use posdecomp::{
    compute_weights, compute_weights_with, Detector, GaussLegendre, IntegralEstimate, Integrand,
    Integrator, KernelDim, Rotation, Shape, Source, Vec3, WeightEngine, WeightError, WeightResult,
    WeightRunner,
};

/// ∫∫_{[-1,1]²} 1/(4π(100 + a² + b²)) da db
const FACING_POINT_REFERENCE: f64 = 0.0031620741060337755;

struct Counting {
    calls: AtomicUsize,
}

impl Integrator for Counting {
    fn integrate(&self, _: &Integrand) -> WeightResult<IntegralEstimate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(IntegralEstimate::plain(1.0))
    }
}

struct Constant(f64);

impl Integrator for Constant {
    fn integrate(&self, _: &Integrand) -> WeightResult<IntegralEstimate> {
        Ok(IntegralEstimate::plain(self.0))
    }
}

/// Records the dimensionality each call received and checks the integrand
/// accepts exactly that many parameters.
struct DimRecorder {
    seen: Mutex<Vec<(KernelDim, usize)>>,
}

impl Integrator for DimRecorder {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        let mid: Vec<f64> = integrand
            .bounds()
            .iter()
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect();
        let value = integrand.evaluate_checked(&mid)?;
        let mut longer = mid.clone();
        longer.push(0.0);
        assert!(integrand.evaluate_checked(&longer).is_err());
        self.seen
            .lock()
            .unwrap()
            .push((integrand.dim(), mid.len()));
        Ok(IntegralEstimate::plain(value))
    }
}

/// Fails on line sources only.
struct FailOnLines;

impl Integrator for FailOnLines {
    fn integrate(&self, integrand: &Integrand) -> WeightResult<IntegralEstimate> {
        if integrand.dim() == KernelDim::Line {
            return Err(WeightError::Integration {
                identity: String::new(),
                message: "did not converge".into(),
            });
        }
        Ok(IntegralEstimate::plain(1.0))
    }
}

fn unit_patch() -> Detector {
    Detector::patch(1, 1, Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z()).unwrap()
}

#[test]
fn test_point_behind_surface_skips_integrator() {
    let stub = Counting {
        calls: AtomicUsize::new(0),
    };
    let behind = Source::new("behind", Shape::point(Vec3::new(-10.0, 0.0, 0.0)));
    let rows = compute_weights_with(&[unit_patch()], &[behind], 1, &stub).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].weight, 0.0);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);

    let front = Source::new("front", Shape::point(Vec3::new(10.0, 0.0, 0.0)));
    compute_weights_with(&[unit_patch()], &[front], 1, &stub).unwrap();
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concrete_point_scenario() {
    let sources = vec![
        Source::new("front", Shape::point(Vec3::new(10.0, 0.0, 0.0))),
        Source::new("back", Shape::point(Vec3::new(-10.0, 0.0, 0.0))),
    ];
    let exact = GaussLegendre::new(16, 2);
    let rows = compute_weights_with(&[unit_patch()], &sources, 1, &exact).unwrap();
    assert_eq!(rows.len(), 2);
    // sorted by source name
    assert_eq!(rows[0].source_name, "back");
    assert_eq!(rows[0].weight, 0.0);
    assert_eq!(rows[1].source_name, "front");
    let rel = (rows[1].weight - FACING_POINT_REFERENCE).abs() / FACING_POINT_REFERENCE;
    assert!(rel < 1e-6, "relative error {rel}");
}

#[test]
fn test_default_adaptive_matches_reference() {
    let front = Source::new("front", Shape::point(Vec3::new(10.0, 0.0, 0.0)));
    let rows = compute_weights(&[unit_patch()], &[front], 1).unwrap();
    let rel = (rows[0].weight - FACING_POINT_REFERENCE).abs() / FACING_POINT_REFERENCE;
    assert!(rel < 1e-4, "relative error {rel}");
}

#[test]
fn test_six_surfaces_add_up() {
    let wall = Source::new(
        "wall",
        Shape::rectangle(Vec3::new(100.0, 0.0, 0.0), Vec3::y(), Vec3::z(), &Rotation::identity()),
    );
    let rows = compute_weights_with(
        &[Detector::nai(8, 4, Vec3::zeros())],
        &[wall],
        1,
        &Constant(0.25),
    )
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].weight, 6.0 * 0.25);
}

#[test]
fn test_dimensional_dispatch() {
    let recorder = DimRecorder {
        seen: Mutex::new(Vec::new()),
    };
    let at = Vec3::new(10.0, 0.0, 0.0);
    let sources = vec![
        Source::new("a_point", Shape::point(at)),
        Source::new("b_line", Shape::line(at, at + Vec3::y())),
        Source::new("c_area", Shape::rectangle(at, Vec3::y(), Vec3::z(), &Rotation::identity())),
        Source::new(
            "d_volume",
            Shape::cuboid(at, Vec3::x(), Vec3::y(), Vec3::z(), &Rotation::identity()),
        ),
    ];
    compute_weights_with(&[unit_patch()], &sources, 1, &recorder).unwrap();
    let seen = recorder.seen.into_inner().unwrap();
    assert_eq!(
        seen,
        vec![
            (KernelDim::Point, 2),
            (KernelDim::Line, 3),
            (KernelDim::Area, 4),
            (KernelDim::Volume, 5),
        ]
    );
}

#[test]
fn test_subdivided_wall_sums_to_whole() {
    let wall = Source::new(
        "wall",
        Shape::rectangle(
            Vec3::new(40.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 0.0, 6.0),
            &Rotation::identity(),
        ),
    );
    let quarters = wall.subdivide(2).unwrap();
    let det = unit_patch();
    let gl = GaussLegendre::new(6, 2);

    let whole = compute_weights_with(&[det.clone()], &[wall], 1, &gl).unwrap();
    let parts = compute_weights_with(&[det], &quarters, 1, &gl).unwrap();
    assert_eq!(parts.len(), 4);
    let sum: f64 = parts.iter().map(|r| r.weight).sum();
    let rel = (sum - whole[0].weight).abs() / whole[0].weight;
    assert!(rel < 1e-8, "relative error {rel}");
}

#[test]
fn test_rotated_circle_matches_axis_aligned_disk() {
    let at = Vec3::new(10.0, 0.5, -0.5);
    let sources = vec![
        Source::new("flat", Shape::circle_yz(at, 1.0)),
        Source::new("turned", Shape::circle(at, 1.0, &Rotation::identity().add_y_rot(90.0))),
    ];
    let rows = compute_weights_with(&[unit_patch()], &sources, 1, &GaussLegendre::new(10, 3)).unwrap();
    assert_eq!(rows.len(), 2);
    let rel = (rows[0].weight - rows[1].weight).abs() / rows[0].weight;
    assert!(rel < 1e-8, "relative error {rel}");
}

#[test]
fn test_batch_failure_lists_identities_and_keeps_good_rows() {
    let at = Vec3::new(10.0, 0.0, 0.0);
    let sources = vec![
        Source::new("line", Shape::line(at, at + Vec3::z())),
        Source::new("point", Shape::point(at)),
    ];
    let dets = vec![unit_patch(), Detector::nai(8, 1, Vec3::new(0.0, 50.0, 0.0))];
    match compute_weights_with(&dets, &sources, 1, &FailOnLines) {
        Err(WeightError::Batch { failures, partial }) => {
            assert_eq!(failures.len(), 1 + 6);
            assert!(failures.iter().all(|f| f.identity.source_name == "line"));
            assert_eq!(partial.len(), 2);
            assert!(partial.iter().all(|r| r.source_name == "point"));
        }
        other => panic!("expected a batch error, got {other:?}"),
    }
}

#[test]
fn test_engine_runner_reports_progress() {
    let engine = WeightEngine::with_integrator(2, Box::new(Constant(1.0))).unwrap();
    let runner = WeightRunner::new();
    let wall = Source::new(
        "wall",
        Shape::rectangle(Vec3::new(5.0, 0.0, 0.0), Vec3::y(), Vec3::z(), &Rotation::identity()),
    );
    let dets: Vec<Detector> = (0..3).map(|i| Detector::nai(i, 1, Vec3::zeros())).collect();
    let rows = engine.compute_with_runner(&dets, &[wall], &runner).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(runner.progress(), 18);
}
