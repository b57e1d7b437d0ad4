//! Inverse-square flux kernel and its dimensional dispatch.
//!
//! The integration vector is always the two surface parameters followed by
//! the source parameters. The kernel variant is chosen from the source's
//! [`SourceKind`] tag, never from the length of the bounds list.

use std::f64::consts::PI;

use crate::detector::DetectingSurface;
use crate::error::WeightResult;
use crate::shapes::{check_param_count, Geometry, Shape, Source, SourceKind};
use crate::visibility::faces;

const INV_FOUR_PI: f64 = 1.0 / (4.0 * PI);

const SURFACE_PARAMS: usize = 2;

/// Total dimensionality of a surface/source integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelDim {
    /// 2 parameters: surface only.
    Point,
    /// 3 parameters.
    Line,
    /// 4 parameters.
    Area,
    /// 5 parameters.
    Volume,
}

impl KernelDim {
    pub fn from_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Point => KernelDim::Point,
            SourceKind::Line => KernelDim::Line,
            SourceKind::Area => KernelDim::Area,
            SourceKind::Volume => KernelDim::Volume,
        }
    }

    pub fn total_params(self) -> usize {
        SURFACE_PARAMS + self.source_params()
    }

    pub fn source_params(self) -> usize {
        match self {
            KernelDim::Point => 0,
            KernelDim::Line => 1,
            KernelDim::Area => 2,
            KernelDim::Volume => 3,
        }
    }
}

/// Flux density of one source over one detecting surface.
///
/// Owns its own copies of both geometries. The source is stored shifted
/// into the surface frame so the surface centre is subtracted once, not
/// once per sample.
#[derive(Debug, Clone)]
pub struct Integrand {
    surface: DetectingSurface,
    source: Shape,
    dim: KernelDim,
    surface_area: f64,
    bounds: Vec<(f64, f64)>,
}

impl Integrand {
    pub fn new(surface: &DetectingSurface, source: &Source) -> Self {
        let dim = KernelDim::from_kind(source.kind());
        let bounds = surface
            .bounds()
            .iter()
            .chain(source.bounds().iter())
            .copied()
            .collect();
        Self {
            surface: surface.clone(),
            source: source.shape.shifted(surface.center),
            dim,
            surface_area: surface.area_scale(),
            bounds,
        }
    }

    pub fn dim(&self) -> KernelDim {
        self.dim
    }

    /// Surface bounds followed by source bounds.
    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    /// Like [`Integrand::evaluate`] but rejects a parameter vector of the
    /// wrong length instead of panicking.
    pub fn evaluate_checked(&self, x: &[f64]) -> WeightResult<f64> {
        check_param_count(self.dim.total_params(), x)?;
        Ok(self.evaluate(x))
    }

    /// Density at `x`. Panics if `x.len()` differs from [`Integrand::dimension`].
    #[inline]
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        assert_eq!(
            x.len(),
            self.bounds.len(),
            "{:?} integrand takes {} parameters",
            self.dim,
            self.bounds.len()
        );
        match self.dim {
            KernelDim::Point => self.point_kernel([x[0], x[1]]),
            KernelDim::Line => self.finite_kernel([x[0], x[1]], &x[2..3]),
            KernelDim::Area => self.finite_kernel([x[0], x[1]], &x[2..4]),
            KernelDim::Volume => self.finite_kernel([x[0], x[1]], &x[2..5]),
        }
    }

    // Visibility of a point source is settled before integration starts.
    fn point_kernel(&self, surf: [f64; 2]) -> f64 {
        let p_surf = self.surface.local_position_unchecked(&surf);
        let d2 = (p_surf - self.source.center()).norm_squared();
        self.surface_area * INV_FOUR_PI / d2
    }

    fn finite_kernel(&self, surf: [f64; 2], src: &[f64]) -> f64 {
        let p_src = self.source.position_unchecked(src);
        if !faces(self.surface.normal, p_src) {
            return 0.0;
        }
        let p_surf = self.surface.local_position_unchecked(&surf);
        let d2 = (p_surf - p_src).norm_squared();
        self.surface_area * self.source.area_element_unchecked(src) * INV_FOUR_PI / d2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::Rotation;
    use crate::vec3::Vec3;

    fn surface_at(center: Vec3) -> DetectingSurface {
        DetectingSurface::new(center, Vec3::y(), Vec3::z(), Vec3::x()).unwrap()
    }

    #[test]
    fn test_dims_follow_source_kind() {
        let surf = surface_at(Vec3::zeros());
        let cases = [
            (Shape::point(Vec3::new(5.0, 0.0, 0.0)), KernelDim::Point, 2),
            (Shape::line(Vec3::new(5.0, 0.0, 0.0), Vec3::new(5.0, 1.0, 0.0)), KernelDim::Line, 3),
            (Shape::circle_yz(Vec3::new(5.0, 0.0, 0.0), 1.0), KernelDim::Area, 4),
            (
                Shape::cuboid(Vec3::new(5.0, 0.0, 0.0), Vec3::x(), Vec3::y(), Vec3::z(), &Rotation::identity()),
                KernelDim::Volume,
                5,
            ),
        ];
        for (shape, dim, n) in cases {
            let integrand = Integrand::new(&surf, &Source::new("s", shape));
            assert_eq!(integrand.dim(), dim);
            assert_eq!(integrand.dimension(), n);
            assert_eq!(dim.total_params(), n);
        }
    }

    #[test]
    fn test_bounds_surface_first() {
        let surf = surface_at(Vec3::zeros());
        let src = Source::new("c", Shape::circle_xy(Vec3::new(3.0, 0.0, 0.0), 1.0));
        let integrand = Integrand::new(&surf, &src);
        assert_eq!(integrand.bounds()[..2], [(-1.0, 1.0), (-1.0, 1.0)]);
        assert_eq!(integrand.bounds()[2], (0.0, 2.0 * PI));
        assert_eq!(integrand.bounds()[3], (0.0, 1.0));
    }

    #[test]
    fn test_point_density_is_shift_invariant() {
        let offset = Vec3::new(7.0, -3.0, 2.0);
        let a = Integrand::new(
            &surface_at(Vec3::zeros()),
            &Source::new("p", Shape::point(Vec3::new(4.0, 0.0, 0.0))),
        );
        let b = Integrand::new(
            &surface_at(offset),
            &Source::new("p", Shape::point(offset + Vec3::new(4.0, 0.0, 0.0))),
        );
        let x = [0.25, -0.5];
        assert!((a.evaluate(&x) - b.evaluate(&x)).abs() < 1e-15);
        let expected = INV_FOUR_PI / (16.0 + 0.0625 + 0.25);
        assert!((a.evaluate(&x) - expected).abs() < 1e-15);
    }

    #[test]
    fn test_occluded_sample_is_hard_zero() {
        let surf = surface_at(Vec3::zeros());
        // line crossing the surface plane: x from -1 to 1
        let line = Source::new("l", Shape::line(Vec3::new(-1.0, 0.0, 3.0), Vec3::new(1.0, 0.0, 3.0)));
        let integrand = Integrand::new(&surf, &line);
        assert_eq!(integrand.evaluate(&[0.0, 0.0, 0.25]), 0.0);
        assert_eq!(integrand.evaluate(&[0.0, 0.0, 0.5]), 0.0);
        let visible = integrand.evaluate(&[0.0, 0.0, 0.75]);
        // |vec| = 2, sample at (0.5, 0, 3)
        assert!((visible - 2.0 * INV_FOUR_PI / 9.25).abs() < 1e-15);
    }

    #[test]
    fn test_occluded_area_samples_are_hard_zero() {
        let surf = surface_at(Vec3::zeros());
        // square in the xz plane straddling x = 0, half-edges 2 along x and 1 along z
        let square = Source::new(
            "sq",
            Shape::rectangle(Vec3::new(0.0, 4.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::z(), &Rotation::identity()),
        );
        let integrand = Integrand::new(&surf, &square);
        assert_eq!(integrand.evaluate(&[0.0, 0.0, -0.5, 0.3]), 0.0);
        assert_eq!(integrand.evaluate(&[0.0, 0.0, 0.0, 0.3]), 0.0);
        // source sample at (1, 4, 0), surface centre, |vec1||vec2| = 2
        let visible = integrand.evaluate(&[0.0, 0.0, 0.5, 0.0]);
        assert!((visible - 2.0 * INV_FOUR_PI / 17.0).abs() < 1e-15);
    }

    #[test]
    fn test_occluded_volume_samples_are_hard_zero() {
        let surf = surface_at(Vec3::zeros());
        let block = Source::new(
            "box",
            Shape::cuboid(Vec3::new(0.0, 0.0, 5.0), Vec3::x(), Vec3::y(), Vec3::z(), &Rotation::identity()),
        );
        let integrand = Integrand::new(&surf, &block);
        assert_eq!(integrand.evaluate(&[0.5, 0.5, -0.25, 0.0, 0.0]), 0.0);
        assert_eq!(integrand.evaluate(&[0.5, 0.5, 0.0, 0.0, 0.0]), 0.0);
        // source sample at (0.5, 0, 5), surface sample at (0, 0, 0)
        let visible = integrand.evaluate(&[0.0, 0.0, 0.5, 0.0, 0.0]);
        assert!((visible - INV_FOUR_PI / 25.25).abs() < 1e-15);
    }

    #[test]
    #[should_panic(expected = "takes 2 parameters")]
    fn test_evaluate_panics_on_extra_parameters() {
        let surf = surface_at(Vec3::zeros());
        let integrand = Integrand::new(&surf, &Source::new("p", Shape::point(Vec3::new(5.0, 0.0, 0.0))));
        integrand.evaluate(&[0.1, 0.2, 9.0, 9.0, 9.0]);
    }

    #[test]
    #[should_panic(expected = "takes 3 parameters")]
    fn test_evaluate_panics_on_missing_parameters() {
        let surf = surface_at(Vec3::zeros());
        let line = Source::new("l", Shape::line(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
        Integrand::new(&surf, &line).evaluate(&[0.0, 0.0]);
    }

    #[test]
    fn test_checked_evaluation_rejects_wrong_length() {
        let surf = surface_at(Vec3::zeros());
        let line = Source::new("l", Shape::line(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)));
        let integrand = Integrand::new(&surf, &line);
        assert!(integrand.evaluate_checked(&[0.0, 0.0]).is_err());
        assert!(integrand.evaluate_checked(&[0.0, 0.0, 0.5, 0.5]).is_err());
        assert!(integrand.evaluate_checked(&[0.0, 0.0, 0.5]).is_ok());
    }
}
