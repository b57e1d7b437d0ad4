//! Source geometries.
//!
//! Every shape is reduced to a parametrized position function over a fixed
//! box of integration parameters plus a scalar area (or length, or volume)
//! element. Rotations are folded into the basis vectors when the shape is
//! built; the shape never keeps the rotation itself.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WeightError, WeightResult};
use crate::rotation::Rotation;
use crate::vec3::Vec3;

const TWO_PI: f64 = 2.0 * PI;

const POINT_BOUNDS: [(f64, f64); 0] = [];
const LINE_BOUNDS: [(f64, f64); 1] = [(0.0, 1.0)];
const RECTANGLE_BOUNDS: [(f64, f64); 2] = [(-1.0, 1.0), (-1.0, 1.0)];
const CIRCLE_BOUNDS: [(f64, f64); 2] = [(0.0, TWO_PI), (0.0, 1.0)];
const CYLINDER_BOUNDS: [(f64, f64); 2] = [(0.0, TWO_PI), (-1.0, 1.0)];
const CUBOID_BOUNDS: [(f64, f64); 3] = [(-1.0, 1.0), (-1.0, 1.0), (-1.0, 1.0)];

/// Integration category of a source. Selects the kernel dimensionality
/// directly instead of inferring it from the length of the bounds list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Point,
    Line,
    Area,
    Volume,
}

impl SourceKind {
    pub fn parameter_count(self) -> usize {
        match self {
            SourceKind::Point => 0,
            SourceKind::Line => 1,
            SourceKind::Area => 2,
            SourceKind::Volume => 3,
        }
    }
}

/// Coordinate axis used by the axis-aligned shape constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Shared capability set of sources and detecting surfaces.
pub trait Geometry {
    fn parameter_count(&self) -> usize;

    /// `(low, high)` per parameter, in the order `position` expects them.
    fn bounds(&self) -> &'static [(f64, f64)];

    /// Reference point of the shape.
    fn center(&self) -> Vec3;

    /// Point on the shape for the given parameters. The slice length must
    /// equal `parameter_count()`.
    fn position(&self, params: &[f64]) -> WeightResult<Vec3>;

    fn area_element(&self, params: &[f64]) -> WeightResult<f64>;
}

pub(crate) fn check_param_count(expected: usize, params: &[f64]) -> WeightResult<()> {
    if params.len() != expected {
        return Err(WeightError::ParameterCount {
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point {
        center: Vec3,
    },
    Line {
        start: Vec3,
        vec: Vec3,
    },
    /// Flat patch spanned by two half-edge vectors from the centre.
    Rectangle {
        center: Vec3,
        vec1: Vec3,
        vec2: Vec3,
    },
    /// Disk of `radius` in the plane spanned by the unit vectors `u`, `v`.
    Circle {
        center: Vec3,
        radius: f64,
        u: Vec3,
        v: Vec3,
    },
    /// Open cylindrical shell around `axis` (unit), `u`/`v` span the cross section.
    CylinderShell {
        center: Vec3,
        radius: f64,
        half_length: f64,
        axis: Vec3,
        u: Vec3,
        v: Vec3,
    },
    /// Solid box spanned by three half-edge vectors.
    Cuboid {
        center: Vec3,
        vec1: Vec3,
        vec2: Vec3,
        vec3: Vec3,
    },
}

impl Shape {
    pub fn point(center: Vec3) -> Self {
        Shape::Point { center }
    }

    pub fn line(start: Vec3, stop: Vec3) -> Self {
        Shape::Line {
            start,
            vec: stop - start,
        }
    }

    /// Rectangle from its centre and two half-edge vectors, rotated by `rotation`.
    pub fn rectangle(center: Vec3, edge1: Vec3, edge2: Vec3, rotation: &Rotation) -> Self {
        Shape::Rectangle {
            center,
            vec1: rotation.apply(edge1),
            vec2: rotation.apply(edge2),
        }
    }

    /// Disk that lies in the xy plane before `rotation` is applied.
    pub fn circle(center: Vec3, radius: f64, rotation: &Rotation) -> Self {
        Shape::Circle {
            center,
            radius,
            u: rotation.apply(Vec3::x()),
            v: rotation.apply(Vec3::y()),
        }
    }

    pub fn circle_xy(center: Vec3, radius: f64) -> Self {
        Shape::Circle {
            center,
            radius,
            u: Vec3::x(),
            v: Vec3::y(),
        }
    }

    pub fn circle_xz(center: Vec3, radius: f64) -> Self {
        Shape::Circle {
            center,
            radius,
            u: Vec3::x(),
            v: Vec3::z(),
        }
    }

    pub fn circle_yz(center: Vec3, radius: f64) -> Self {
        Shape::Circle {
            center,
            radius,
            u: Vec3::y(),
            v: Vec3::z(),
        }
    }

    /// Cylindrical shell aligned with a coordinate axis; `length` is the full length.
    pub fn axial_cylinder(axis: Axis, center: Vec3, radius: f64, length: f64) -> Self {
        let (axis, u, v) = match axis {
            Axis::X => (Vec3::x(), Vec3::y(), Vec3::z()),
            Axis::Y => (Vec3::y(), Vec3::x(), Vec3::z()),
            Axis::Z => (Vec3::z(), Vec3::x(), Vec3::y()),
        };
        Shape::CylinderShell {
            center,
            radius,
            half_length: length / 2.0,
            axis,
            u,
            v,
        }
    }

    pub fn vertical_cylinder(center: Vec3, radius: f64, length: f64) -> Self {
        Self::axial_cylinder(Axis::Z, center, radius, length)
    }

    /// Horizontal shell along x, turned about the vertical axis by `angle` degrees.
    pub fn rotated_cylinder(center: Vec3, radius: f64, length: f64, angle: f64) -> Self {
        let rot = Rotation::identity().add_z_rot(angle);
        Shape::CylinderShell {
            center,
            radius,
            half_length: length / 2.0,
            axis: rot.apply(Vec3::x()),
            u: rot.apply(Vec3::y()),
            v: Vec3::z(),
        }
    }

    pub fn cuboid(center: Vec3, edge1: Vec3, edge2: Vec3, edge3: Vec3, rotation: &Rotation) -> Self {
        Shape::Cuboid {
            center,
            vec1: rotation.apply(edge1),
            vec2: rotation.apply(edge2),
            vec3: rotation.apply(edge3),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Shape::Point { .. } => SourceKind::Point,
            Shape::Line { .. } => SourceKind::Line,
            Shape::Rectangle { .. } | Shape::Circle { .. } | Shape::CylinderShell { .. } => {
                SourceKind::Area
            }
            Shape::Cuboid { .. } => SourceKind::Volume,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Shape::Point { .. } => "Point",
            Shape::Line { .. } => "Line",
            Shape::Rectangle { .. } => "Rectangle",
            Shape::Circle { .. } => "Circle",
            Shape::CylinderShell { .. } => "CylinderShell",
            Shape::Cuboid { .. } => "Cuboid",
        }
    }

    /// Same shape moved by `-offset`.
    pub(crate) fn shifted(&self, offset: Vec3) -> Shape {
        let mut out = self.clone();
        match &mut out {
            Shape::Point { center }
            | Shape::Rectangle { center, .. }
            | Shape::Circle { center, .. }
            | Shape::CylinderShell { center, .. }
            | Shape::Cuboid { center, .. } => *center = *center - offset,
            Shape::Line { start, .. } => *start = *start - offset,
        }
        out
    }

    /// Position without the length check; callers guarantee
    /// `params.len() == parameter_count()`.
    #[inline]
    pub(crate) fn position_unchecked(&self, params: &[f64]) -> Vec3 {
        match self {
            Shape::Point { center } => *center,
            Shape::Line { start, vec } => *start + params[0] * *vec,
            Shape::Rectangle { center, vec1, vec2 } => {
                *center + params[0] * *vec1 + params[1] * *vec2
            }
            Shape::Circle {
                center,
                radius,
                u,
                v,
            } => {
                let (sin, cos) = params[0].sin_cos();
                let r = params[1] * radius;
                *center + (r * cos) * *u + (r * sin) * *v
            }
            Shape::CylinderShell {
                center,
                radius,
                half_length,
                axis,
                u,
                v,
            } => {
                let (sin, cos) = params[0].sin_cos();
                *center
                    + (radius * cos) * *u
                    + (radius * sin) * *v
                    + (params[1] * half_length) * *axis
            }
            Shape::Cuboid {
                center,
                vec1,
                vec2,
                vec3,
            } => *center + params[0] * *vec1 + params[1] * *vec2 + params[2] * *vec3,
        }
    }

    #[inline]
    pub(crate) fn area_element_unchecked(&self, params: &[f64]) -> f64 {
        match self {
            Shape::Point { .. } => 1.0,
            Shape::Line { vec, .. } => vec.norm(),
            Shape::Rectangle { vec1, vec2, .. } => vec1.norm() * vec2.norm(),
            // polar Jacobian: r dr dθ with r = s·radius
            Shape::Circle { radius, .. } => (params[1] * radius * radius).abs(),
            Shape::CylinderShell {
                radius,
                half_length,
                ..
            } => radius * half_length,
            Shape::Cuboid {
                vec1, vec2, vec3, ..
            } => vec1.norm() * vec2.norm() * vec3.norm(),
        }
    }
}

impl Geometry for Shape {
    fn parameter_count(&self) -> usize {
        self.kind().parameter_count()
    }

    fn bounds(&self) -> &'static [(f64, f64)] {
        match self {
            Shape::Point { .. } => &POINT_BOUNDS,
            Shape::Line { .. } => &LINE_BOUNDS,
            Shape::Rectangle { .. } => &RECTANGLE_BOUNDS,
            Shape::Circle { .. } => &CIRCLE_BOUNDS,
            Shape::CylinderShell { .. } => &CYLINDER_BOUNDS,
            Shape::Cuboid { .. } => &CUBOID_BOUNDS,
        }
    }

    fn center(&self) -> Vec3 {
        match self {
            Shape::Point { center }
            | Shape::Rectangle { center, .. }
            | Shape::Circle { center, .. }
            | Shape::CylinderShell { center, .. }
            | Shape::Cuboid { center, .. } => *center,
            Shape::Line { start, vec } => *start + 0.5 * *vec,
        }
    }

    fn position(&self, params: &[f64]) -> WeightResult<Vec3> {
        check_param_count(self.parameter_count(), params)?;
        Ok(self.position_unchecked(params))
    }

    fn area_element(&self, params: &[f64]) -> WeightResult<f64> {
        check_param_count(self.parameter_count(), params)?;
        Ok(self.area_element_unchecked(params))
    }
}

/// A named radiation source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub shape: Shape,
}

impl Source {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.shape.kind()
    }

    /// Split a rectangular source into an `n`×`n` grid of equal rectangles,
    /// named `{name}_{n*n}_{k}` with k running row-major from the +vec1/+vec2 corner.
    pub fn subdivide(&self, n: usize) -> WeightResult<Vec<Source>> {
        let Shape::Rectangle { center, vec1, vec2 } = self.shape else {
            return Err(WeightError::geometry(
                self.shape.variant_name(),
                format!("source {} cannot be subdivided", self.name),
            ));
        };
        if n == 0 {
            return Err(WeightError::geometry(
                "Rectangle",
                "subdivision count must be at least 1",
            ));
        }
        if n == 1 {
            return Ok(vec![self.clone()]);
        }

        let nf = n as f64;
        let (part1, part2) = (vec1 * (1.0 / nf), vec2 * (1.0 / nf));
        let offset = |i: usize| 1.0 - (2 * i + 1) as f64 / nf;
        let mut pieces = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let piece_center = center + offset(i) * vec1 + offset(j) * vec2;
                pieces.push(Source::new(
                    format!("{}_{}_{}", self.name, n * n, i * n + j),
                    Shape::Rectangle {
                        center: piece_center,
                        vec1: part1,
                        vec2: part2,
                    },
                ));
            }
        }
        Ok(pieces)
    }
}

impl Geometry for Source {
    fn parameter_count(&self) -> usize {
        self.shape.parameter_count()
    }

    fn bounds(&self) -> &'static [(f64, f64)] {
        self.shape.bounds()
    }

    fn center(&self) -> Vec3 {
        self.shape.center()
    }

    fn position(&self, params: &[f64]) -> WeightResult<Vec3> {
        self.shape.position(params)
    }

    fn area_element(&self, params: &[f64]) -> WeightResult<f64> {
        self.shape.area_element(params)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.center();
        write!(
            f,
            "{} - {} centered at ({:.2}, {:.2}, {:.2})",
            self.shape.variant_name(),
            self.name,
            c.x,
            c.y,
            c.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn test_parameter_counts_match_bounds() {
        let shapes = [
            Shape::point(Vec3::zeros()),
            Shape::line(Vec3::zeros(), Vec3::x()),
            Shape::rectangle(Vec3::zeros(), Vec3::x(), Vec3::y(), &Rotation::identity()),
            Shape::circle_xz(Vec3::zeros(), 2.0),
            Shape::vertical_cylinder(Vec3::zeros(), 1.0, 4.0),
            Shape::cuboid(Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z(), &Rotation::identity()),
        ];
        for s in &shapes {
            assert_eq!(s.parameter_count(), s.bounds().len(), "{}", s.variant_name());
        }
    }

    #[test]
    fn test_position_rejects_wrong_arity() {
        let rect = Shape::rectangle(Vec3::zeros(), Vec3::x(), Vec3::y(), &Rotation::identity());
        match rect.position(&[0.5]) {
            Err(WeightError::ParameterCount { expected, got }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(Shape::point(Vec3::x()).position(&[0.0]).is_err());
        assert!(approx(Shape::point(Vec3::x()).position(&[]).unwrap(), Vec3::x()));
    }

    #[test]
    fn test_rectangle_rotation_applied_to_basis() {
        let rot = Rotation::identity().add_z_rot(90.0);
        let rect = Shape::rectangle(Vec3::new(1.0, 2.0, 3.0), Vec3::x(), Vec3::z(), &rot);
        let p = rect.position(&[1.0, 0.0]).unwrap();
        assert!(approx(p, Vec3::new(1.0, 3.0, 3.0)));
    }

    #[test]
    fn test_line_endpoints_and_length() {
        let line = Shape::line(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 3.0, 4.0));
        assert!(approx(line.position(&[1.0]).unwrap(), Vec3::new(1.0, 3.0, 4.0)));
        assert!((line.area_element(&[0.3]).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_circle_area_integrates_to_pi_r_squared() {
        // ∫₀^{2π}∫₀¹ s·r² ds dθ = π r²
        let circle = Shape::circle_yz(Vec3::zeros(), 3.0);
        let n = 200;
        let mut total = 0.0;
        for i in 0..n {
            let s = (i as f64 + 0.5) / n as f64;
            total += circle.area_element(&[0.0, s]).unwrap() / n as f64;
        }
        total *= TWO_PI;
        assert!((total - PI * 9.0).abs() < 1e-9);
        let edge = circle.position(&[PI / 2.0, 1.0]).unwrap();
        assert!(approx(edge, Vec3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn test_rotated_circle_spans_yz_disk() {
        let center = Vec3::new(4.0, 1.0, -2.0);
        let turned = Shape::circle(center, 2.0, &Rotation::identity().add_y_rot(90.0));
        let flat = Shape::circle_yz(center, 2.0);
        for (theta, s) in [(0.0, 1.0), (0.7, 0.5), (2.0, 0.25), (4.5, 0.9)] {
            let p = turned.position(&[theta, s]).unwrap();
            assert!((p.x - center.x).abs() < 1e-12);
            assert!(((p - center).norm() - 2.0 * s).abs() < 1e-12);
            assert_eq!(
                turned.area_element(&[theta, s]).unwrap(),
                flat.area_element(&[theta, s]).unwrap()
            );
        }
        // x rotated onto -z
        assert!(approx(turned.position(&[0.0, 1.0]).unwrap(), center - 2.0 * Vec3::z()));
    }

    #[test]
    fn test_cylinder_shell_geometry() {
        let cyl = Shape::vertical_cylinder(Vec3::new(0.0, 0.0, 5.0), 2.0, 10.0);
        let top = cyl.position(&[0.0, 1.0]).unwrap();
        assert!(approx(top, Vec3::new(2.0, 0.0, 10.0)));
        // constant element times the 2π × 2 parameter box gives 2π r L
        let area = cyl.area_element(&[0.0, 0.0]).unwrap() * TWO_PI * 2.0;
        assert!((area - TWO_PI * 2.0 * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_cylinder_axis() {
        let cyl = Shape::rotated_cylinder(Vec3::zeros(), 1.0, 2.0, 90.0);
        let end = cyl.position(&[-PI / 2.0, 1.0]).unwrap();
        // axis rotated onto +y, θ = -π/2 puts the rim at -z
        assert!(approx(end, Vec3::new(0.0, 1.0, -1.0)));
    }

    #[test]
    fn test_subdivide_names_and_cover() {
        let wall = Source::new(
            "Rx_Wall",
            Shape::rectangle(Vec3::zeros(), Vec3::new(0.0, 4.0, 0.0), Vec3::new(0.0, 0.0, 2.0), &Rotation::identity()),
        );
        let quarters = wall.subdivide(2).unwrap();
        assert_eq!(quarters.len(), 4);
        assert_eq!(quarters[0].name, "Rx_Wall_4_0");
        assert!(approx(quarters[0].center(), Vec3::new(0.0, 2.0, 1.0)));
        assert!(approx(quarters[3].center(), Vec3::new(0.0, -2.0, -1.0)));
        let total: f64 = quarters
            .iter()
            .map(|q| q.area_element(&[0.0, 0.0]).unwrap())
            .sum();
        assert!((total - wall.area_element(&[0.0, 0.0]).unwrap()).abs() < 1e-12);

        let ninths = wall.subdivide(3).unwrap();
        assert_eq!(ninths[4].name, "Rx_Wall_9_4");
        assert!(approx(ninths[4].center(), Vec3::zeros()));
    }

    #[test]
    fn test_subdivide_rejects_non_rectangles() {
        let pt = Source::new("pt", Shape::point(Vec3::zeros()));
        assert!(pt.subdivide(2).is_err());
    }
}
