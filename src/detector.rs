//! Detectors and their planar detecting surfaces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WeightError, WeightResult};
use crate::shapes::{check_param_count, Geometry};
use crate::vec3::{Vec3, NORMAL_EPSILON};

const INCH: f64 = 2.54;

/// Minimum extent for an axis to span a patch surface.
const MIN_PATCH_EXTENT: f64 = 1e-4;

/// Face offsets of the NaI block from its centre, in inches:
/// front, back, left, right, top, bottom.
const NAI_OFFSETS: [[f64; 3]; 6] = [
    [1.125, 0.0, 0.0],
    [-1.125, 0.0, 0.0],
    [0.0, 8.125, 0.0],
    [0.0, -8.125, 0.0],
    [0.0, 0.0, 2.125],
    [0.0, 0.0, -2.125],
];

/// Half-edge vectors of each NaI face, in inches.
const NAI_VECTORS: [([f64; 3], [f64; 3]); 6] = [
    ([0.0, 2.125, 0.0], [0.0, 0.0, 8.125]),
    ([0.0, 2.125, 0.0], [0.0, 0.0, 8.125]),
    ([0.0, 2.125, 0.0], [1.125, 0.0, 0.0]),
    ([0.0, 2.125, 0.0], [1.125, 0.0, 0.0]),
    ([1.125, 0.0, 0.0], [0.0, 0.0, 8.125]),
    ([1.125, 0.0, 0.0], [0.0, 0.0, 8.125]),
];

const NAI_NORMALS: [[f64; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

const SURFACE_BOUNDS: [(f64, f64); 2] = [(-1.0, 1.0), (-1.0, 1.0)];

/// Planar patch over which incident flux is integrated. Only the side the
/// outward `normal` points to can see a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectingSurface {
    pub center: Vec3,
    pub vec1: Vec3,
    pub vec2: Vec3,
    pub normal: Vec3,
}

impl DetectingSurface {
    /// Build a surface; `normal` is normalized and must be non-zero.
    pub fn new(center: Vec3, vec1: Vec3, vec2: Vec3, normal: Vec3) -> WeightResult<Self> {
        let normal = normal.try_normalize(NORMAL_EPSILON).ok_or_else(|| {
            WeightError::geometry("DetectingSurface", "surface normal must be non-zero")
        })?;
        Ok(Self {
            center,
            vec1,
            vec2,
            normal,
        })
    }

    /// Position relative to the surface centre.
    #[inline]
    pub(crate) fn local_position_unchecked(&self, params: &[f64]) -> Vec3 {
        params[0] * self.vec1 + params[1] * self.vec2
    }

    #[inline]
    pub(crate) fn area_scale(&self) -> f64 {
        self.vec1.norm() * self.vec2.norm()
    }
}

impl Geometry for DetectingSurface {
    fn parameter_count(&self) -> usize {
        2
    }

    fn bounds(&self) -> &'static [(f64, f64)] {
        &SURFACE_BOUNDS
    }

    fn center(&self) -> Vec3 {
        self.center
    }

    fn position(&self, params: &[f64]) -> WeightResult<Vec3> {
        check_param_count(2, params)?;
        Ok(self.center + self.local_position_unchecked(params))
    }

    fn area_element(&self, params: &[f64]) -> WeightResult<f64> {
        check_param_count(2, params)?;
        Ok(self.area_scale())
    }
}

/// One detector placement, identified by `(det_num, run_num)`. The surface
/// list is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub det_num: u32,
    pub run_num: u32,
    pub center: Vec3,
    surfaces: Vec<DetectingSurface>,
}

impl Detector {
    /// Six-faced NaI block centred at `center` (coordinates in centimetres).
    pub fn nai(det_num: u32, run_num: u32, center: Vec3) -> Self {
        let surfaces = NAI_OFFSETS
            .iter()
            .zip(NAI_VECTORS.iter())
            .zip(NAI_NORMALS.iter())
            .map(|((offset, (v1, v2)), normal)| DetectingSurface {
                center: center + INCH * Vec3::from(*offset),
                vec1: INCH * Vec3::from(*v1),
                vec2: INCH * Vec3::from(*v2),
                normal: Vec3::from(*normal),
            })
            .collect();
        Self {
            det_num,
            run_num,
            center,
            surfaces,
        }
    }

    /// Single-surface detector.
    pub fn patch(
        det_num: u32,
        run_num: u32,
        center: Vec3,
        normal: Vec3,
        vec1: Vec3,
        vec2: Vec3,
    ) -> WeightResult<Self> {
        let surface = DetectingSurface::new(center, vec1, vec2, normal)?;
        Ok(Self {
            det_num,
            run_num,
            center,
            surfaces: vec![surface],
        })
    }

    /// Single-surface detector whose half-edge vectors are the first two
    /// coordinate axes with a non-negligible extent.
    pub fn patch_from_extents(
        det_num: u32,
        run_num: u32,
        center: Vec3,
        normal: Vec3,
        extents: [f64; 3],
    ) -> WeightResult<Self> {
        let mut axes = extents
            .iter()
            .zip([Vec3::x(), Vec3::y(), Vec3::z()])
            .filter(|(extent, _)| **extent > MIN_PATCH_EXTENT)
            .map(|(extent, axis)| *extent * axis);
        match (axes.next(), axes.next()) {
            (Some(vec1), Some(vec2)) => Self::patch(det_num, run_num, center, normal, vec1, vec2),
            _ => Err(WeightError::geometry(
                "DetectingSurface",
                format!("patch {det_num}/{run_num} needs two non-zero extents, got {extents:?}"),
            )),
        }
    }

    pub fn surfaces(&self) -> &[DetectingSurface] {
        &self.surfaces
    }

    pub fn run_data(&self) -> (u32, u32) {
        (self.det_num, self.run_num)
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Detector {} Run {} ({} surfaces)",
            self.det_num,
            self.run_num,
            self.surfaces.len()
        )
    }
}
