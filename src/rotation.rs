//! Rotation matrices applied to shape basis vectors at construction time.
//!
//! Rotations compose by pre-multiplication, so the most recently added
//! rotation acts last. After each composition the matrix is rounded so that
//! e.g. cos(90°) is stored as exactly 0 instead of ~6e-17.

use nalgebra::{Matrix3, Rotation3, Unit};

use crate::error::{WeightError, WeightResult};
use crate::vec3::{Vec3, NORMAL_EPSILON};

/// Decimal places kept in the composed rotation matrix.
const RMAT_DECIMALS: i32 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    rmat: Rotation3<f64>,
}

impl Default for Rotation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation {
    pub fn identity() -> Self {
        Self {
            rmat: Rotation3::identity(),
        }
    }

    /// Rotate by `theta` degrees about the z axis.
    pub fn add_z_rot(self, theta: f64) -> Self {
        self.compose(Rotation3::from_axis_angle(&Vec3::z_axis(), theta.to_radians()))
    }

    /// Rotate by `theta` degrees about the y axis.
    pub fn add_y_rot(self, theta: f64) -> Self {
        self.compose(Rotation3::from_axis_angle(&Vec3::y_axis(), theta.to_radians()))
    }

    /// Rotate by `theta` degrees about the x axis.
    pub fn add_x_rot(self, theta: f64) -> Self {
        self.compose(Rotation3::from_axis_angle(&Vec3::x_axis(), theta.to_radians()))
    }

    /// Rotate by `theta` degrees about an arbitrary axis. The axis is
    /// normalized first; a zero axis is rejected.
    pub fn add_axis_rot(self, theta: f64, axis: Vec3) -> WeightResult<Self> {
        let axis = Unit::try_new(axis, NORMAL_EPSILON).ok_or_else(|| {
            WeightError::geometry("Rotation", "rotation axis must be non-zero")
        })?;
        Ok(self.compose(Rotation3::from_axis_angle(&axis, theta.to_radians())))
    }

    fn compose(self, rot: Rotation3<f64>) -> Self {
        let scale = 10f64.powi(RMAT_DECIMALS);
        let rounded = (rot * self.rmat).into_inner().map(|x| {
            let r = (x * scale).round() / scale;
            // keep -0.0 out of the matrix
            if r == 0.0 {
                0.0
            } else {
                r
            }
        });
        Self {
            rmat: Rotation3::from_matrix_unchecked(rounded),
        }
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.rmat * v
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        self.rmat.matrix()
    }
}
