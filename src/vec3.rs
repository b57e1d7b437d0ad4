//! Cartesian vector type shared by the geometry modules.

/// Position, basis vector or normal, in centimetres.
pub type Vec3 = nalgebra::Vector3<f64>;

/// Norm below which a direction vector is treated as zero.
pub(crate) const NORMAL_EPSILON: f64 = 1e-12;
