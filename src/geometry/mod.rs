//! 3D math primitives for the deformation core.
//!
//! The whole crate works in the toolpath's local coordinate frame with
//! `f64` everywhere. Vectors and rotations come from `nalgebra`:
//! - [`Vec3`] - 3D point/vector (`nalgebra::Vector3<f64>`)
//! - [`Quat`] - unit quaternion rotation (`nalgebra::UnitQuaternion<f64>`)

pub use nalgebra::{Unit, UnitQuaternion, Vector3};

/// 3D vector / point type used throughout the crate.
pub type Vec3 = Vector3<f64>;

/// Unit quaternion rotation type used throughout the crate.
pub type Quat = UnitQuaternion<f64>;

/// Normalize a vector, mapping the zero vector to itself instead of NaN.
///
/// Degenerate directions (coincident control points) must degrade
/// silently rather than poison downstream accumulations.
#[inline]
pub fn direction_or_zero(v: Vec3) -> Vec3 {
    v.try_normalize(0.0).unwrap_or_else(Vec3::zeros)
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vec3, b: Vec3) -> f64 {
    (a - b).norm()
}

/// Check if a value is approximately equal to another within epsilon.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}
