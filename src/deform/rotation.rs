//! Per-control-point rotation solver.
//!
//! Estimates, for each control pair, the rotation that best explains how
//! the directions toward its neighbor pairs moved between the bind
//! (rest) configuration and the current control configuration. The
//! solve is a fixed-point iteration on a first-order angular-velocity
//! update: per sweep, the cross products of rotated rest directions with
//! current directions accumulate into a correction `omega` whose
//! magnitude is the rotation angle and whose direction is the axis.
//!
//! The iteration is deterministic: pairs are solved in index order and
//! neighbors accumulate in ascending index order, so results are
//! bit-reproducible for identical inputs. Convergence to a global
//! optimum is not guaranteed, only a stationary estimate.

use crate::deform::ControlPair;
use crate::geometry::{direction_or_zero, Quat, Unit, Vec3};

/// Hard cap on correction sweeps per pair.
pub const MAX_ITERATIONS: usize = 50;

/// Correction magnitude below which the iteration stops early.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-9;

/// Guard added to the accumulated dot product before dividing.
const DENOMINATOR_EPSILON: f64 = 1e-7;

/// Solve a rotation for every control pair.
///
/// With fewer than two pairs there are no neighbor directions to compare,
/// so every rotation is the identity.
pub fn solve_rotations(pairs: &[ControlPair]) -> Vec<Quat> {
    if pairs.len() < 2 {
        return vec![Quat::identity(); pairs.len()];
    }
    (0..pairs.len()).map(|j| solve_pair(pairs, j)).collect()
}

/// Iterate the angular-velocity update for pair `j` until the correction
/// magnitude drops below [`CONVERGENCE_THRESHOLD`] or [`MAX_ITERATIONS`]
/// sweeps have run.
fn solve_pair(pairs: &[ControlPair], j: usize) -> Quat {
    let center = &pairs[j];
    let mut rotation = Quat::identity();

    for _ in 0..MAX_ITERATIONS {
        let mut numerator = Vec3::zeros();
        let mut denominator = 0.0;

        for (k, neighbor) in pairs.iter().enumerate() {
            if k == j {
                continue;
            }
            let rest_direction = rotation * direction_or_zero(neighbor.bind - center.bind);
            let current_direction = direction_or_zero(neighbor.control - center.control);
            numerator += rest_direction.cross(&current_direction);
            denominator += rest_direction.dot(&current_direction);
        }

        let omega = numerator / (denominator + DENOMINATOR_EPSILON).abs();
        let angle = omega.norm();
        if angle < CONVERGENCE_THRESHOLD {
            break;
        }
        let axis = Unit::new_normalize(omega);
        rotation = Quat::from_axis_angle(&axis, angle) * rotation;
    }

    rotation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::approx_eq;

    #[test]
    fn test_single_pair_is_identity() {
        let pairs = vec![ControlPair::new(Vec3::new(1.0, 2.0, 3.0))];
        let rotations = solve_rotations(&pairs);
        assert_eq!(rotations.len(), 1);
        assert_eq!(rotations[0], Quat::identity());
    }

    #[test]
    fn test_no_pairs() {
        assert!(solve_rotations(&[]).is_empty());
    }

    #[test]
    fn test_pure_translation_is_identity() {
        // Both controls shifted by the same vector: neighbor directions
        // are unchanged, so the solved rotations stay (numerically) at
        // the identity.
        let shift = Vec3::new(3.0, -1.0, 2.0);
        let mut a = ControlPair::new(Vec3::new(-1.0, 0.0, 0.0));
        let mut b = ControlPair::new(Vec3::new(1.0, 0.0, 0.0));
        a.control += shift;
        b.control += shift;
        let rotations = solve_rotations(&[a, b]);
        for rotation in rotations {
            assert!(rotation.angle() < 1e-6, "angle was {}", rotation.angle());
        }
    }

    #[test]
    fn test_quarter_turn_about_z_converges() {
        // Two pairs symmetric about the origin; one control swung 90
        // degrees about Z around the other. The solved rotation must
        // map the rest neighbor direction onto the current one.
        let a = ControlPair::new(Vec3::new(-1.0, 0.0, 0.0));
        let mut b = ControlPair::new(Vec3::new(1.0, 0.0, 0.0));
        b.control = Vec3::new(-1.0, 2.0, 0.0);

        let rotations = solve_rotations(&[a, b]);
        let rotated = rotations[0] * Vec3::new(1.0, 0.0, 0.0);
        assert!(approx_eq(rotated.x, 0.0, 1e-6), "x was {}", rotated.x);
        assert!(approx_eq(rotated.y, 1.0, 1e-6), "y was {}", rotated.y);
        assert!(approx_eq(rotated.z, 0.0, 1e-6), "z was {}", rotated.z);
    }

    #[test]
    fn test_deterministic() {
        let mut a = ControlPair::new(Vec3::new(0.0, 0.0, 0.0));
        let b = ControlPair::new(Vec3::new(2.0, 0.0, 1.0));
        let c = ControlPair::new(Vec3::new(0.0, 3.0, 2.0));
        a.control = Vec3::new(0.5, 0.5, 0.0);
        let pairs = vec![a, b, c];
        assert_eq!(solve_rotations(&pairs), solve_rotations(&pairs));
    }

    #[test]
    fn test_coincident_pairs_do_not_poison() {
        // Coincident bind positions produce zero-length directions which
        // normalize to zero and contribute nothing.
        let a = ControlPair::new(Vec3::new(1.0, 1.0, 1.0));
        let b = ControlPair::new(Vec3::new(1.0, 1.0, 1.0));
        let rotations = solve_rotations(&[a, b]);
        for rotation in rotations {
            assert!(rotation.angle().is_finite());
        }
    }
}
