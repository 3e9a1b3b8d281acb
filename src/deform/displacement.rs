//! Blended displacement field evaluation.
//!
//! Combines the weight row of a point with the control pairs' current
//! translations (and, when rotation solving is active, their solved
//! orientations) into a single 3D displacement. Pure functions only:
//! the re-synthesizer evaluates the field at sample points that never
//! appear in the original vertex buffer.

use crate::deform::ControlPair;
use crate::geometry::Vec3;

/// Evaluate the displacement of `point` given its weight row.
///
/// Per contributing pair the displacement is the bind-to-control
/// translation plus, with `solve_rotation`, a rotational correction
/// `R * (point - bind) - (point - bind)`, each scaled by the pair's
/// weight. `weights` must have one entry per pair.
pub fn displace_weighted(
    point: Vec3,
    pairs: &[ControlPair],
    weights: &[f64],
    solve_rotation: bool,
) -> Vec3 {
    debug_assert_eq!(pairs.len(), weights.len());

    let mut displacement = Vec3::zeros();
    for (pair, &weight) in pairs.iter().zip(weights.iter()) {
        let translation = pair.control - pair.bind;
        if solve_rotation {
            let offset = point - pair.bind;
            let rotational = pair.orientation * offset - offset;
            displacement += (translation + rotational) * weight;
        } else {
            displacement += translation * weight;
        }
    }
    displacement
}
