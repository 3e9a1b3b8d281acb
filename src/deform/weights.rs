//! Influence weight field over the control-point set.
//!
//! Every vertex gets a normalized weight per control pair, falling off
//! with distance to the pair's bind position as
//! `1 / (distance + 1e-3)^falloff`. With ground lock enabled, a virtual
//! term `1 / |z - 0.3|^falloff` joins the normalization denominator only,
//! suppressing all real influences near the build-plate reference plane.

use crate::deform::{ControlPair, DeformerConfig};
use crate::geometry::Vec3;

/// Reference ground plane height the lock term is measured against.
/// A coordinate convention of the host application, not a physical bed Z.
pub const GROUND_PLANE_Z: f64 = 0.3;

/// Epsilon added to the vertex-to-bind distance so a vertex sitting
/// exactly on a bind point gets a large finite weight.
pub const DISTANCE_EPSILON: f64 = 1e-3;

/// Dense row-normalized (vertex, control pair) weight matrix.
///
/// Rebuilt in full whenever the pair set or the weight parameters
/// change; never patched incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    data: Vec<f64>,
    pair_count: usize,
}

impl WeightMatrix {
    /// Number of control pairs (columns).
    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Weight row for one vertex. Empty when there are no pairs.
    pub fn row(&self, vertex: usize) -> &[f64] {
        if self.pair_count == 0 {
            &[]
        } else {
            let start = vertex * self.pair_count;
            &self.data[start..start + self.pair_count]
        }
    }
}

/// Build the full weight matrix for a rest-pose vertex buffer.
pub fn build_matrix(
    rest_positions: &[Vec3],
    pairs: &[ControlPair],
    config: &DeformerConfig,
) -> WeightMatrix {
    let pair_count = pairs.len();
    let mut data = vec![0.0; rest_positions.len() * pair_count];
    for (i, point) in rest_positions.iter().enumerate() {
        let row = &mut data[i * pair_count..(i + 1) * pair_count];
        fill_row(*point, pairs, config, row);
    }
    WeightMatrix { data, pair_count }
}

/// Compute the normalized weight row for an arbitrary point.
///
/// Used by the re-synthesizer for sample points that are not part of the
/// original vertex buffer.
pub fn vertex_weights(point: Vec3, pairs: &[ControlPair], config: &DeformerConfig) -> Vec<f64> {
    let mut row = vec![0.0; pairs.len()];
    fill_row(point, pairs, config, &mut row);
    row
}

fn fill_row(point: Vec3, pairs: &[ControlPair], config: &DeformerConfig, row: &mut [f64]) {
    // The ground term only ever contributes to the denominator; there is
    // no matching displacement contribution.
    let mut total = if config.lock_to_ground {
        ((point.z - GROUND_PLANE_Z).abs())
            .powf(config.falloff_exponent)
            .recip()
    } else {
        0.0
    };

    for (j, pair) in pairs.iter().enumerate() {
        let distance = (point - pair.bind).norm();
        let weight = (distance + DISTANCE_EPSILON)
            .powf(config.falloff_exponent)
            .recip();
        row[j] = weight;
        total += weight;
    }

    // Deviation from the original: a zero denominator (lock off and every
    // raw weight underflowed) yields an all-zero row instead of NaN.
    if total == 0.0 {
        row.fill(0.0);
        return;
    }
    for weight in row.iter_mut() {
        *weight /= total;
    }
}
