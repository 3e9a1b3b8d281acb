//! Control-point deformation of a loaded toolpath.
//!
//! This module owns the edit-session state machine around the numerical
//! core:
//! - [`ControlPair`] - the atomic unit of influence (bind + control point)
//! - [`DeformerConfig`] - the weight/rotation parameter set
//! - [`DeformSession`] - rest positions, cached weights, solved rotations
//!   and the deformed vertex buffer, kept consistent across edits
//!
//! The session recomputes rather than patches: the weight matrix is
//! rebuilt whenever the pair set or parameters change, and the whole
//! deformed buffer is refreshed on every control-point move. Control
//! point counts are small (tens), so the redundant work buys simplicity.

pub mod displacement;
pub mod rotation;
pub mod weights;

pub use displacement::displace_weighted;
pub use rotation::solve_rotations;
pub use weights::{build_matrix, vertex_weights, WeightMatrix};

use crate::geometry::{Quat, Vec3};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A matched bind/control point pair.
///
/// The bind point is the rest-frame anchor and never moves after
/// creation; the control point is the user-draggable current-frame
/// target. The orientation stays at the identity until rotation solving
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPair {
    /// Rest-frame anchor position.
    pub bind: Vec3,
    /// Current-frame target position.
    pub control: Vec3,
    /// Solved orientation of the control point.
    #[serde(default = "identity_orientation")]
    pub orientation: Quat,
}

fn identity_orientation() -> Quat {
    Quat::identity()
}

impl ControlPair {
    /// Create a pair at `point`, with the control coincident with the
    /// bind and an identity orientation.
    pub fn new(point: Vec3) -> Self {
        ControlPair {
            bind: point,
            control: point,
            orientation: Quat::identity(),
        }
    }
}

/// Parameter set of the deformer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformerConfig {
    /// Add a virtual weight term that pins geometry near the reference
    /// ground plane in place.
    pub lock_to_ground: bool,
    /// How sharply influence decays with distance. Must be positive.
    pub falloff_exponent: f64,
    /// Solve a rigid rotation per control pair and blend its rotational
    /// correction into the displacement field.
    pub solve_rotation: bool,
}

impl Default for DeformerConfig {
    fn default() -> Self {
        DeformerConfig {
            lock_to_ground: true,
            falloff_exponent: 2.0,
            solve_rotation: true,
        }
    }
}

/// A single-owner edit session over one loaded toolpath.
///
/// Holds the immutable rest-pose vertex buffer, the live control pair
/// list and the derived state (weight matrix, solved orientations,
/// deformed buffer). The invariant
/// `deformed[i] == rest[i] + displace(rest[i])` holds after every
/// mutating call; there is no separately mutable deformed state.
#[derive(Debug, Clone)]
pub struct DeformSession {
    rest_positions: Vec<Vec3>,
    pairs: Vec<ControlPair>,
    config: DeformerConfig,
    weights: WeightMatrix,
    deformed_positions: Vec<Vec3>,
}

impl DeformSession {
    /// Start a session over a rest-pose vertex buffer with no control
    /// pairs.
    pub fn new(rest_positions: Vec<Vec3>, config: DeformerConfig) -> Self {
        let deformed_positions = rest_positions.clone();
        let weights = build_matrix(&rest_positions, &[], &config);
        DeformSession {
            rest_positions,
            pairs: Vec::new(),
            config,
            weights,
            deformed_positions,
        }
    }

    /// Rest-pose vertex buffer, in load order.
    pub fn rest_positions(&self) -> &[Vec3] {
        &self.rest_positions
    }

    /// Deformed vertex buffer, index-aligned with the rest buffer.
    pub fn deformed_positions(&self) -> &[Vec3] {
        &self.deformed_positions
    }

    /// Current control pairs.
    pub fn pairs(&self) -> &[ControlPair] {
        &self.pairs
    }

    /// Current parameter set.
    pub fn config(&self) -> &DeformerConfig {
        &self.config
    }

    /// Create a new pair at `point` (bind and control coincident).
    pub fn add_pair(&mut self, point: Vec3) {
        self.pairs.push(ControlPair::new(point));
        self.rebuild_weights();
    }

    /// Remove the pair at `index`. Bind and control are destroyed
    /// together; the pair is the atomic unit.
    pub fn remove_pair(&mut self, index: usize) -> Result<()> {
        if index >= self.pairs.len() {
            return Err(Error::PairIndex(index));
        }
        self.pairs.remove(index);
        self.rebuild_weights();
        Ok(())
    }

    /// Replace the whole pair set (e.g. loaded from a points file).
    pub fn set_pairs(&mut self, pairs: Vec<ControlPair>) {
        self.pairs = pairs;
        self.rebuild_weights();
    }

    /// Move the control point of the pair at `index`.
    pub fn move_control(&mut self, index: usize, position: Vec3) -> Result<()> {
        let pair = self
            .pairs
            .get_mut(index)
            .ok_or(Error::PairIndex(index))?;
        pair.control = position;
        self.refresh();
        Ok(())
    }

    /// Replace the parameter set.
    pub fn set_config(&mut self, config: DeformerConfig) {
        self.config = config;
        self.rebuild_weights();
    }

    /// Evaluate the displacement field at an arbitrary point.
    ///
    /// Computes the point's weight row on the fly; this is the path the
    /// re-synthesizer uses for points outside the vertex buffer.
    pub fn displace(&self, point: Vec3) -> Vec3 {
        let row = vertex_weights(point, &self.pairs, &self.config);
        displace_weighted(point, &self.pairs, &row, self.config.solve_rotation)
    }

    /// Deform an arbitrary point: rest position plus displacement.
    pub fn deform_point(&self, point: Vec3) -> Vec3 {
        point + self.displace(point)
    }

    /// Weight matrix rebuild: pair set or parameters changed.
    fn rebuild_weights(&mut self) {
        self.weights = build_matrix(&self.rest_positions, &self.pairs, &self.config);
        self.refresh();
    }

    /// Displacement refresh: some control point moved.
    fn refresh(&mut self) {
        if self.config.solve_rotation {
            let rotations = solve_rotations(&self.pairs);
            for (pair, rotation) in self.pairs.iter_mut().zip(rotations) {
                pair.orientation = rotation;
            }
        } else {
            for pair in &mut self.pairs {
                pair.orientation = Quat::identity();
            }
        }

        for (i, rest) in self.rest_positions.iter().enumerate() {
            let displacement = displace_weighted(
                *rest,
                &self.pairs,
                self.weights.row(i),
                self.config.solve_rotation,
            );
            self.deformed_positions[i] = rest + displacement;
        }
    }
}

/// Load a control pair list from a JSON file.
///
/// The format is a list of `{"bind": [x, y, z], "control": [x, y, z]}`
/// objects; orientations default to the identity.
pub fn load_control_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<ControlPair>> {
    let text = std::fs::read_to_string(path)?;
    let pairs: Vec<ControlPair> = serde_json::from_str(&text)?;
    log::debug!("loaded {} control pairs", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::approx_eq;

    fn grid_rest() -> Vec<Vec3> {
        (0..20)
            .map(|i| Vec3::new((i % 5) as f64, (i / 5) as f64, 1.0))
            .collect()
    }

    fn translation_config() -> DeformerConfig {
        DeformerConfig {
            lock_to_ground: false,
            falloff_exponent: 2.0,
            solve_rotation: false,
        }
    }

    #[test]
    fn test_new_session_is_undeformed() {
        let session = DeformSession::new(grid_rest(), DeformerConfig::default());
        assert_eq!(session.rest_positions(), session.deformed_positions());
    }

    #[test]
    fn test_single_pair_rigid_translation() {
        // One pair means every vertex weight is 1.0, so moving the
        // control by d moves every vertex by exactly d.
        let mut session = DeformSession::new(grid_rest(), translation_config());
        session.add_pair(Vec3::new(2.0, 2.0, 1.0));
        session
            .move_control(0, Vec3::new(5.0, 2.0, 3.0))
            .unwrap();

        let d = Vec3::new(3.0, 0.0, 2.0);
        for (rest, deformed) in session
            .rest_positions()
            .iter()
            .zip(session.deformed_positions().iter())
        {
            let moved = rest + d;
            assert!(approx_eq(deformed.x, moved.x, 1e-12));
            assert!(approx_eq(deformed.y, moved.y, 1e-12));
            assert!(approx_eq(deformed.z, moved.z, 1e-12));
        }
    }

    #[test]
    fn test_zero_net_displacement_is_exactly_zero() {
        // Controls still on their binds: the field is exactly zero.
        let mut session = DeformSession::new(grid_rest(), translation_config());
        session.add_pair(Vec3::new(0.0, 0.0, 1.0));
        session.add_pair(Vec3::new(4.0, 3.0, 1.0));
        assert_eq!(session.rest_positions(), session.deformed_positions());
        assert_eq!(session.displace(Vec3::new(7.0, 7.0, 7.0)), Vec3::zeros());
    }

    #[test]
    fn test_single_pair_solver_yields_identity() {
        let mut config = translation_config();
        config.solve_rotation = true;
        let mut session = DeformSession::new(grid_rest(), config);
        session.add_pair(Vec3::new(2.0, 2.0, 1.0));
        session
            .move_control(0, Vec3::new(4.0, 2.0, 1.0))
            .unwrap();
        assert_eq!(session.pairs()[0].orientation, Quat::identity());
    }

    #[test]
    fn test_remove_pair_atomic() {
        let mut session = DeformSession::new(grid_rest(), translation_config());
        session.add_pair(Vec3::new(0.0, 0.0, 1.0));
        session.add_pair(Vec3::new(4.0, 0.0, 1.0));
        session.move_control(1, Vec3::new(6.0, 0.0, 1.0)).unwrap();
        session.remove_pair(1).unwrap();
        assert_eq!(session.pairs().len(), 1);
        // Remaining pair is undisplaced, so the buffer snaps back.
        assert_eq!(session.rest_positions(), session.deformed_positions());
    }

    #[test]
    fn test_pair_index_errors() {
        let mut session = DeformSession::new(grid_rest(), translation_config());
        assert!(matches!(
            session.remove_pair(0),
            Err(Error::PairIndex(0))
        ));
        assert!(matches!(
            session.move_control(3, Vec3::zeros()),
            Err(Error::PairIndex(3))
        ));
    }

    #[test]
    fn test_deformed_invariant_matches_displace() {
        let mut session = DeformSession::new(grid_rest(), translation_config());
        session.add_pair(Vec3::new(1.0, 1.0, 1.0));
        session.add_pair(Vec3::new(3.0, 2.0, 1.0));
        session.move_control(0, Vec3::new(1.5, 0.0, 2.0)).unwrap();

        for (rest, deformed) in session
            .rest_positions()
            .iter()
            .zip(session.deformed_positions().iter())
        {
            let expected = session.deform_point(*rest);
            assert!(approx_eq(deformed.x, expected.x, 1e-12));
            assert!(approx_eq(deformed.y, expected.y, 1e-12));
            assert!(approx_eq(deformed.z, expected.z, 1e-12));
        }
    }
}
