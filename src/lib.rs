//! # Pathbend
//!
//! A visual G-code toolpath deformation core.
//!
//! Pathbend lets a host application place pairs of bind/control points
//! over a rendered toolpath, drag the control points to deform the
//! shape, and export G-code consistent with the visual deformation:
//! - G-code interpretation into a layer-segmented line model
//! - Per-vertex influence weights from a sparse control-point set
//! - An iterative per-control-point rotation solver
//! - A blended (translation or rigid-rotation-aware) displacement field
//! - G-code re-synthesis with extrusion-flow compensation
//!
//! ## Example
//!
//! ```rust,ignore
//! use pathbend::{parse, DeformSession, DeformerConfig, Vec3};
//!
//! let toolpath = parse(&gcode_text);
//! let mut session = DeformSession::new(toolpath.rest_positions(), DeformerConfig::default());
//! session.add_pair(Vec3::new(10.0, 0.0, 5.0));
//! session.move_control(0, Vec3::new(14.0, 0.0, 5.0))?;
//! let deformed_text = pathbend::resynthesize(&gcode_text, &session);
//! ```
//!
//! All recomputation is synchronous and happens on the calling thread;
//! a session is owned by a single editor and never shared across
//! concurrent mutators.

pub mod deform;
pub mod gcode;
pub mod geometry;

pub use deform::{
    load_control_pairs, ControlPair, DeformSession, DeformerConfig, WeightMatrix,
};
pub use gcode::{parse, resynthesize, Layer, MotionState, Toolpath};
pub use geometry::{Quat, Vec3};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for deformation operations.
///
/// Most misbehavior degrades silently by design (unsupported commands
/// are skipped, arithmetic edge cases are guarded); only structural
/// problems surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("control point file error: {0}")]
    ControlPoints(#[from] serde_json::Error),

    #[error("invalid control pair index: {0}")]
    PairIndex(usize),
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
