//! G-code re-synthesis: rewrite motion commands under the displacement
//! field while conserving printed material.
//!
//! The pass re-walks the original text line by line, keeping two motion
//! states: `original` tracks the undeformed trajectory exactly as the
//! interpreter would, `deformed` tracks where the rewritten commands
//! actually send the nozzle. Each accepted move deforms two samples: the
//! target point itself and a point 0.1 mm above it. From those the pass
//! derives a lateral stretch factor (deformed move length over original
//! move length) and a layer-height compression factor (deformed sample
//! spacing over 0.1), multiplies them into one extruder scalar, and
//! rewrites `E` as `previous_E + delta_E * scalar^2`. The square
//! compounds the lateral and vertical corrections into the linear term;
//! it is dimensionally unusual but reproduced as-is for compatibility
//! with the host application's output.
//!
//! Output structure matters: the line count is preserved, comment-only
//! and unsupported lines pass through verbatim, and an inline comment on
//! a rewritten line is reappended after the new command.

use crate::deform::DeformSession;
use crate::gcode::{lex_command, split_comment, MotionState};
use crate::geometry::Vec3;

/// Z offset of the "above" sample used for the layer-height
/// compression estimate.
const ABOVE_SAMPLE_OFFSET: f64 = 0.1;

/// Re-emit `text` with every absolute `G0`/`G1` move deformed through
/// the session's displacement field.
///
/// Relative-coordinate moves are explicitly unsupported and pass
/// through un-deformed; `G92` passes through while still updating both
/// motion states so later moves stay consistent.
pub fn resynthesize(text: &str, session: &DeformSession) -> String {
    let mut original = MotionState::new();
    let mut deformed = MotionState::new();
    let mut rewritten = 0usize;

    let mut output = Vec::new();
    for line in text.split('\n') {
        output.push(process_line(line, session, &mut original, &mut deformed, &mut rewritten));
    }

    log::debug!("re-synthesized {} motion lines", rewritten);
    output.join("\n")
}

fn process_line(
    line: &str,
    session: &DeformSession,
    original: &mut MotionState,
    deformed: &mut MotionState,
    rewritten: &mut usize,
) -> String {
    let (code, comment) = split_comment(line);
    let cmd = match lex_command(code) {
        Some(cmd) => cmd,
        None => return line.to_string(),
    };

    match cmd.word.to_ascii_uppercase().as_str() {
        "G0" | "G1" => {
            if original.relative {
                // Relative-coordinate deformation is unsupported: pass
                // the line through but keep both trajectories tracking
                // the raw motion.
                let target = original.target(&cmd.args);
                let delta = Vec3::new(
                    target.x - original.x,
                    target.y - original.y,
                    target.z - original.z,
                );
                deformed.x += delta.x;
                deformed.y += delta.y;
                deformed.z += delta.z;
                deformed.e += target.e - original.e;
                deformed.f = target.f;
                *original = target;
                return line.to_string();
            }

            let target = original.target(&cmd.args);
            let target_point = Vec3::new(target.x, target.y, target.z);

            // Both samples are evaluated against the pre-deformation
            // coordinates.
            let deformed_point = session.deform_point(target_point);
            let deformed_above = session
                .deform_point(target_point + Vec3::new(0.0, 0.0, ABOVE_SAMPLE_OFFSET));

            let original_length = (target_point
                - Vec3::new(original.x, original.y, original.z))
            .norm();
            let deformed_length = (deformed_point
                - Vec3::new(deformed.x, deformed.y, deformed.z))
            .norm();
            let stretch = if original_length == 0.0 {
                1.0
            } else {
                deformed_length / original_length
            };
            let compression = (deformed_point - deformed_above).norm() / ABOVE_SAMPLE_OFFSET;
            let extruder_scalar = stretch * compression;

            let extrusion_delta = target.e - original.e;
            let new_e = deformed.e + extrusion_delta * extruder_scalar * extruder_scalar;
            let new_f = target.f / extruder_scalar;

            let mut out = format!(
                "{} X{:.2} Y{:.2} Z{:.2}",
                cmd.word, deformed_point.x, deformed_point.y, deformed_point.z
            );
            if cmd.args.e.is_some() {
                out.push_str(&format!(" E{:.2}", new_e));
            }
            if cmd.args.f.is_some() {
                out.push_str(&format!(" F{:.2}", new_f));
            }
            if let Some(comment) = comment {
                out.push(' ');
                out.push_str(comment);
            }

            *original = MotionState {
                extruding: extrusion_delta > 0.0,
                ..target
            };
            deformed.x = deformed_point.x;
            deformed.y = deformed_point.y;
            deformed.z = deformed_point.z;
            deformed.e = new_e;
            deformed.f = if cmd.args.f.is_some() { new_f } else { target.f };

            *rewritten += 1;
            out
        }
        "G90" => {
            original.relative = false;
            deformed.relative = false;
            line.to_string()
        }
        "G91" => {
            original.relative = true;
            deformed.relative = true;
            line.to_string()
        }
        "G92" => {
            // Position-reset deformation is intentionally disabled; the
            // line passes through, but both states must honor the reset
            // so subsequent deltas stay meaningful.
            original.set_position(&cmd.args);
            deformed.set_position(&cmd.args);
            line.to_string()
        }
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deform::{DeformSession, DeformerConfig};
    use crate::geometry::approx_eq;

    fn translation_config() -> DeformerConfig {
        DeformerConfig {
            lock_to_ground: false,
            falloff_exponent: 2.0,
            solve_rotation: false,
        }
    }

    fn session_with_pair(bind: Vec3, control: Vec3) -> DeformSession {
        let mut session = DeformSession::new(Vec::new(), translation_config());
        session.add_pair(bind);
        session.move_control(0, control).unwrap();
        session
    }

    #[test]
    fn test_single_pair_stretch_scenario() {
        // One pair bound at (10, 0, 0) dragged to (12, 0, 0): the only
        // control point carries weight 1.0 everywhere, so the target
        // X10 lands on X12. Original move length 10, deformed move
        // length 12: stretch 1.2. The above sample displaces rigidly,
        // so compression is 1.0 and the scalar is 1.2.
        let session = session_with_pair(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 0.0, 0.0));
        let output = resynthesize("G1 X10 Y0 Z0 E1 F1200", &session);
        assert_eq!(output, "G1 X12.00 Y0.00 Z0.00 E1.44 F1000.00");
    }

    #[test]
    fn test_zero_net_displacement_round_trip() {
        // Control still on its bind: motion fields come back unchanged
        // (modulo fixed-precision formatting).
        let mut session = DeformSession::new(Vec::new(), translation_config());
        session.add_pair(Vec3::new(10.0, 0.0, 0.0));
        let output = resynthesize("G1 X10 Y0 Z0 E1 F1200", &session);
        assert_eq!(output, "G1 X10.00 Y0.00 Z0.00 E1.00 F1200.00");
    }

    #[test]
    fn test_line_count_and_comments_preserved() {
        let session = DeformSession::new(Vec::new(), translation_config());
        let input = "; generated by test\nG1 X10 E1 ; perimeter\n\nM104 S200\nG1 X20 E2";
        let output = resynthesize(input, &session);
        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "; generated by test");
        assert!(lines[1].ends_with("; perimeter"));
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "M104 S200");
    }

    #[test]
    fn test_relative_moves_pass_through() {
        let session = session_with_pair(Vec3::new(5.0, 0.0, 0.0), Vec3::new(9.0, 0.0, 0.0));
        let input = "G91\nG1 X10 E1\nG90\nG1 X20 Y0 Z0 E2";
        let output = resynthesize(input, &session);
        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines[0], "G91");
        assert_eq!(lines[1], "G1 X10 E1");
        assert_eq!(lines[2], "G90");
        // The absolute move after G90 is deformed again.
        assert!(lines[3].starts_with("G1 X24.00"));
    }

    #[test]
    fn test_g92_passes_through_and_resets_state() {
        let session = DeformSession::new(Vec::new(), translation_config());
        let input = "G1 X10 E5\nG92 E0\nG1 X20 E1";
        let output = resynthesize(input, &session);
        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines[1], "G92 E0");
        // E resumes from the reset value.
        assert!(lines[2].contains("E1.00"), "line was {}", lines[2]);
    }

    #[test]
    fn test_travel_move_keeps_axes_but_no_e() {
        let session = DeformSession::new(Vec::new(), translation_config());
        let output = resynthesize("G0 X5 Y5", &session);
        assert_eq!(output, "G0 X5.00 Y5.00 Z0.00");
    }

    #[test]
    fn test_zero_length_move_defaults_stretch() {
        // A move that goes nowhere must not divide by zero.
        let session = session_with_pair(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let output = resynthesize("G1 X0 Y0 Z0 E1", &session);
        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines.len(), 1);
        let e_word = lines[0]
            .split_whitespace()
            .find(|w| w.starts_with('E'))
            .unwrap();
        let e: f64 = e_word[1..].parse().unwrap();
        assert!(e.is_finite());
        assert!(approx_eq(e, 1.0, 1e-9), "e was {}", e);
    }

    #[test]
    fn test_extrusion_scalar_squared() {
        // Uniform translation field of (2, 0, 0). The deformed state
        // starts at the origin, so the first move stretches from length
        // 10 to 12; E must use the squared scalar.
        let session = session_with_pair(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 0.0, 0.0));
        let output = resynthesize("G1 X10 Y0 Z0 E1 F1200", &session);
        let e_word = output
            .split_whitespace()
            .find(|w| w.starts_with('E'))
            .unwrap();
        let e: f64 = e_word[1..].parse().unwrap();
        // stretch 1.2, compression 1.0 -> E = 1.0 * 1.2^2
        assert!(approx_eq(e, 1.44, 1e-9), "e was {}", e);
    }
}
