//! G-code interpreter: text to layer-segmented line geometry.
//!
//! Supported commands are `G0`/`G1` (linear move), `G90`/`G91`
//! (absolute/relative positioning) and `G92` (set position, no geometry).
//! Everything else, including `G2`/`G3` arcs, is silently skipped.
//!
//! Layer changes are inferred from extrusion behavior, not from Z alone:
//! a new layer begins when the extruder advances at a Z different from
//! the current layer's Z. A Z change without extrusion never closes a
//! layer; the heuristic tolerates Z-hop travel moves that way.

use crate::gcode::{lex_command, split_comment, MotionState};
use crate::geometry::Vec3;

/// A single toolpath layer: two disjoint vertex buffers of line-segment
/// endpoints, one for extruding segments and one for travel segments.
/// Each segment contributes its two endpoints consecutively.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Z height the layer was opened at.
    pub z: f64,
    /// Segment endpoints of extruding moves, in command order.
    pub extrusion_vertices: Vec<Vec3>,
    /// Segment endpoints of travel moves, in command order.
    pub travel_vertices: Vec<Vec3>,
}

impl Layer {
    fn new(z: f64) -> Self {
        Layer {
            z,
            extrusion_vertices: Vec::new(),
            travel_vertices: Vec::new(),
        }
    }
}

/// Layer-segmented line geometry of a parsed G-code file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Toolpath {
    /// Layers in file order.
    pub layers: Vec<Layer>,
}

impl Toolpath {
    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Total number of line segments (extruding + travel).
    pub fn segment_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| (l.extrusion_vertices.len() + l.travel_vertices.len()) / 2)
            .sum()
    }

    /// Total number of vertices across all buffers.
    pub fn vertex_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.extrusion_vertices.len() + l.travel_vertices.len())
            .sum()
    }

    /// Rest-pose vertex buffer: all extruding segment endpoints across
    /// layers, followed by all travel endpoints across layers.
    ///
    /// This ordering is the stable join key between the geometry and the
    /// weight/displacement buffers and must not change for the lifetime
    /// of a loaded toolpath.
    pub fn rest_positions(&self) -> Vec<Vec3> {
        let mut positions = Vec::with_capacity(self.vertex_count());
        for layer in &self.layers {
            positions.extend_from_slice(&layer.extrusion_vertices);
        }
        for layer in &self.layers {
            positions.extend_from_slice(&layer.travel_vertices);
        }
        positions
    }

    /// Axis-aligned bounding box of all vertices, or `None` for an
    /// empty toolpath.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let mut min = Vec3::repeat(f64::INFINITY);
        let mut max = Vec3::repeat(f64::NEG_INFINITY);
        let mut any = false;
        for layer in &self.layers {
            for v in layer
                .extrusion_vertices
                .iter()
                .chain(layer.travel_vertices.iter())
            {
                min = min.inf(v);
                max = max.sup(v);
                any = true;
            }
        }
        any.then_some((min, max))
    }
}

/// Parse G-code text into a layer-segmented [`Toolpath`].
///
/// Malformed or unsupported lines are dropped from the geometry model
/// without error.
pub fn parse(text: &str) -> Toolpath {
    let mut interpreter = Interpreter::new();
    for line in text.lines() {
        interpreter.process_line(line);
    }
    let toolpath = interpreter.finish();
    log::debug!(
        "parsed {} layers, {} segments",
        toolpath.layer_count(),
        toolpath.segment_count()
    );
    toolpath
}

/// Absolute-position state machine that accumulates layer geometry.
struct Interpreter {
    state: MotionState,
    layers: Vec<Layer>,
}

impl Interpreter {
    fn new() -> Self {
        Interpreter {
            state: MotionState::new(),
            layers: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &str) {
        let (code, _comment) = split_comment(line);
        let cmd = match lex_command(code) {
            Some(cmd) => cmd,
            None => return,
        };

        match cmd.word.to_ascii_uppercase().as_str() {
            "G0" | "G1" => {
                let target = self.state.target(&cmd.args);

                // Extrusion delta in absolute terms decides both the
                // segment bucket and layer detection.
                let extrusion_delta = target.e - self.state.e;
                self.state.extruding = extrusion_delta > 0.0;
                if self.state.extruding
                    && (self.layers.is_empty() || target.z != self.current_z())
                {
                    self.layers.push(Layer::new(target.z));
                }

                self.add_segment(
                    Vec3::new(self.state.x, self.state.y, self.state.z),
                    Vec3::new(target.x, target.y, target.z),
                );
                self.state = target;
            }
            "G90" => self.state.relative = false,
            "G91" => self.state.relative = true,
            "G92" => self.state.set_position(&cmd.args),
            // G2/G3 arcs and all other commands: no geometry.
            _ => {}
        }
    }

    fn current_z(&self) -> f64 {
        self.layers.last().map(|l| l.z).unwrap_or(f64::NAN)
    }

    fn add_segment(&mut self, p1: Vec3, p2: Vec3) {
        if self.layers.is_empty() {
            self.layers.push(Layer::new(p1.z));
        }
        let layer = self.layers.last_mut().unwrap();
        if self.state.extruding {
            layer.extrusion_vertices.push(p1);
            layer.extrusion_vertices.push(p2);
        } else {
            layer.travel_vertices.push(p1);
            layer.travel_vertices.push(p2);
        }
    }

    fn finish(self) -> Toolpath {
        Toolpath {
            layers: self.layers,
        }
    }
}
