//! G-code parsing and re-synthesis.
//!
//! This module provides the textual side of the deformation pipeline:
//! - [`interpreter`] - parses raw G-code into a layer-segmented toolpath
//! - [`resynth`] - re-walks the original text and emits deformed G-code
//!
//! Both passes share the same line lexer and the same absolute-position
//! [`MotionState`] machine, so a command is interpreted identically whether
//! it is being turned into geometry or rewritten.

pub mod interpreter;
pub mod resynth;

pub use interpreter::{parse, Layer, Toolpath};
pub use resynth::resynthesize;

/// Running machine state of a G-code walk.
///
/// All coordinates are absolute; relative input words are folded into
/// absolute values as they are consumed. One live instance exists per
/// parse pass (the re-synthesizer keeps a second one for the deformed
/// trajectory).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    /// Absolute X position (mm).
    pub x: f64,
    /// Absolute Y position (mm).
    pub y: f64,
    /// Absolute Z position (mm).
    pub z: f64,
    /// Absolute extruder position (mm of filament).
    pub e: f64,
    /// Feedrate (mm/min).
    pub f: f64,
    /// Whether the last accepted move extruded material.
    pub extruding: bool,
    /// Whether G91 relative positioning is active.
    pub relative: bool,
}

impl MotionState {
    /// Initial state at the machine origin, absolute mode.
    pub fn new() -> Self {
        MotionState {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e: 0.0,
            f: 0.0,
            extruding: false,
            relative: false,
        }
    }

    /// Resolve an axis word to an absolute value under the current
    /// positioning mode.
    #[inline]
    pub fn absolute(&self, current: f64, word: f64) -> f64 {
        if self.relative {
            current + word
        } else {
            word
        }
    }

    /// Build the target state of a `G0`/`G1` move from its argument words.
    /// Axes without a word keep their current value.
    pub fn target(&self, args: &ArgSet) -> MotionState {
        MotionState {
            x: args.x.map_or(self.x, |v| self.absolute(self.x, v)),
            y: args.y.map_or(self.y, |v| self.absolute(self.y, v)),
            z: args.z.map_or(self.z, |v| self.absolute(self.z, v)),
            e: args.e.map_or(self.e, |v| self.absolute(self.e, v)),
            f: args.f.map_or(self.f, |v| self.absolute(self.f, v)),
            extruding: self.extruding,
            relative: self.relative,
        }
    }

    /// Apply a `G92` set-position command. Only the axes named on the
    /// line are overwritten; no geometry is produced.
    pub fn set_position(&mut self, args: &ArgSet) {
        if let Some(v) = args.x {
            self.x = v;
        }
        if let Some(v) = args.y {
            self.y = v;
        }
        if let Some(v) = args.z {
            self.z = v;
        }
        if let Some(v) = args.e {
            self.e = v;
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Argument words of a single command line.
///
/// Only the letters the deformer cares about are kept; unknown letters
/// are dropped while lexing, as are words whose value fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArgSet {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub e: Option<f64>,
    pub f: Option<f64>,
}

/// A lexed command line: the command word plus its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command<'a> {
    /// The raw command word as written (e.g. `G1`, `g0`).
    pub word: &'a str,
    /// Parsed argument words.
    pub args: ArgSet,
}

/// Split a line at its `;` comment. Returns the code part and, if
/// present, the comment including the leading `;`.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.find(';') {
        Some(idx) => (&line[..idx], Some(&line[idx..])),
        None => (line, None),
    }
}

/// Lex the code part of a line into a [`Command`].
///
/// Returns `None` for blank lines. Tokens are whitespace-separated
/// `<letter><float>` words after the command word.
pub fn lex_command(code: &str) -> Option<Command<'_>> {
    let mut tokens = code.split_whitespace();
    let word = tokens.next()?;

    let mut args = ArgSet::default();
    for token in tokens {
        let mut chars = token.chars();
        let letter = match chars.next() {
            Some(c) => c.to_ascii_lowercase(),
            None => continue,
        };
        let value = match chars.as_str().parse::<f64>() {
            Ok(v) => v,
            Err(_) => continue,
        };
        match letter {
            'x' => args.x = Some(value),
            'y' => args.y = Some(value),
            'z' => args.z = Some(value),
            'e' => args.e = Some(value),
            'f' => args.f = Some(value),
            _ => {}
        }
    }

    Some(Command { word, args })
}
