//! Pathbend CLI - deform G-code toolpaths from the command line
//!
//! Usage:
//!   pathbend-cli info <input.gcode>
//!   pathbend-cli deform <input.gcode> --points <points.json> -o <output.gcode>
//!   pathbend-cli deform <input.gcode> --points <points.json> --solve-rotation --lock-ground

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use pathbend::{load_control_pairs, parse, resynthesize, DeformSession, DeformerConfig};
use std::fs;
use std::path::PathBuf;

/// A visual G-code toolpath deformation tool
#[derive(Parser, Debug)]
#[command(name = "pathbend-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deform a G-code file with a set of control points
    Deform {
        /// Input G-code file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Control point file (JSON list of bind/control pairs)
        #[arg(short, long, value_name = "POINTS")]
        points: PathBuf,

        /// Output G-code file
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Influence fall-off exponent
        #[arg(long, default_value = "2.0")]
        falloff_exponent: f64,

        /// Suppress influence near the ground reference plane
        #[arg(long)]
        lock_ground: bool,

        /// Solve per-control-point rotations
        #[arg(long)]
        solve_rotation: bool,
    },

    /// Display information about a G-code file
    Info {
        /// Input G-code file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Deform {
            input,
            points,
            output,
            falloff_exponent,
            lock_ground,
            solve_rotation,
        } => cmd_deform(
            input,
            points,
            output,
            falloff_exponent,
            lock_ground,
            solve_rotation,
        ),
        Commands::Info { input } => cmd_info(input),
    }
}

fn cmd_deform(
    input: PathBuf,
    points: PathBuf,
    output: Option<PathBuf>,
    falloff_exponent: f64,
    lock_ground: bool,
    solve_rotation: bool,
) -> Result<()> {
    info!("Loading G-code file: {}", input.display());

    let output_path = output.unwrap_or_else(|| input.with_extension("deformed.gcode"));

    if falloff_exponent <= 0.0 {
        warn!(
            "Fall-off exponent {} is not positive; weights will not decay with distance",
            falloff_exponent
        );
    }

    // Create progress bar
    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    progress.set_message("Parsing G-code...");
    progress.set_position(10);

    let text = fs::read_to_string(&input).context("Failed to read G-code file")?;
    let toolpath = parse(&text);

    info!("Toolpath loaded:");
    info!("  Layers: {}", toolpath.layer_count());
    info!("  Segments: {}", toolpath.segment_count());

    progress.set_message("Loading control points...");
    progress.set_position(30);

    let pairs = load_control_pairs(&points).context("Failed to load control point file")?;
    if pairs.is_empty() {
        warn!("Control point file contains no pairs; output will match the input geometry");
    }
    info!("  Control pairs: {}", pairs.len());

    progress.set_message("Computing deformation...");
    progress.set_position(50);

    let config = DeformerConfig {
        lock_to_ground: lock_ground,
        falloff_exponent,
        solve_rotation,
    };
    let mut session = DeformSession::new(toolpath.rest_positions(), config);
    session.set_pairs(pairs);

    progress.set_message("Re-synthesizing G-code...");
    progress.set_position(70);

    let deformed = resynthesize(&text, &session);

    progress.set_message("Writing output...");
    progress.set_position(90);

    fs::write(&output_path, deformed).context("Failed to write output file")?;

    progress.finish_with_message("Done");
    println!("Deformed G-code written to {}", output_path.display());

    Ok(())
}

fn cmd_info(input: PathBuf) -> Result<()> {
    let text = fs::read_to_string(&input).context("Failed to read G-code file")?;
    let toolpath = parse(&text);

    println!("G-code file: {}", input.display());
    println!("  Lines: {}", text.lines().count());
    println!("  Layers: {}", toolpath.layer_count());
    println!("  Segments: {}", toolpath.segment_count());
    println!("  Vertices: {}", toolpath.vertex_count());

    if let Some((min, max)) = toolpath.bounding_box() {
        println!(
            "  Bounding box: ({:.2}, {:.2}, {:.2}) - ({:.2}, {:.2}, {:.2})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }

    for (i, layer) in toolpath.layers.iter().enumerate() {
        info!(
            "  Layer {}: z={:.2}, {} extrusion segments, {} travel segments",
            i,
            layer.z,
            layer.extrusion_vertices.len() / 2,
            layer.travel_vertices.len() / 2
        );
    }

    Ok(())
}
