//! jot CLI: inspect and subdivide mesh files.
//!
//! Usage: jot <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Set `RUST_LOG=debug` to see update statistics.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use jot::algo::subdivide::{ColorRule, SubdivOptions, SubdivRule};
use jot::algo::Progress;
use jot::io;
use jot::lmesh::LoopMesh;
use jot::mesh::{Bmesh, FaceList};

#[derive(Parser)]
#[command(name = "jot")]
#[command(author, version, about = "Subdivision mesh CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,
    },

    /// Subdivide a mesh and save one level of the hierarchy
    Subdivide {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Subdivision level to write
        #[arg(short, long, default_value = "1")]
        level: usize,

        /// Position rule
        #[arg(short, long, value_enum, default_value = "loop")]
        rule: Rule,

        /// Interpolate colors linearly instead of smoothing them
        #[arg(long)]
        linear_colors: bool,

        /// Deepest level that may be allocated
        #[arg(long, default_value = "8")]
        max_level: usize,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Rule {
    /// Loop approximating rules
    Loop,
    /// Modified butterfly, interpolating
    Butterfly,
    /// Catmull-Clark on quads, Loop elsewhere
    Hybrid,
}

impl From<Rule> for SubdivRule {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Loop => SubdivRule::Loop,
            Rule::Butterfly => SubdivRule::Butterfly,
            Rule::Hybrid => SubdivRule::Hybrid,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input } => cmd_info(&input)?,
        Commands::Subdivide {
            input,
            output,
            level,
            rule,
            linear_colors,
            max_level,
            sequential,
        } => {
            let color_rule = if linear_colors { ColorRule::Linear } else { ColorRule::Smooth };
            let options = SubdivOptions::new(rule.into())
                .with_color_rule(color_rule)
                .with_max_level(max_level)
                .with_parallel(!sequential);
            cmd_subdivide(&input, &output, level, options)?;
        }
    }
    Ok(())
}

/// Progress bar on stderr, one line per level.
fn create_progress() -> Progress {
    Progress::new(|level, done, total| {
        if total == 0 {
            return;
        }
        let percent = (done * 100 / total).min(100);
        let filled = percent * 30 / 100;
        eprint!("\rlevel {} [{:<30}] {:3}%", level, "=".repeat(filled), percent);
        let _ = std::io::stderr().flush();
        if done >= total {
            eprintln!();
        }
    })
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mesh: Bmesh = io::load(input)?;
    let counts = mesh.counts();

    println!("File: {}", input.display());
    println!("Vertices: {}", counts.verts);
    println!("Edges: {}", counts.edges);
    println!("Faces: {}", counts.faces);

    let edges: Vec<_> = mesh.edge_ids().map(|e| mesh.edge(e)).collect();
    let border = edges.iter().filter(|e| e.is_border()).count();
    let creases = edges.iter().filter(|e| e.is_crease()).count();
    let weak = edges.iter().filter(|e| e.is_weak()).count();
    println!("Quads: {}", weak);
    println!("Creased edges: {}", creases);
    if border == 0 {
        println!("Topology: Closed (no border)");
    } else {
        println!("Topology: Open ({} border edges)", border);
    }

    println!("Surface area: {:.6}", mesh.surface_area());
    if let Some((min, max)) = mesh.bounding_box() {
        let diag = max - min;
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    let all = FaceList::all(&mesh);
    let components = all.components(&mesh).len();
    println!("Components: {}", components);
    println!("Manifold: {}", if all.is_2_manifold(&mesh) { "yes" } else { "no" });
    Ok(())
}

fn cmd_subdivide(
    input: &Path,
    output: &Path,
    level: usize,
    options: SubdivOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let control: Bmesh = io::load(input)?;
    println!("Loaded: {} vertices, {} faces", control.num_verts(), control.num_faces());
    info!("subdividing {} to level {} with {:?}", input.display(), level, options);

    let mut lmesh = LoopMesh::with_options(control, options);
    let start = Instant::now();
    let stats = lmesh.update_subdivision_with_progress(level, &create_progress())?;
    let elapsed = start.elapsed();
    lmesh.set_cur_level(level)?;

    let fine = lmesh.cur_mesh();
    println!(
        "Level {}: {} vertices, {} faces in {:.2?} ({} positions computed)",
        level,
        fine.num_verts(),
        fine.num_faces(),
        elapsed,
        stats.positions_updated
    );
    info!("hierarchy uses about {} KiB", lmesh.size() / 1024);

    io::save(fine, output)?;
    println!("Saved: {}", output.display());
    Ok(())
}
