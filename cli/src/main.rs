use anyhow::bail;
use clap::{Parser, Subcommand};
use groute_common::db::core::{RouteSegment, RoutingProblem};
use groute_common::db::indices::EdgeId;
use groute_common::db::parser::gr;
use groute_common::util::config::Config;
use groute_common::util::{generator, logger, visualization};
use groute_router::grid::LatticeGraph;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Routing problem file; defaults to the configured benchmark.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", default_value = "groute.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the input problem (the default).
    Route,
    /// Emit a random benchmark problem.
    Generate {
        #[arg(long, default_value = "inputs/random.gr")]
        out: String,
        #[arg(long, default_value_t = 32)]
        grid: u32,
        #[arg(long, default_value_t = 4)]
        layers: u32,
        #[arg(long, default_value_t = 200)]
        nets: usize,
        #[arg(long, default_value_t = 4)]
        pins: usize,
    },
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Route);

    match command {
        Commands::Generate {
            out,
            grid,
            layers,
            nets,
            pins,
        } => {
            if let Some(parent) = Path::new(&out).parent() {
                std::fs::create_dir_all(parent)?;
            }
            generator::generate_random_problem(&out, grid, grid, layers, nets, pins)?;
        }
        Commands::Route => {
            let input = args
                .input
                .unwrap_or_else(|| PathBuf::from(&config.input.problem_file));
            if let Err(e) = run_routing(&input, &config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn run_routing(input: &Path, config: &Config) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("input problem file missing: {}", input.display());
    }

    log::info!("Parsing problem: {}", input.display());
    let mut problem = gr::parse(input)?;

    problem.order_for_routing();

    problem
        .validate()
        .map_err(|e| anyhow::anyhow!("input validation failed: {}", e))?;
    log::info!("Data verification succeeded.");

    log::info!(
        "Building routing graph ({}x{}x{})...",
        problem.grid.x_grids,
        problem.grid.y_grids,
        problem.grid.layers
    );
    let graph = LatticeGraph::from_problem(&problem).map_err(|e| anyhow::anyhow!(e))?;

    log::info!("Starting routing: {} nets", problem.num_nets());
    let trees =
        groute_router::route(&problem, &graph, &config.router).map_err(|e| anyhow::anyhow!(e))?;

    let output = next_free_filename(&format!("{}.solution", input.display()));
    log::info!("Writing solution to {}", output);
    let file = File::create(&output)?;
    let mut writer = BufWriter::new(file);
    save_solution(&mut writer, &problem, &graph, &trees)?;
    writer.flush()?;

    if let Some(image_file) = &config.output.image_file {
        log::info!("Generating routed visualization...");
        let segments = route_segments(&problem, &graph, &trees);
        visualization::draw_routed_design(
            &problem,
            &segments,
            image_file,
            config.output.image_size,
            config.output.image_size,
        );
    }

    Ok(())
}

/// The solution goes next to the input; if a previous run left one behind,
/// a numeric suffix keeps it from being clobbered.
fn next_free_filename(base: &str) -> String {
    if !Path::new(base).exists() {
        return base.to_string();
    }
    let mut num = 0;
    loop {
        let candidate = format!("{}.{}", base, num);
        if !Path::new(&candidate).exists() {
            return candidate;
        }
        num += 1;
    }
}

/// Writes the routed trees in the solution format: per net a header line,
/// one line per edge giving the tile centers of its endpoints (layers
/// one-based), a `!` terminator, and a blank line.
fn save_solution<W: Write>(
    out: &mut W,
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    trees: &[BTreeSet<EdgeId>],
) -> std::io::Result<()> {
    for (n, tree) in trees.iter().enumerate() {
        let net = &problem.nets[n];
        writeln!(out, "{} {} {}", net.name, net.id, tree.len())?;

        for &edge in tree {
            let (a, b) = graph.nodes_of(edge);
            let pa = graph.position_of(a);
            let pb = graph.position_of(b);
            let ca = problem.center_of_tile(pa.x, pa.y);
            let cb = problem.center_of_tile(pb.x, pb.y);
            writeln!(
                out,
                "({},{},{})-({},{},{})",
                ca.x,
                ca.y,
                pa.z + 1,
                cb.x,
                cb.y,
                pb.z + 1
            )?;
        }

        writeln!(out, "!")?;
        writeln!(out)?;
    }
    Ok(())
}

/// Flattens the routed trees into physical wire segments for rendering.
fn route_segments(
    problem: &RoutingProblem,
    graph: &LatticeGraph,
    trees: &[BTreeSet<EdgeId>],
) -> Vec<Vec<RouteSegment>> {
    trees
        .iter()
        .map(|tree| {
            tree.iter()
                .map(|&edge| {
                    let (a, b) = graph.nodes_of(edge);
                    let pa = graph.position_of(a);
                    let pb = graph.position_of(b);
                    RouteSegment {
                        layer: pa.z,
                        p1: problem.center_of_tile(pa.x, pa.y),
                        p2: problem.center_of_tile(pb.x, pb.y),
                    }
                })
                .collect()
        })
        .collect()
}
