//! # Mapgraph CLI
//!
//! Command-line interface for the mapgraph library: extract a road graph
//! from OSM XML dumps, densify it, and symmetrize edge tables.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::error;
use mapgraph::{Config, RoadClass};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod cli;

/// Command-line interface for mapgraph
#[derive(Parser)]
#[command(name = "mapgraph")]
#[command(about = "Build densified pixel-space road graphs from OpenStreetMap XML")]
#[command(long_about = "Builds a weighted road graph from OpenStreetMap XML dumps:
  mapgraph extract map1.txt map2.txt      # -> nodes.txt, edges.txt
  mapgraph densify                        # -> newNodes.txt, newEdges.txt
  mapgraph symmetrize                     # add the reverse of every edge
  mapgraph pipeline map1.txt --outdir out # all of the above

Map window, canvas size, scale and limit come from --config (YAML).")]
#[command(version)]
struct Cli {
    /// YAML configuration file (bounding box, canvas, scale, limit, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract routable nodes and edges from OSM XML sources
    Extract {
        /// Map sources, processed in order
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Output node table
        #[arg(long, default_value = "nodes.txt")]
        nodes: PathBuf,

        /// Output edge table
        #[arg(long, default_value = "edges.txt")]
        edges: PathBuf,

        #[command(flatten)]
        tuning: ExtractTuning,

        /// Write extraction statistics as JSON
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Split edges longer than the limit by inserting interpolated nodes
    Densify {
        /// Input node table
        #[arg(long, default_value = "nodes.txt")]
        nodes: PathBuf,

        /// Input edge table
        #[arg(long, default_value = "edges.txt")]
        edges: PathBuf,

        /// Output node table
        #[arg(long, default_value = "newNodes.txt")]
        out_nodes: PathBuf,

        /// Output edge table
        #[arg(long, default_value = "newEdges.txt")]
        out_edges: PathBuf,

        #[command(flatten)]
        tuning: DensifyTuning,

        /// Write densification statistics as JSON
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Write every edge together with its reverse
    Symmetrize {
        /// Input edge table
        #[arg(long, default_value = "edges.txt")]
        edges: PathBuf,

        /// Output edge table
        #[arg(short, long, default_value = "newEdges.txt")]
        output: PathBuf,
    },

    /// Run extract, densify and optionally symmetrize in one go
    Pipeline {
        /// Map sources, processed in order
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Directory for all output tables
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,

        /// Also write undirectedEdges.txt
        #[arg(long)]
        symmetrize: bool,

        #[command(flatten)]
        extract: ExtractTuning,

        #[command(flatten)]
        densify: DensifyTuning,

        /// Write run statistics as JSON
        #[arg(long)]
        stats: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ExtractTuning {
    /// Only keep ways of these road classes (default: any highway)
    #[arg(long, value_enum, value_delimiter = ',')]
    road_class: Vec<RoadClass>,

    /// Drop nodes that no edge touches
    #[arg(long)]
    prune_isolated: bool,
}

impl ExtractTuning {
    fn apply(&self, config: &mut Config) {
        if !self.road_class.is_empty() {
            config.highway_filter = RoadClass::expand(&self.road_class);
        }
        if self.prune_isolated {
            config.prune_isolated = true;
        }
    }
}

#[derive(Args)]
struct DensifyTuning {
    /// Longest edge weight allowed after densification
    #[arg(long)]
    limit: Option<f64>,

    /// First id for interpolated nodes (must be above every existing id)
    #[arg(long)]
    first_id: Option<u64>,

    /// Reuse interpolated nodes of (u, v) for (v, u)
    #[arg(long)]
    reuse_reverse: bool,

    /// Build split chains on all cores
    #[arg(long)]
    parallel: bool,
}

impl DensifyTuning {
    fn apply(&self, config: &mut Config) {
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(first) = self.first_id {
            config.first_new_id = Some(first);
        }
        if self.reuse_reverse {
            config.reuse_reverse_chains = true;
        }
        if self.parallel {
            config.parallel = true;
        }
    }
}

fn main() {
    if let Err(e) = run() {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Extract {
            sources,
            nodes,
            edges,
            tuning,
            stats,
        } => {
            tuning.apply(&mut config);
            config.validate()?;

            let progress = extraction_progress(&sources);
            let report = mapgraph::extract_to_files(
                &config,
                &sources,
                &nodes,
                &edges,
                Some(progress.callback()),
            )?;
            progress.finish("✅ Extraction completed!");

            write_stats(stats.as_deref(), &report)?;
            print_summary(&[nodes, edges]);
        }
        Commands::Densify {
            nodes,
            edges,
            out_nodes,
            out_edges,
            tuning,
            stats,
        } => {
            tuning.apply(&mut config);
            config.validate()?;

            let report = mapgraph::densify_files(&config, &nodes, &edges, &out_nodes, &out_edges)
                .with_context(|| {
                    format!("Failed to densify {} / {}", nodes.display(), edges.display())
                })?;

            write_stats(stats.as_deref(), &report)?;
            print_summary(&[out_nodes, out_edges]);
        }
        Commands::Symmetrize { edges, output } => {
            let written = mapgraph::symmetrize_file(&edges, &output)
                .with_context(|| format!("Failed to symmetrize {}", edges.display()))?;
            log::info!("Wrote {written} edges");
            print_summary(&[output]);
        }
        Commands::Pipeline {
            sources,
            outdir,
            symmetrize,
            extract,
            densify,
            stats,
        } => {
            extract.apply(&mut config);
            densify.apply(&mut config);
            config.validate()?;

            let paths = mapgraph::PipelinePaths {
                sources,
                outdir,
                symmetrize,
            };
            let progress = extraction_progress(&paths.sources);
            let report = mapgraph::run_pipeline(&config, &paths, Some(progress.callback()))?;
            progress.finish("✅ Extraction completed!");

            write_stats(stats.as_deref(), &report)?;
            print_summary(&report.files);
        }
    }

    Ok(())
}

fn extraction_progress(sources: &[PathBuf]) -> cli::ProgressManager {
    let total = sources
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();
    cli::ProgressManager::new(total, &format!("🗺️  Reading {} map source(s)", sources.len()))
}

fn write_stats<T: Serialize>(path: Option<&Path>, stats: &T) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, stats)?;
    Ok(())
}

fn print_summary(files: &[PathBuf]) {
    println!("Done. Results written to:");
    for file in files {
        println!(" - {}", file.display());
    }
}
