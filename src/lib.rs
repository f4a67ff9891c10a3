//! # Mapgraph Library
//!
//! Turns OpenStreetMap XML extracts into a weighted planar road graph in
//! pixel space, then densifies it so that no edge is longer than a limit.
//!
//! ## Pipeline
//!
//! ```text
//! map*.osm -> extract -> nodes.txt, edges.txt
//!          -> densify -> newNodes.txt, newEdges.txt
//!          -> symmetrize (optional)
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use mapgraph::{Config, PipelinePaths};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let paths = PipelinePaths::new(vec!["map1.txt".into(), "map2.txt".into()], "out");
//!     let report = mapgraph::run_pipeline(&config, &paths, None)?;
//!     println!("{} interpolated nodes", report.densify.nodes_created);
//!     Ok(())
//! }
//! ```

use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::table;

pub use crate::core::assembler::{assemble, AssembleOptions};
pub use crate::core::config::{BoundingBox, Canvas, Config, RoadClass};
pub use crate::core::densifier::{
    DensifyOptions, DensifyStats, Densified, Densifier, IdAllocator, MAX_SEGMENTS_PER_EDGE,
};
pub use crate::core::extractor::{
    ExtractOptions, ExtractStats, Extraction, Extractor, ProgressCallback,
};
pub use crate::core::graph::{Edge, Graph, Node, NodeId, NodeTable, Point};
pub use crate::core::projector::Projector;
pub use crate::core::symmetrize::symmetrize;
pub use mapgraph_common::{Error, Result};

pub mod core;

/// Extract and assemble the graph from one or more map sources.
///
/// Sources are processed in order; a node id seen in several sources keeps
/// the coordinate from the last one.
pub fn extract<P: AsRef<Path>>(
    config: &Config,
    sources: &[P],
    progress: Option<ProgressCallback>,
) -> Result<(Graph, ExtractStats)> {
    config.validate()?;

    let total_bytes = sources
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();
    let options = ExtractOptions {
        highway_filter: config.highway_filter.clone(),
        progress,
        total_bytes,
    };

    let mut extractor = Extractor::new(Projector::new(&config.bbox, &config.canvas), options);
    for source in sources {
        extractor.process_file(source)?;
    }
    let extraction = extractor.finish();

    let graph = assemble(
        &extraction,
        &AssembleOptions {
            scale: config.scale,
            prune_isolated: config.prune_isolated,
        },
    )?;
    Ok((graph, extraction.stats))
}

/// [`extract`], then write the node and edge tables
pub fn extract_to_files<P: AsRef<Path>>(
    config: &Config,
    sources: &[P],
    nodes_out: &Path,
    edges_out: &Path,
    progress: Option<ProgressCallback>,
) -> Result<ExtractStats> {
    let (graph, stats) = extract(config, sources, progress)?;
    table::write_nodes(nodes_out, &graph.nodes)?;
    table::write_edges(edges_out, &graph.edges)?;
    info!(
        "Wrote {} nodes to {} and {} edges to {}",
        graph.nodes.len(),
        nodes_out.display(),
        graph.edges.len(),
        edges_out.display()
    );
    Ok(stats)
}

/// Densify the tables in `nodes_in`/`edges_in` into `nodes_out`/`edges_out`
pub fn densify_files(
    config: &Config,
    nodes_in: &Path,
    edges_in: &Path,
    nodes_out: &Path,
    edges_out: &Path,
) -> Result<DensifyStats> {
    config.validate()?;
    let nodes = table::read_nodes(nodes_in)?;
    let edges = table::read_edges(edges_in)?;

    let densified = crate::core::densifier::densify(config, &nodes, &edges)?;
    table::write_nodes(nodes_out, &densified.nodes)?;
    table::write_edges(edges_out, &densified.edges)?;
    Ok(densified.stats)
}

/// Write every edge of `input` and its reverse to `output`; returns the
/// number of edges written
pub fn symmetrize_file(input: &Path, output: &Path) -> Result<usize> {
    let edges = table::read_edges(input)?;
    let both = symmetrize(&edges);
    table::write_edges(output, &both)?;
    Ok(both.len())
}

/// Inputs and output locations for [`run_pipeline`]
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub sources: Vec<PathBuf>,
    pub outdir: PathBuf,
    pub symmetrize: bool,
}

impl PipelinePaths {
    pub fn new(sources: Vec<PathBuf>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            outdir: outdir.into(),
            symmetrize: false,
        }
    }

    pub fn nodes(&self) -> PathBuf {
        self.outdir.join("nodes.txt")
    }

    pub fn edges(&self) -> PathBuf {
        self.outdir.join("edges.txt")
    }

    pub fn dense_nodes(&self) -> PathBuf {
        self.outdir.join("newNodes.txt")
    }

    pub fn dense_edges(&self) -> PathBuf {
        self.outdir.join("newEdges.txt")
    }

    pub fn undirected_edges(&self) -> PathBuf {
        self.outdir.join("undirectedEdges.txt")
    }
}

/// What a full pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub extract: ExtractStats,
    pub densify: DensifyStats,
    pub files: Vec<PathBuf>,
}

/// Extract, densify and optionally symmetrize, writing every stage's tables
/// into `paths.outdir`
pub fn run_pipeline(
    config: &Config,
    paths: &PipelinePaths,
    progress: Option<ProgressCallback>,
) -> Result<PipelineReport> {
    std::fs::create_dir_all(&paths.outdir)?;

    let extract = extract_to_files(
        config,
        &paths.sources,
        &paths.nodes(),
        &paths.edges(),
        progress,
    )?;
    let densify = densify_files(
        config,
        &paths.nodes(),
        &paths.edges(),
        &paths.dense_nodes(),
        &paths.dense_edges(),
    )?;

    let mut files = vec![
        paths.nodes(),
        paths.edges(),
        paths.dense_nodes(),
        paths.dense_edges(),
    ];
    if paths.symmetrize {
        symmetrize_file(&paths.dense_edges(), &paths.undirected_edges())?;
        files.push(paths.undirected_edges());
    }

    Ok(PipelineReport {
        extract,
        densify,
        files,
    })
}
