//! Joins extractor output into the emitted node and edge tables

use log::{debug, info};
use mapgraph_common::{Error, Result};
use std::collections::HashSet;

use crate::core::extractor::Extraction;
use crate::core::graph::{scaled_distance, Edge, Graph, NodeId, NodeTable};

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub scale: f64,
    /// Drop nodes that no emitted edge touches
    pub prune_isolated: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            scale: 100.0,
            prune_isolated: false,
        }
    }
}

/// Build the graph.
///
/// Nodes are the routable ids that have a coordinate, in id order. Edges are
/// the way edges whose endpoints both survived, in endpoint-pair order,
/// weighted by scaled pixel distance.
pub fn assemble(extraction: &Extraction, options: &AssembleOptions) -> Result<Graph> {
    if !(options.scale > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "scale must be positive, got {}",
            options.scale
        )));
    }

    let mut nodes = NodeTable::new();
    for id in &extraction.valid {
        match extraction.coordinates.get(id) {
            Some(&point) => {
                nodes.insert(id.clone(), point);
            }
            None => debug!("Routable node {id} has no coordinate on the canvas, dropped"),
        }
    }

    let mut edges = Vec::with_capacity(extraction.edges.len());
    let mut dropped = 0usize;
    for way_edge in extraction.edges.values() {
        let (Some(a), Some(b)) = (nodes.get(&way_edge.from), nodes.get(&way_edge.to)) else {
            dropped += 1;
            continue;
        };
        edges.push(Edge::new(
            way_edge.from.clone(),
            way_edge.to.clone(),
            scaled_distance(&a, &b, options.scale),
        ));
    }

    if options.prune_isolated {
        let used: HashSet<&NodeId> = edges.iter().flat_map(|e| [&e.u, &e.v]).collect();
        let before = nodes.len();
        nodes.retain(|n| used.contains(&n.id));
        info!("Pruned {} isolated nodes", before - nodes.len());
    }

    info!(
        "Assembled {} nodes and {} edges ({} edges dropped for missing endpoints)",
        nodes.len(),
        edges.len(),
        dropped
    );
    Ok(Graph { nodes, edges })
}
