//! Edge densification: split every edge longer than the limit into a chain
//! of evenly spaced segments joined by interpolated nodes.

use log::{debug, info};
use mapgraph_common::{Error, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;

use crate::core::config::Config;
use crate::core::graph::{scaled_distance, Edge, Node, NodeId, NodeTable, Point};

/// Upper bound on the segments a single edge may be split into
pub const MAX_SEGMENTS_PER_EDGE: u64 = 1 << 24;

/// Hands out ids for interpolated nodes.
///
/// The counter starts above every numeric id already in the node table, so
/// fresh ids cannot collide with existing ones.
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Allocator for densifying `nodes`. An explicit `first` id is honoured
    /// only when it lies above the existing id space.
    pub fn for_nodes(nodes: &NodeTable, first: Option<u64>) -> Result<Self> {
        let max_existing = nodes.max_numeric_id().map(|m| m.max(0) as u64).unwrap_or(0);
        let floor = max_existing + 1;

        match first {
            Some(id) if id < floor => Err(Error::IdentifierCollision { id, max_existing }),
            Some(id) => Ok(Self { next: id }),
            None => Ok(Self { next: floor }),
        }
    }

    /// Reserve `count` consecutive ids
    pub fn reserve(&mut self, count: u64) -> Result<Range<u64>> {
        let start = self.next;
        let end = start
            .checked_add(count)
            .ok_or(Error::IdSpaceExhausted {
                requested: count,
                next: start,
            })?;
        self.next = end;
        Ok(start..end)
    }

    /// The id the next reservation will start at
    pub fn peek(&self) -> u64 {
        self.next
    }
}

#[derive(Debug, Clone)]
pub struct DensifyOptions {
    pub scale: f64,
    pub limit: f64,
    pub tolerance: f64,
    /// Let (v, u) reuse the interior nodes already created for (u, v)
    pub reuse_reverse_chains: bool,
    pub parallel: bool,
}

impl Default for DensifyOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DensifyOptions {
    fn from(config: &Config) -> Self {
        Self {
            scale: config.scale,
            limit: config.limit,
            tolerance: config.tolerance,
            reuse_reverse_chains: config.reuse_reverse_chains,
            parallel: config.parallel,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DensifyStats {
    pub edges_in: usize,
    pub edges_split: usize,
    pub edges_reused: usize,
    pub nodes_created: usize,
    pub edges_out: usize,
}

#[derive(Debug, Clone)]
pub struct Densified {
    pub nodes: NodeTable,
    pub edges: Vec<Edge>,
    pub stats: DensifyStats,
}

/// Interior nodes of one split edge, numbered from its `from` end
#[derive(Debug, Clone, Copy)]
struct Chain {
    from: Point,
    to: Point,
    segments: u64,
    first_id: u64,
}

impl Chain {
    fn interior(&self) -> impl Iterator<Item = (u64, Point)> + '_ {
        (1..self.segments).map(move |i| {
            let t = i as f64 / self.segments as f64;
            (self.first_id + i - 1, self.from.lerp(&self.to, t))
        })
    }
}

enum Plan {
    Keep(f64),
    Split(Chain),
    /// Walk an existing chain backwards
    Reverse(Chain),
}

pub struct Densifier {
    options: DensifyOptions,
}

impl Densifier {
    pub fn new(options: DensifyOptions) -> Result<Self> {
        if !(options.limit > 0.0) || !(options.scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "limit and scale must be positive, got limit {} and scale {}",
                options.limit, options.scale
            )));
        }
        Ok(Self { options })
    }

    /// Densify `edges` over `nodes`.
    ///
    /// Ids are reserved in edge-table order, so the output depends only on
    /// the input tables and the allocator's starting point. Every original
    /// node is kept; interpolated nodes follow them in allocation order.
    pub fn densify(
        &self,
        nodes: &NodeTable,
        edges: &[Edge],
        ids: &mut IdAllocator,
    ) -> Result<Densified> {
        let plans = self.plan(nodes, edges, ids)?;

        let pieces: Vec<Vec<Edge>> = if self.options.parallel {
            plans
                .par_iter()
                .zip(edges.par_iter())
                .map(|(plan, edge)| self.materialize(plan, edge))
                .collect()
        } else {
            plans
                .iter()
                .zip(edges)
                .map(|(plan, edge)| self.materialize(plan, edge))
                .collect()
        };

        let mut out_nodes = nodes.clone();
        let mut stats = DensifyStats {
            edges_in: edges.len(),
            ..DensifyStats::default()
        };
        for plan in &plans {
            match plan {
                Plan::Keep(_) => {}
                Plan::Split(chain) => {
                    stats.edges_split += 1;
                    for (id, point) in chain.interior() {
                        out_nodes.insert(NodeId::from(id), point);
                        stats.nodes_created += 1;
                    }
                }
                Plan::Reverse(_) => stats.edges_reused += 1,
            }
        }

        let out_edges: Vec<Edge> = pieces.into_iter().flatten().collect();
        stats.edges_out = out_edges.len();

        info!(
            "Densified {} edges: {} split, {} reused reverse chains, {} nodes created, {} edges out",
            stats.edges_in,
            stats.edges_split,
            stats.edges_reused,
            stats.nodes_created,
            stats.edges_out
        );
        Ok(Densified {
            nodes: out_nodes,
            edges: out_edges,
            stats,
        })
    }

    fn plan(
        &self,
        nodes: &NodeTable,
        edges: &[Edge],
        ids: &mut IdAllocator,
    ) -> Result<Vec<Plan>> {
        let limit = self.options.limit;
        let mut chains: HashMap<(&NodeId, &NodeId), Chain> = HashMap::new();
        let mut plans = Vec::with_capacity(edges.len());

        for edge in edges {
            let context = || format!("edge {} -> {}", edge.u, edge.v);
            let a = nodes.coordinate(&edge.u, context)?;
            let b = nodes.coordinate(&edge.v, context)?;
            let dist = scaled_distance(&a, &b, self.options.scale);

            if dist <= limit + self.options.tolerance {
                plans.push(Plan::Keep(dist));
                continue;
            }

            if self.options.reuse_reverse_chains {
                if let Some(chain) = chains.get(&(&edge.v, &edge.u)) {
                    plans.push(Plan::Reverse(*chain));
                    continue;
                }
            }

            let ratio = (dist / limit).ceil();
            if !ratio.is_finite() || ratio > MAX_SEGMENTS_PER_EDGE as f64 {
                return Err(Error::EdgeTooLong {
                    context: context(),
                    weight: dist,
                    limit,
                    max_segments: MAX_SEGMENTS_PER_EDGE,
                });
            }
            let segments = (ratio as u64).max(2);
            let reserved = ids.reserve(segments - 1)?;
            debug!(
                "Splitting {} -> {} ({dist:.4}) into {segments} segments, ids {}..{}",
                edge.u, edge.v, reserved.start, reserved.end
            );
            let chain = Chain {
                from: a,
                to: b,
                segments,
                first_id: reserved.start,
            };
            chains.entry((&edge.u, &edge.v)).or_insert(chain);
            plans.push(Plan::Split(chain));
        }

        Ok(plans)
    }

    fn materialize(&self, plan: &Plan, edge: &Edge) -> Vec<Edge> {
        let (chain, reversed) = match plan {
            Plan::Keep(weight) => return vec![Edge::new(edge.u.clone(), edge.v.clone(), *weight)],
            Plan::Split(chain) => (chain, false),
            Plan::Reverse(chain) => (chain, true),
        };

        let mut path: Vec<(NodeId, Point)> = Vec::with_capacity(chain.segments as usize + 1);
        path.push((edge.u.clone(), if reversed { chain.to } else { chain.from }));
        let interior = chain.interior().map(|(id, p)| (NodeId::from(id), p));
        if reversed {
            let mut backwards: Vec<_> = interior.collect();
            backwards.reverse();
            path.extend(backwards);
        } else {
            path.extend(interior);
        }
        path.push((edge.v.clone(), if reversed { chain.from } else { chain.to }));

        path.windows(2)
            .map(|pair| {
                let (u, p) = &pair[0];
                let (v, q) = &pair[1];
                Edge::new(u.clone(), v.clone(), scaled_distance(p, q, self.options.scale))
            })
            .collect()
    }
}

/// Convenience wrapper: allocator from the node table, options from `config`
pub fn densify(config: &Config, nodes: &NodeTable, edges: &[Edge]) -> Result<Densified> {
    let mut ids = IdAllocator::for_nodes(nodes, config.first_new_id)?;
    Densifier::new(DensifyOptions::from(config))?.densify(nodes, edges, &mut ids)
}
