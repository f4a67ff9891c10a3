//! Node and edge tables shared by every pipeline stage

use mapgraph_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Opaque node identifier as it appears in the map source.
///
/// OSM ids are integers, but sources are only trusted to give us a token, so
/// the original text is kept. Ordering puts numeric ids first in numeric
/// order, then everything else lexicographically, which keeps written tables
/// stable and readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer value of the id, if it is one
    pub fn numeric(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pixel-space coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point at fraction `t` of the way from `self` to `other`
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + t * (other.x - self.x),
            y: self.y + t * (other.y - self.y),
        }
    }
}

/// Pixel distance divided by the scale divisor, i.e. the stored edge weight
pub fn scaled_distance(a: &Point, b: &Point, scale: f64) -> f64 {
    a.distance(b) / scale
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub point: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub u: NodeId,
    pub v: NodeId,
    pub weight: f64,
}

impl Edge {
    pub fn new(u: NodeId, v: NodeId, weight: f64) -> Self {
        Self { u, v, weight }
    }

    /// Same edge with endpoints swapped
    pub fn reversed(&self) -> Edge {
        Edge {
            u: self.v.clone(),
            v: self.u.clone(),
            weight: self.weight,
        }
    }
}

/// Ordered node table with id lookup.
///
/// Insertion order is preserved and is the order nodes are written in.
/// Re-inserting an id replaces its coordinate in place.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the previous coordinate for that id if any
    pub fn insert(&mut self, id: NodeId, point: Point) -> Option<Point> {
        match self.index.get(&id) {
            Some(&slot) => Some(std::mem::replace(&mut self.nodes[slot].point, point)),
            None => {
                self.index.insert(id.clone(), self.nodes.len());
                self.nodes.push(Node { id, point });
                None
            }
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<Point> {
        self.index.get(id).map(|&slot| self.nodes[slot].point)
    }

    /// Coordinate of `id`, or `DanglingReference` naming what asked for it
    pub fn coordinate<F>(&self, id: &NodeId, context: F) -> Result<Point>
    where
        F: FnOnce() -> String,
    {
        self.get(id).ok_or_else(|| Error::DanglingReference {
            id: id.to_string(),
            context: context(),
        })
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Largest id that parses as an integer
    pub fn max_numeric_id(&self) -> Option<i64> {
        self.nodes.iter().filter_map(|n| n.id.numeric()).max()
    }

    /// Keep only nodes for which `keep` returns true, preserving order
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Node) -> bool,
    {
        self.nodes.retain(|n| keep(n));
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, n)| (n.id.clone(), slot))
            .collect();
    }
}

impl FromIterator<Node> for NodeTable {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut table = NodeTable::new();
        for node in iter {
            table.insert(node.id, node.point);
        }
        table
    }
}

/// A node table together with the edges between its nodes
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: NodeTable,
    pub edges: Vec<Edge>,
}
