//! Undirected adjacency from a directed edge table

use crate::core::graph::Edge;

/// Every edge followed by its reverse, same weight, no deduplication
pub fn symmetrize(edges: &[Edge]) -> Vec<Edge> {
    edges
        .iter()
        .flat_map(|e| [e.clone(), e.reversed()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_edge_count() {
        let edges = vec![
            Edge::new("1".into(), "2".into(), 0.05),
            Edge::new("2".into(), "3".into(), 0.01),
            Edge::new("1".into(), "2".into(), 0.05),
        ];
        let out = symmetrize(&edges);
        assert_eq!(out.len(), 2 * edges.len());
    }

    #[test]
    fn test_each_edge_and_its_reverse_appear() {
        let edges = vec![
            Edge::new("a".into(), "b".into(), 1.5),
            Edge::new("b".into(), "c".into(), 0.5),
        ];
        let out = symmetrize(&edges);
        for e in &edges {
            assert_eq!(out.iter().filter(|o| *o == e).count(), 1);
            assert_eq!(out.iter().filter(|o| **o == e.reversed()).count(), 1);
        }
        assert_eq!(out[1], Edge::new("b".into(), "a".into(), 1.5));
    }
}
