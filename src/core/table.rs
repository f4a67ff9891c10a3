//! Node and edge table files
//!
//! The text format is one record per line, whitespace separated:
//! `<id> <x> <y>` for nodes and `<u> <v> <weight>` for edges, numbers with
//! four fractional digits. Paths ending in `.csv` use CSV with a header row
//! instead.

use log::warn;
use mapgraph_common::{Error, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::graph::{Edge, NodeId, NodeTable, Point};

const NODE_HEADER: [&str; 3] = ["node_id", "x", "y"];
const EDGE_HEADER: [&str; 3] = ["u", "v", "weight"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Text,
    Csv,
}

impl TableFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TableFormat::Csv,
            _ => TableFormat::Text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    node_id: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct EdgeRecord {
    u: String,
    v: String,
    weight: f64,
}

pub fn read_nodes<P: AsRef<Path>>(path: P) -> Result<NodeTable> {
    let path = path.as_ref();
    let mut table = NodeTable::new();
    let mut add = |id: String, point: Point| {
        let id = NodeId::new(id);
        if table.insert(id.clone(), point).is_some() {
            warn!("Node {id} listed twice in {}, keeping the last", path.display());
        }
    };

    match TableFormat::for_path(path) {
        TableFormat::Text => {
            for_each_record(path, |fields| {
                let x = parse_number(fields[1], "x")?;
                let y = parse_number(fields[2], "y")?;
                add(fields[0].to_string(), Point::new(x, y));
                Ok(())
            })?;
        }
        TableFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)?;
            for record in reader.deserialize() {
                let record: NodeRecord = record?;
                add(record.node_id, Point::new(record.x, record.y));
            }
        }
    }
    Ok(table)
}

pub fn read_edges<P: AsRef<Path>>(path: P) -> Result<Vec<Edge>> {
    let path = path.as_ref();
    let mut edges = Vec::new();

    match TableFormat::for_path(path) {
        TableFormat::Text => {
            for_each_record(path, |fields| {
                let weight = parse_number(fields[2], "weight")?;
                edges.push(Edge::new(fields[0].into(), fields[1].into(), weight));
                Ok(())
            })?;
        }
        TableFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)?;
            for record in reader.deserialize() {
                let record: EdgeRecord = record?;
                edges.push(Edge::new(
                    NodeId::new(record.u),
                    NodeId::new(record.v),
                    record.weight,
                ));
            }
        }
    }
    Ok(edges)
}

pub fn write_nodes<P: AsRef<Path>>(path: P, nodes: &NodeTable) -> Result<()> {
    let path = path.as_ref();
    match TableFormat::for_path(path) {
        TableFormat::Text => {
            let mut w = BufWriter::new(File::create(path)?);
            for node in nodes.iter() {
                writeln!(w, "{} {:.4} {:.4}", node.id, node.point.x, node.point.y)?;
            }
            w.flush()?;
        }
        TableFormat::Csv => {
            let mut w = csv::Writer::from_path(path)?;
            w.write_record(NODE_HEADER)?;
            for node in nodes.iter() {
                w.write_record([
                    node.id.to_string(),
                    format!("{:.4}", node.point.x),
                    format!("{:.4}", node.point.y),
                ])?;
            }
            w.flush()?;
        }
    }
    Ok(())
}

pub fn write_edges<P: AsRef<Path>>(path: P, edges: &[Edge]) -> Result<()> {
    let path = path.as_ref();
    match TableFormat::for_path(path) {
        TableFormat::Text => {
            let mut w = BufWriter::new(File::create(path)?);
            for edge in edges {
                writeln!(w, "{} {} {:.4}", edge.u, edge.v, edge.weight)?;
            }
            w.flush()?;
        }
        TableFormat::Csv => {
            let mut w = csv::Writer::from_path(path)?;
            w.write_record(EDGE_HEADER)?;
            for edge in edges {
                w.write_record([
                    edge.u.to_string(),
                    edge.v.to_string(),
                    format!("{:.4}", edge.weight),
                ])?;
            }
            w.flush()?;
        }
    }
    Ok(())
}

/// Feed each non-blank line of a text table, split into exactly three fields
fn for_each_record<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&[&str]) -> std::result::Result<(), String>,
{
    let reader = BufReader::new(File::open(path)?);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let malformed = |reason: String| Error::MalformedTable {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        };
        if fields.len() != 3 {
            return Err(malformed(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        }
        f(&fields).map_err(malformed)?;
    }
    Ok(())
}

fn parse_number(field: &str, name: &str) -> std::result::Result<f64, String> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{name} is not a number: '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nodes() -> NodeTable {
        let mut nodes = NodeTable::new();
        nodes.insert("1".into(), Point::new(0.0, 1.23456));
        nodes.insert("2".into(), Point::new(10.0, 0.5));
        nodes
    }

    #[test]
    fn test_text_format_uses_four_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.txt");
        let edges_path = dir.path().join("edges.txt");

        write_nodes(&nodes_path, &sample_nodes()).unwrap();
        write_edges(&edges_path, &[Edge::new("1".into(), "2".into(), 0.1)]).unwrap();

        assert_eq!(
            std::fs::read_to_string(&nodes_path).unwrap(),
            "1 0.0000 1.2346\n2 10.0000 0.5000\n"
        );
        assert_eq!(
            std::fs::read_to_string(&edges_path).unwrap(),
            "1 2 0.1000\n"
        );
    }

    #[test]
    fn test_text_tables_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        std::fs::write(&path, "5 1.5 2.5\n\n  6\t3.0   4.0\n").unwrap();

        let nodes = read_nodes(&path).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.get(&"6".into()), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.txt");
        std::fs::write(&path, "1 2 0.1\n2 3 heavy\n").unwrap();

        match read_edges(&path).unwrap_err() {
            Error::MalformedTable { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("weight"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_wrong_field_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        std::fs::write(&path, "1 2\n").unwrap();
        assert!(matches!(
            read_nodes(&path),
            Err(Error::MalformedTable { line: 1, .. })
        ));
    }

    #[test]
    fn test_csv_tables() {
        let dir = tempfile::tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.csv");
        let edges_path = dir.path().join("edges.csv");

        write_nodes(&nodes_path, &sample_nodes()).unwrap();
        write_edges(&edges_path, &[Edge::new("1".into(), "2".into(), 0.1)]).unwrap();

        let text = std::fs::read_to_string(&nodes_path).unwrap();
        assert!(text.starts_with("node_id,x,y\n"));

        let nodes = read_nodes(&nodes_path).unwrap();
        assert_eq!(nodes.get(&"1".into()), Some(Point::new(0.0, 1.2346)));
        let edges = read_edges(&edges_path).unwrap();
        assert_eq!(edges, vec![Edge::new("1".into(), "2".into(), 0.1)]);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TableFormat::for_path(Path::new("a/nodes.CSV")), TableFormat::Csv);
        assert_eq!(TableFormat::for_path(Path::new("nodes.txt")), TableFormat::Text);
        assert_eq!(TableFormat::for_path(Path::new("nodes")), TableFormat::Text);
    }
}
