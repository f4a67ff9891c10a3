//! Streaming extraction of routable ways from OSM XML sources
//!
//! The extractor keeps one small state machine per source and accumulates
//! coordinates, routable node ids and way edges across all sources fed to it.

use log::{debug, info, warn};
use mapgraph_common::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::core::graph::{NodeId, Point};
use crate::core::projector::Projector;
use crate::core::scanner::{classify, LineKind};

/// Progress callback: `(bytes_read, total_bytes)` summed over all sources
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Report progress at most this often, in bytes
const PROGRESS_STRIDE: u64 = 64 * 1024;

#[derive(Default, Clone)]
pub struct ExtractOptions {
    /// Accepted `highway` values; empty accepts any way carrying the key
    pub highway_filter: Vec<String>,
    pub progress: Option<ProgressCallback>,
    /// Combined size of all sources, for progress reporting; 0 if unknown
    pub total_bytes: u64,
}

/// Counters describing what an extraction saw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub sources: usize,
    pub lines: u64,
    pub nodes: u64,
    pub nodes_outside_canvas: u64,
    pub nodes_replaced: u64,
    pub malformed: u64,
    pub ways: u64,
    pub routable_ways: u64,
    pub relations_skipped: u64,
}

/// Consecutive way members, in the order the first way listed them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WayEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Accumulated output of all processed sources
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub coordinates: HashMap<NodeId, Point>,
    pub valid: BTreeSet<NodeId>,
    /// Keyed by the unordered endpoint pair (smaller id first)
    pub edges: BTreeMap<(NodeId, NodeId), WayEdge>,
    pub stats: ExtractStats,
}

#[derive(Debug, Default)]
struct PendingWay {
    refs: Vec<NodeId>,
    routable: bool,
}

#[derive(Debug)]
enum State {
    Idle,
    InWay(PendingWay),
    /// Inside a relation block; holds the way it interrupted, if any
    InRelation(Option<PendingWay>),
}

pub struct Extractor {
    projector: Projector,
    filter: HashSet<String>,
    progress: Option<ProgressCallback>,
    total_bytes: u64,
    /// Bytes read from earlier sources
    consumed: u64,
    out: Extraction,
}

impl Extractor {
    pub fn new(projector: Projector, options: ExtractOptions) -> Self {
        Self {
            projector,
            filter: options.highway_filter.into_iter().collect(),
            progress: options.progress,
            total_bytes: options.total_bytes,
            consumed: 0,
            out: Extraction::default(),
        }
    }

    /// Process one map file. Failing to open or read it is fatal.
    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let unreadable = |source| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let total = file.metadata().map(|m| m.len()).unwrap_or(0);
        info!("Extracting {}", path.display());
        self.process_reader(BufReader::new(file), total)
            .map_err(unreadable)
    }

    /// Process one source of `total` bytes from any buffered reader.
    ///
    /// Way/relation tracking starts fresh for every source; everything else
    /// accumulates.
    pub fn process_reader<R: BufRead>(
        &mut self,
        mut reader: R,
        total: u64,
    ) -> std::io::Result<()> {
        let mut state = State::Idle;
        let mut buf = Vec::new();
        let mut read = 0u64;
        let mut reported = 0u64;
        let expected = self.total_bytes.max(self.consumed + total);

        self.out.stats.sources += 1;
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            read += n as u64;
            self.out.stats.lines += 1;

            let line = String::from_utf8_lossy(&buf);
            state = self.step(state, &line);

            if let Some(progress) = &self.progress {
                if read - reported >= PROGRESS_STRIDE {
                    progress(self.consumed + read, expected);
                    reported = read;
                }
            }
        }

        match state {
            State::Idle => {}
            State::InWay(way) => {
                warn!(
                    "Source ended inside a way ({} member refs discarded)",
                    way.refs.len()
                );
                self.out.stats.malformed += 1;
            }
            State::InRelation(held) => {
                warn!("Source ended inside a relation");
                if let Some(way) = held {
                    warn!(
                        "Source ended inside a way ({} member refs discarded)",
                        way.refs.len()
                    );
                    self.out.stats.malformed += 1;
                }
            }
        }
        self.consumed += read;
        if let Some(progress) = &self.progress {
            progress(self.consumed, expected.max(self.consumed));
        }
        Ok(())
    }

    fn step(&mut self, state: State, line: &str) -> State {
        let kind = classify(line);

        if let State::InRelation(held) = state {
            return match (kind, held) {
                (LineKind::RelationEnd, Some(way)) => State::InWay(way),
                (LineKind::RelationEnd, None) => State::Idle,
                (_, held) => State::InRelation(held),
            };
        }

        match (state, kind) {
            (state, LineKind::Node(attrs)) => {
                self.out.stats.nodes += 1;
                let point = self.projector.project(attrs.lat, attrs.lon);
                if self.projector.contains(point) {
                    let id = NodeId::new(attrs.id);
                    if self.out.coordinates.insert(id, point).is_some() {
                        self.out.stats.nodes_replaced += 1;
                    }
                } else {
                    self.out.stats.nodes_outside_canvas += 1;
                }
                state
            }
            (state, LineKind::MalformedNode) => {
                debug!("Skipping malformed node line: {}", line.trim());
                self.out.stats.malformed += 1;
                state
            }
            (state, LineKind::WayStart { self_closing }) => {
                if let State::InWay(previous) = state {
                    warn!(
                        "Way opened before the previous one closed ({} member refs discarded)",
                        previous.refs.len()
                    );
                    self.out.stats.malformed += 1;
                }
                self.out.stats.ways += 1;
                if self_closing {
                    State::Idle
                } else {
                    State::InWay(PendingWay::default())
                }
            }
            (State::InWay(mut way), LineKind::MemberRef(r)) => {
                way.refs.push(NodeId::new(r));
                State::InWay(way)
            }
            (State::InWay(way), LineKind::MalformedRef) => {
                debug!("Skipping member ref without a value: {}", line.trim());
                self.out.stats.malformed += 1;
                State::InWay(way)
            }
            (State::InWay(mut way), LineKind::Tag { key: "highway", value }) => {
                if self.accepts(value) {
                    way.routable = true;
                }
                State::InWay(way)
            }
            (State::InWay(way), LineKind::WayEnd) => {
                self.finish_way(way);
                State::Idle
            }
            (state, LineKind::RelationStart { self_closing }) => {
                self.out.stats.relations_skipped += 1;
                if self_closing {
                    return state;
                }
                match state {
                    State::InWay(way) => State::InRelation(Some(way)),
                    _ => State::InRelation(None),
                }
            }
            (state, _) => state,
        }
    }

    fn accepts(&self, value: Option<&str>) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        value.is_some_and(|v| self.filter.contains(v))
    }

    fn finish_way(&mut self, way: PendingWay) {
        if !way.routable {
            return;
        }
        self.out.stats.routable_ways += 1;

        for pair in way.refs.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a == b {
                continue;
            }
            let key = if a <= b {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            self.out.edges.entry(key).or_insert_with(|| WayEdge {
                from: a.clone(),
                to: b.clone(),
            });
        }
        self.out.valid.extend(way.refs);
    }

    pub fn finish(self) -> Extraction {
        let stats = &self.out.stats;
        info!(
            "Extracted {} coordinates, {} routable ways of {}, {} way edges ({} malformed elements skipped)",
            self.out.coordinates.len(),
            stats.routable_ways,
            stats.ways,
            self.out.edges.len(),
            stats.malformed
        );
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BoundingBox, Canvas};

    fn projector() -> Projector {
        Projector::new(
            &BoundingBox {
                lon_left: 0.0,
                lon_right: 1.0,
                lat_top: 1.0,
                lat_bottom: 0.0,
            },
            &Canvas {
                width: 100.0,
                height: 100.0,
            },
        )
    }

    fn extract(sources: &[&str], filter: &[&str]) -> Extraction {
        let options = ExtractOptions {
            highway_filter: filter.iter().map(|s| s.to_string()).collect(),
            ..ExtractOptions::default()
        };
        let mut extractor = Extractor::new(projector(), options);
        for source in sources {
            extractor
                .process_reader(source.as_bytes(), source.len() as u64)
                .unwrap();
        }
        extractor.finish()
    }

    fn edge_keys(extraction: &Extraction) -> Vec<(String, String)> {
        extraction
            .edges
            .values()
            .map(|e| (e.from.to_string(), e.to.to_string()))
            .collect()
    }

    const NODES: &str = r#"<osm>
  <node id="1" lat="0.5" lon="0.1"/>
  <node id="2" lat="0.5" lon="0.2"/>
  <node id="3" lat="0.5" lon="0.3"/>
"#;

    #[test]
    fn test_routable_way_yields_edges_and_valid_ids() {
        let src = format!(
            "{NODES}  <way id=\"10\">\n    <nd ref=\"1\"/>\n    <nd ref=\"2\"/>\n    <nd ref=\"3\"/>\n    <tag k=\"highway\" v=\"primary\"/>\n  </way>\n</osm>\n"
        );
        let out = extract(&[&src], &[]);

        assert_eq!(out.coordinates.len(), 3);
        assert_eq!(out.valid.len(), 3);
        assert_eq!(
            edge_keys(&out),
            vec![("1".into(), "2".into()), ("2".into(), "3".into())]
        );
        assert_eq!(out.stats.routable_ways, 1);
    }

    #[test]
    fn test_repeated_refs_do_not_make_self_loops() {
        let src = "<way id=\"1\">\n<nd ref=\"A\"/>\n<nd ref=\"A\"/>\n<nd ref=\"B\"/>\n<tag k=\"highway\" v=\"service\"/>\n</way>\n";
        let out = extract(&[src], &[]);
        assert_eq!(edge_keys(&out), vec![("A".into(), "B".into())]);
    }

    #[test]
    fn test_reverse_duplicate_collapses() {
        let src = "<way id=\"1\">\n<nd ref=\"5\"/>\n<nd ref=\"6\"/>\n<tag k=\"highway\" v=\"x\"/>\n</way>\n\
                   <way id=\"2\">\n<nd ref=\"6\"/>\n<nd ref=\"5\"/>\n<tag k=\"highway\" v=\"x\"/>\n</way>\n";
        let out = extract(&[src], &[]);
        assert_eq!(edge_keys(&out), vec![("5".into(), "6".into())]);
    }

    #[test]
    fn test_non_highway_way_is_ignored() {
        let src = "<way id=\"1\">\n<nd ref=\"1\"/>\n<nd ref=\"2\"/>\n<tag k=\"building\" v=\"yes\"/>\n</way>\n";
        let out = extract(&[src], &[]);
        assert!(out.edges.is_empty());
        assert!(out.valid.is_empty());
        assert_eq!(out.stats.ways, 1);
    }

    #[test]
    fn test_highway_flag_is_sticky() {
        let src = "<way id=\"1\">\n<tag k=\"highway\" v=\"x\"/>\n<nd ref=\"1\"/>\n<tag k=\"name\" v=\"Main\"/>\n<nd ref=\"2\"/>\n</way>\n";
        let out = extract(&[src], &[]);
        assert_eq!(out.edges.len(), 1);
    }

    #[test]
    fn test_highway_filter() {
        let src = "<way id=\"1\">\n<nd ref=\"1\"/>\n<nd ref=\"2\"/>\n<tag k=\"highway\" v=\"footway\"/>\n</way>\n\
                   <way id=\"2\">\n<nd ref=\"3\"/>\n<nd ref=\"4\"/>\n<tag k=\"highway\" v=\"primary\"/>\n</way>\n";
        let out = extract(&[src], &["primary"]);
        assert_eq!(edge_keys(&out), vec![("3".into(), "4".into())]);
        assert_eq!(out.stats.routable_ways, 1);
    }

    #[test]
    fn test_relation_contents_are_skipped() {
        let src = "<relation id=\"1\">\n<node id=\"99\" lat=\"0.5\" lon=\"0.5\"/>\n<way id=\"3\">\n<nd ref=\"1\"/>\n<nd ref=\"2\"/>\n<tag k=\"highway\" v=\"x\"/>\n</way>\n</relation>\n<node id=\"7\" lat=\"0.5\" lon=\"0.5\"/>\n";
        let out = extract(&[src], &[]);
        assert!(out.edges.is_empty());
        assert!(!out.coordinates.contains_key(&NodeId::from("99")));
        assert!(out.coordinates.contains_key(&NodeId::from("7")));
        assert_eq!(out.stats.relations_skipped, 1);
    }

    #[test]
    fn test_way_resumes_after_relation_block() {
        let src = format!(
            "{NODES}<way id=\"9\">\n<nd ref=\"1\"/>\n<relation id=\"5\">\n<nd ref=\"3\"/>\n</relation>\n<nd ref=\"2\"/>\n<tag k=\"highway\"/>\n</way>\n"
        );
        let out = extract(&[&src], &[]);
        assert_eq!(edge_keys(&out), vec![("1".into(), "2".into())]);
        assert!(out.valid.contains(&NodeId::from("1")));
        assert!(!out.valid.contains(&NodeId::from("3")));
        assert_eq!(out.stats.relations_skipped, 1);
        assert_eq!(out.stats.routable_ways, 1);
    }

    #[test]
    fn test_self_closing_relation_inside_way_keeps_it_open() {
        let src = format!(
            "{NODES}<way id=\"9\">\n<nd ref=\"1\"/>\n<relation id=\"5\"/>\n<nd ref=\"2\"/>\n<tag k=\"highway\" v=\"primary\"/>\n</way>\n"
        );
        let out = extract(&[&src], &[]);
        assert_eq!(edge_keys(&out), vec![("1".into(), "2".into())]);
    }

    #[test]
    fn test_self_closing_relation_does_not_swallow_input() {
        let src = "<relation id=\"1\"/>\n<node id=\"7\" lat=\"0.5\" lon=\"0.5\"/>\n";
        let out = extract(&[src], &[]);
        assert!(out.coordinates.contains_key(&NodeId::from("7")));
    }

    #[test]
    fn test_node_outside_canvas_is_dropped() {
        let src = "<node id=\"1\" lat=\"1.5\" lon=\"0.5\"/>\n<node id=\"2\" lat=\"0.5\" lon=\"0.5\"/>\n";
        let out = extract(&[src], &[]);
        assert_eq!(out.coordinates.len(), 1);
        assert_eq!(out.stats.nodes_outside_canvas, 1);
    }

    #[test]
    fn test_malformed_lines_are_counted_not_fatal() {
        let src = "<node id=\"1\" lat=\"0.5\"/>\n<way id=\"1\">\n<nd/>\n<nd ref=\"2\"/>\n<nd ref=\"3\"/>\n<tag k=\"highway\" v=\"x\"/>\n</way>\n";
        let out = extract(&[src], &[]);
        assert_eq!(out.stats.malformed, 2);
        assert_eq!(edge_keys(&out), vec![("2".into(), "3".into())]);
    }

    #[test]
    fn test_sources_accumulate_and_last_write_wins() {
        let first = "<node id=\"1\" lat=\"0.5\" lon=\"0.1\"/>\n<way id=\"1\">\n<nd ref=\"1\"/>\n";
        let second = "<node id=\"1\" lat=\"0.5\" lon=\"0.9\"/>\n</way>\n";
        let out = extract(&[first, second], &[]);

        let p = out.coordinates[&NodeId::from("1")];
        assert!((p.x - 90.0).abs() < 1e-9);
        assert_eq!(out.stats.nodes_replaced, 1);
        assert_eq!(out.stats.sources, 2);
        // the way left open in the first source is discarded
        assert!(out.valid.is_empty());
    }

    #[test]
    fn test_missing_file_is_source_unreadable() {
        let mut extractor = Extractor::new(projector(), ExtractOptions::default());
        let err = extractor
            .process_file("/nonexistent/map1.txt")
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { .. }));
    }

    #[test]
    fn test_progress_reports_completion() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let options = ExtractOptions {
            progress: Some(Arc::new(move |read, _total| {
                sink.store(read, Ordering::SeqCst);
            })),
            ..ExtractOptions::default()
        };
        let mut extractor = Extractor::new(projector(), options);
        for _ in 0..2 {
            extractor
                .process_reader(NODES.as_bytes(), NODES.len() as u64)
                .unwrap();
        }
        // progress is cumulative across sources
        assert_eq!(seen.load(Ordering::SeqCst), 2 * NODES.len() as u64);
    }
}
