//! Error types for the mapgraph toolkit
//!
//! Structural failures (unreadable sources, dangling references, id
//! collisions, broken table files) abort a run. Malformed elements inside a
//! map source are not errors: the extractor skips and counts them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mapgraph operations
#[derive(Debug, Error)]
pub enum Error {
    /// A configured map source could not be opened or read
    #[error("Cannot read map source {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An edge or interpolation path names a node without a known coordinate
    #[error("Node '{id}' has no coordinate (referenced by {context})")]
    DanglingReference { id: String, context: String },

    /// A requested interior node id would overlap the existing id space
    #[error("Interior node id {id} collides with an existing node id; choose a value above {max_existing}")]
    IdentifierCollision { id: u64, max_existing: u64 },

    /// An edge would need more interior nodes than one edge may receive
    #[error("Edge {context} has weight {weight}, which needs more than {max_segments} segments at limit {limit}")]
    EdgeTooLong {
        context: String,
        weight: f64,
        limit: f64,
        max_segments: u64,
    },

    /// The interior id counter ran past the end of the id space
    #[error("Cannot reserve {requested} interior node ids starting at {next}")]
    IdSpaceExhausted { requested: u64, next: u64 },

    /// A node or edge table file contains a line that does not parse
    #[error("{}:{line}: {reason}", path.display())]
    MalformedTable {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV table error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file could not be parsed
    #[error("Config file error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Convenience result type for mapgraph operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unreadable_keeps_io_source() {
        use std::error::Error as _;

        let err = Error::SourceUnreadable {
            path: PathBuf::from("map1.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "Cannot read map source map1.txt: gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_identifier_collision_message() {
        let err = Error::IdentifierCollision {
            id: 5,
            max_existing: 10,
        };
        assert!(err.to_string().contains("above 10"));
    }

    #[test]
    fn test_malformed_table_location() {
        let err = Error::MalformedTable {
            path: PathBuf::from("nodes.txt"),
            line: 3,
            reason: "expected 3 fields".to_string(),
        };
        assert_eq!(err.to_string(), "nodes.txt:3: expected 3 fields");
    }

    #[test]
    fn test_edge_too_long_names_the_edge() {
        let err = Error::EdgeTooLong {
            context: "edge 1 -> 2".to_string(),
            weight: 1e23,
            limit: 0.06,
            max_segments: 16,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Edge edge 1 -> 2 has weight"));
        assert!(msg.contains("more than 16 segments"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
