//! Core library modules for mapgraph
//!
//! Leaves first: graph types and configuration, the projector and line
//! scanner, then the extractor, assembler, densifier and symmetrizer, and
//! finally table file I/O.

pub mod assembler;
pub mod config;
pub mod densifier;
pub mod extractor;
pub mod graph;
pub mod projector;
pub mod scanner;
pub mod symmetrize;
pub mod table;
