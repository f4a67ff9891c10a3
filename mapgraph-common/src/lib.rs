//! Common utilities for the mapgraph toolkit

pub mod error;

pub use error::{Error, Result};
