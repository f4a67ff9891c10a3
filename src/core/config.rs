//! Run configuration
//!
//! Every constant the pipeline depends on lives here rather than in the
//! components, so one YAML file describes a map area completely.

use mapgraph_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Geographic window mapped onto the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_left: f64,
    pub lon_right: f64,
    pub lat_top: f64,
    pub lat_bottom: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            lon_left: 105.840676,
            lon_right: 105.861112,
            lat_top: 21.041218,
            lat_bottom: 21.023721,
        }
    }
}

/// Pixel canvas the bounding box is projected onto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 8500.0,
            height: 7801.0,
        }
    }
}

/// Named groups of `highway` values, for the `--road-class` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoadClass {
    Motorway,
    Primary,
    Residential,
    Footway,
}

impl RoadClass {
    pub fn highway_values(self) -> &'static [&'static str] {
        match self {
            RoadClass::Motorway => &["motorway", "motorway_link", "trunk", "trunk_link"],
            RoadClass::Primary => &[
                "primary",
                "primary_link",
                "secondary",
                "secondary_link",
                "tertiary",
                "tertiary_link",
            ],
            RoadClass::Residential => &["residential", "living_street", "unclassified", "service"],
            RoadClass::Footway => &[
                "footway",
                "pedestrian",
                "path",
                "steps",
                "bridleway",
                "cycleway",
            ],
        }
    }

    /// Expand a set of classes into the accepted `highway` values
    pub fn expand(classes: &[RoadClass]) -> Vec<String> {
        classes
            .iter()
            .flat_map(|c| c.highway_values().iter().map(|v| v.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bbox: BoundingBox,
    pub canvas: Canvas,
    /// Divisor turning pixel distances into edge weights
    pub scale: f64,
    /// Longest edge weight allowed after densification
    pub limit: f64,
    /// Slack when comparing a weight against `limit`
    pub tolerance: f64,
    /// Accepted `highway` values; empty accepts any highway
    pub highway_filter: Vec<String>,
    /// Explicit first id for interpolated nodes
    pub first_new_id: Option<u64>,
    pub reuse_reverse_chains: bool,
    pub prune_isolated: bool,
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::default(),
            canvas: Canvas::default(),
            scale: 100.0,
            limit: 0.06,
            tolerance: 1e-5,
            highway_filter: Vec::new(),
            first_new_id: None,
            reuse_reverse_chains: false,
            prune_isolated: false,
            parallel: false,
        }
    }
}

impl Config {
    /// Load a YAML config file; missing keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let bbox = &self.bbox;
        if !(bbox.lon_right > bbox.lon_left) {
            return Err(Error::InvalidConfig(format!(
                "lon_right ({}) must be greater than lon_left ({})",
                bbox.lon_right, bbox.lon_left
            )));
        }
        if !(bbox.lat_top > bbox.lat_bottom) {
            return Err(Error::InvalidConfig(format!(
                "lat_top ({}) must be greater than lat_bottom ({})",
                bbox.lat_top, bbox.lat_bottom
            )));
        }
        if !(self.canvas.width > 0.0 && self.canvas.height > 0.0) {
            return Err(Error::InvalidConfig(
                "canvas width and height must be positive".to_string(),
            ));
        }
        if !(self.scale > 0.0) || !self.scale.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !(self.limit > 0.0) || !self.limit.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}
