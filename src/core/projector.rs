//! Linear lat/lon to pixel mapping over a fixed window

use crate::core::config::{BoundingBox, Canvas};
use crate::core::graph::Point;

/// Equirectangular projection of a bounding box onto a pixel canvas.
///
/// `x` grows eastwards from `lon_left`, `y` grows southwards from `lat_top`.
#[derive(Debug, Clone)]
pub struct Projector {
    bbox: BoundingBox,
    canvas: Canvas,
}

impl Projector {
    pub fn new(bbox: &BoundingBox, canvas: &Canvas) -> Self {
        Self {
            bbox: bbox.clone(),
            canvas: canvas.clone(),
        }
    }

    pub fn project(&self, lat: f64, lon: f64) -> Point {
        let b = &self.bbox;
        Point {
            x: (lon - b.lon_left) / (b.lon_right - b.lon_left) * self.canvas.width,
            y: (b.lat_top - lat) / (b.lat_top - b.lat_bottom) * self.canvas.height,
        }
    }

    /// True if the point lies on the canvas, edges included
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.canvas.width && p.y <= self.canvas.height
    }
}
