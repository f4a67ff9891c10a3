//! CLI-specific progress handling for mapgraph
//!
//! Renders extraction progress (bytes of map source read) on stderr.

use indicatif::{ProgressBar, ProgressStyle};
use mapgraph::ProgressCallback;
use std::sync::Arc;

/// Creates a byte-counting progress bar for CLI display
pub fn create_progress_bar(total_size: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Progress manager for map extraction
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_size: u64, message: &str) -> Self {
        let pb = create_progress_bar(total_size);

        // Print initial message to stderr
        eprintln!("{}", message);

        Self { pb }
    }

    /// Callback feeding the bar, for the extractor
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |read, total| {
            if pb.length().unwrap_or(0) != total {
                pb.set_length(total);
            }
            pb.set_position(read);
        })
    }

    pub fn finish(&self, message: &'static str) {
        self.pb.finish_with_message(message);
    }
}
