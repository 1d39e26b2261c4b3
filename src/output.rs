//! Result types returned by the `generate*` entry points.

use serde::{Deserialize, Serialize};

/// A rendered brochure plus run statistics.
#[derive(Debug, Clone)]
pub struct BrochureOutput {
    /// Serialised document (PDF unless a custom renderer was used).
    pub bytes: Vec<u8>,
    pub stats: BrochureStats,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrochureStats {
    pub items: usize,
    pub images: usize,
    /// Retries across all tasks (not counting first attempts).
    pub retries: usize,
    pub pages: usize,
    /// Highest number of fetch + transcode attempts in flight at once.
    pub peak_in_flight: usize,
    pub output_bytes: usize,
    pub total_duration_ms: u64,
    pub media_duration_ms: u64,
    pub render_duration_ms: u64,
}
