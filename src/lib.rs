//! # listing-brochure
//!
//! Turn a list of favorite property listings into a printable PDF brochure.
//!
//! Every listing becomes exactly two A4 pages: its cover photo above a 3×3
//! gallery grid, then its title and pre-formatted fields in three columns.
//! Images are fetched, downscaled and re-encoded as bounded-size JPEGs
//! before layout, so a brochure of fifty listings stays a few megabytes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [SourceItem]
//!  │
//!  ├─ 1. Fetch      HTTP(S) / file:// / data: bytes per image       (async I/O)
//!  ├─ 2. Transcode  decode → downscale → JPEG       (spawn_blocking)
//!  │                ↑ both under retry (3 attempts, 300/600 ms backoff),
//!  │                  a per-listing pool of 3, and a batch-wide limiter
//!  ├─ 3. Layout     cover height, grid cell, field columns
//!  ├─ 4. Assemble   two pages per listing, in input order
//!  └─ 5. Render     lopdf → PDF bytes
//! ```
//!
//! Steps 1–2 are all-or-nothing: if any image of any listing still fails
//! after its retries, or the batch exceeds its deadline, the run fails and
//! nothing is rendered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use listing_brochure::{generate_to_file, parse_items, BrochureConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let items = parse_items(&std::fs::read_to_string("favorites.json")?)?;
//!     let config = BrochureConfig::builder().deadline_secs(90).build()?;
//!     let stats = generate_to_file(&items, "favorites.pdf", &config).await?;
//!     eprintln!("{} pages, {} images", stats.pages, stats.images);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `brochure` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! listing-brochure = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod generate;
pub mod layout;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{Document, DocumentAssembler};
pub use config::{BrochureConfig, BrochureConfigBuilder, RetryPolicy, TranscodePreset};
pub use error::{AbortReason, BrochureError, MediaError};
pub use generate::{generate, generate_sync, generate_to_file, generate_with, parse_items};
pub use layout::PageGeometry;
pub use model::{
    BatchResult, DisplayField, EncodedImage, ItemResult, MediaReference, SourceItem, TaskResult,
    MAX_GALLERY_IMAGES,
};
pub use orchestrator::BatchOrchestrator;
pub use output::{BrochureOutput, BrochureStats};
pub use pipeline::fetch::{HttpMediaFetcher, MediaFetcher};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{DocumentRenderer, PdfRenderer};
