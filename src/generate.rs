//! Top-level entry points: listings in, brochure bytes out.
//!
//! The whole run is all-or-nothing. Every image of every listing is fetched
//! and transcoded first; only once the batch fully succeeded are the pages
//! assembled and rendered. A failed batch never reaches the renderer.

use crate::assemble::DocumentAssembler;
use crate::config::BrochureConfig;
use crate::error::BrochureError;
use crate::model::SourceItem;
use crate::orchestrator::BatchOrchestrator;
use crate::output::{BrochureOutput, BrochureStats};
use crate::pipeline::fetch::{HttpMediaFetcher, MediaFetcher};
use crate::render::{DocumentRenderer, PdfRenderer};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Generate a PDF brochure, fetching images over HTTP(S), `file://` or `data:`.
///
/// # Errors
/// - [`BrochureError::InvalidInput`] for an empty listing set or blank references
/// - [`BrochureError::BatchAbort`] when any image fails after all retries
/// - [`BrochureError::Timeout`] when the batch misses its deadline
/// - [`BrochureError::RenderFailed`] if PDF serialisation fails
///
/// # Example
/// ```rust,no_run
/// use listing_brochure::{generate, BrochureConfig, SourceItem};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let items: Vec<SourceItem> = serde_json::from_str(&std::fs::read_to_string("favorites.json")?)?;
/// let output = generate(&items, &BrochureConfig::default()).await?;
/// std::fs::write("favorites.pdf", &output.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn generate(
    items: &[SourceItem],
    config: &BrochureConfig,
) -> Result<BrochureOutput, BrochureError> {
    let fetcher = Arc::new(HttpMediaFetcher::new(config)?);
    generate_with(items, config, fetcher, &PdfRenderer::new()).await
}

/// Generate with a caller-supplied fetcher and renderer.
pub async fn generate_with(
    items: &[SourceItem],
    config: &BrochureConfig,
    fetcher: Arc<dyn MediaFetcher>,
    renderer: &dyn DocumentRenderer,
) -> Result<BrochureOutput, BrochureError> {
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    validate_items(items)?;
    info!("Generating brochure for {} listings", items.len());

    // ── Step 2: Fetch + transcode every image ────────────────────────────
    let media_start = Instant::now();
    let orchestrator = BatchOrchestrator::new(config, fetcher);
    let batch = orchestrator.run(items).await?;
    let media_duration_ms = media_start.elapsed().as_millis() as u64;
    let images = batch.image_count();

    // ── Step 3: Lay out pages ────────────────────────────────────────────
    let document = DocumentAssembler::new(config.geometry).assemble(items, batch)?;

    // ── Step 4: Render ───────────────────────────────────────────────────
    let render_start = Instant::now();
    let bytes = renderer.render(&document)?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let stats = BrochureStats {
        items: items.len(),
        images,
        retries: orchestrator.retry_count(),
        pages: document.page_count(),
        peak_in_flight: orchestrator.peak_in_flight(),
        output_bytes: bytes.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        media_duration_ms,
        render_duration_ms,
    };
    info!(
        "Brochure complete: {} pages, {} images, {} bytes, {}ms total",
        stats.pages, stats.images, stats.output_bytes, stats.total_duration_ms
    );

    Ok(BrochureOutput { bytes, stats })
}

/// Generate a brochure and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// truncated document behind.
pub async fn generate_to_file(
    items: &[SourceItem],
    output_path: impl AsRef<Path>,
    config: &BrochureConfig,
) -> Result<BrochureStats, BrochureError> {
    let output = generate(items, config).await?;
    write_atomic(output_path.as_ref(), &output.bytes).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    items: &[SourceItem],
    config: &BrochureConfig,
) -> Result<BrochureOutput, BrochureError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BrochureError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(items, config))
}

/// Parse a JSON array of listings.
pub fn parse_items(json: &str) -> Result<Vec<SourceItem>, BrochureError> {
    serde_json::from_str(json).map_err(|e| BrochureError::InvalidInput(format!("listings JSON: {e}")))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn validate_items(items: &[SourceItem]) -> Result<(), BrochureError> {
    if items.is_empty() {
        return Err(BrochureError::InvalidInput("no listings to render".into()));
    }
    for (i, item) in items.iter().enumerate() {
        let blank = item
            .cover
            .iter()
            .chain(item.gallery.iter())
            .any(|r| r.as_str().trim().is_empty());
        if blank {
            return Err(BrochureError::InvalidInput(format!(
                "listing #{} has an empty image reference",
                i + 1
            )));
        }
    }
    Ok(())
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BrochureError> {
    let write_err = |e: std::io::Error| BrochureError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
