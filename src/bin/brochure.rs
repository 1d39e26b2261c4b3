//! CLI binary for listing-brochure.
//!
//! A thin shim over the library crate that reads a JSON listing set, maps
//! CLI flags to `BrochureConfig` and writes the PDF.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use listing_brochure::{
    generate_to_file, parse_items, BatchProgressCallback, BrochureConfig, MediaReference,
    ProgressCallback, TranscodePreset,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over images; one log line per finished listing.
/// Listings finish out of order, so lines carry the listing number.
struct CliProgressCallback {
    bar: ProgressBar,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading listings…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            retries: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, items: usize, images: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(images as u64);
        self.bar.set_prefix("Fetching");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{items} listings, {images} images"))
        ));
    }

    fn on_task_retry(&self, reference: &MediaReference, attempt: u32) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        self.bar.println(format!(
            "  {} retry {attempt}  {}",
            yellow("↻"),
            dim(&reference.to_string())
        ));
    }

    fn on_image_complete(&self, _item: usize, _images_done: usize) {
        self.bar.inc(1);
    }

    fn on_item_ready(&self, item: usize) {
        self.bar
            .println(format!("  {} Listing #{}", green("✓"), item + 1));
    }

    fn on_batch_complete(&self, _items: usize) {
        self.bar.set_prefix("Rendering");
    }
}

const AFTER_HELP: &str = r#"INPUT FORMAT:
  A JSON array of listings. Every key is optional:

  [
    {
      "cover": "https://img.example.com/42/front.jpg",
      "gallery": ["https://img.example.com/42/1.jpg", "data:image/png;base64,..."],
      "title": "Two-bedroom flat with terrace",
      "fields": [{"label": "Price", "value": "€450,000"}, {"label": "Rooms", "value": "3"}],
      "locale": "pt-PT",
      "omit_title": false
    }
  ]

  Image references may be http(s)://, file:// or data: URIs. Galleries
  longer than 9 images are cut to the first 9.

EXAMPLES:
  # Basic run
  brochure favorites.json -o favorites.pdf

  # Slow image host: longer deadline, gentler concurrency
  brochure favorites.json -o out.pdf --deadline 180 --max-in-flight 4

  # Machine-readable stats on stdout
  brochure favorites.json -o out.pdf --json

BEHAVIOUR:
  Every image is retried up to --max-attempts times with a linear backoff
  (n × --retry-backoff-ms). If any image still fails, or the whole batch
  exceeds --deadline, no PDF is written and the exit code is non-zero.
"#;

/// Render favorite property listings into a printable PDF brochure.
#[derive(Parser, Debug)]
#[command(
    name = "brochure",
    version,
    about = "Render favorite property listings into a printable PDF brochure",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON file with the listings to render.
    input: PathBuf,

    /// Output PDF path. Default: the input path with a .pdf extension.
    #[arg(short, long, env = "BROCHURE_OUTPUT")]
    output: Option<PathBuf>,

    /// Seconds allowed for fetching and transcoding every image.
    #[arg(long, env = "BROCHURE_DEADLINE", default_value_t = 60)]
    deadline: u64,

    /// Gallery images fetched concurrently per listing.
    #[arg(long, env = "BROCHURE_GALLERY_CONCURRENCY", default_value_t = 3)]
    gallery_concurrency: usize,

    /// Fetch + transcode attempts in flight across the whole batch.
    #[arg(long, env = "BROCHURE_MAX_IN_FLIGHT", default_value_t = 8)]
    max_in_flight: usize,

    /// Attempts per image, first attempt included.
    #[arg(long, env = "BROCHURE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Backoff step in milliseconds (waits are n × step).
    #[arg(long, env = "BROCHURE_RETRY_BACKOFF_MS", default_value_t = 300)]
    retry_backoff_ms: u64,

    /// Longest side of cover images, in pixels.
    #[arg(long, env = "BROCHURE_COVER_SIZE", default_value_t = TranscodePreset::COVER.max_dimension)]
    cover_size: u32,

    /// Longest side of gallery images, in pixels.
    #[arg(long, env = "BROCHURE_GALLERY_SIZE", default_value_t = TranscodePreset::GALLERY.max_dimension)]
    gallery_size: u32,

    /// Print run statistics as JSON on stdout.
    #[arg(long, env = "BROCHURE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "BROCHURE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BROCHURE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BROCHURE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read listings ────────────────────────────────────────────────────
    let json = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("Failed to read listings from {:?}", cli.input))?;
    let items = parse_items(&json).context("Invalid listings file")?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("pdf"));

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = generate_to_file(&items, &output_path, &config).await;
    if let Some(ref cb) = progress {
        cb.bar.finish_and_clear();
    }
    let stats = result.context("Brochure generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} listings  {} pages  {} images  {}ms  →  {}",
            green("✔"),
            stats.items,
            stats.pages,
            stats.images,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.retries > 0 {
            eprintln!(
                "   {} retries  /  peak {} in flight",
                dim(&stats.retries.to_string()),
                dim(&stats.peak_in_flight.to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `BrochureConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BrochureConfig> {
    let cover = TranscodePreset {
        max_dimension: cli.cover_size,
        ..TranscodePreset::COVER
    };
    let gallery = TranscodePreset {
        max_dimension: cli.gallery_size,
        ..TranscodePreset::GALLERY
    };

    let mut builder = BrochureConfig::builder()
        .cover_preset(cover)
        .gallery_preset(gallery)
        .gallery_concurrency(cli.gallery_concurrency)
        .max_in_flight(cli.max_in_flight)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .deadline_secs(cli.deadline);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
