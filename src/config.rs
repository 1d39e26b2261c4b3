//! Configuration types for brochure generation.
//!
//! All pipeline behaviour is controlled through [`BrochureConfig`], built via
//! its [`BrochureConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across the concurrently running item pipelines
//! and to log exactly which limits a run used.

use crate::error::BrochureError;
use crate::layout::PageGeometry;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bounding dimension and JPEG quality for one class of image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranscodePreset {
    /// Longest side, in pixels, after downscaling. Smaller images are kept as is.
    pub max_dimension: u32,
    /// Quality factor in `(0, 1]`.
    pub quality: f32,
}

impl TranscodePreset {
    /// Hero image at the top of a listing's first page.
    pub const COVER: Self = Self {
        max_dimension: 1600,
        quality: 0.80,
    };

    /// One cell of the 3×3 gallery grid.
    pub const GALLERY: Self = Self {
        max_dimension: 600,
        quality: 0.70,
    };

    /// JPEG encoder quality (1–100) for this preset.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for TranscodePreset {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            quality: 0.72,
        }
    }
}

/// Attempt budget and linear backoff for one fetch + transcode task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Delay to sleep after `failed_attempt` (1-based) failed.
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        self.backoff_step * failed_attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(300),
        }
    }
}

/// Configuration for one brochure run.
///
/// Built via [`BrochureConfig::builder()`] or using
/// [`BrochureConfig::default()`].
///
/// # Example
/// ```rust
/// use listing_brochure::BrochureConfig;
///
/// let config = BrochureConfig::builder()
///     .gallery_concurrency(3)
///     .max_in_flight(12)
///     .deadline_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_in_flight, 12);
/// ```
#[derive(Clone)]
pub struct BrochureConfig {
    /// Preset for cover images. Default: 1600 px, quality 0.80.
    pub cover_preset: TranscodePreset,

    /// Preset for gallery images. Default: 600 px, quality 0.70.
    ///
    /// Grid cells are under 200 pt wide, so 600 px keeps print quality while
    /// holding a nine-image page to a few hundred kilobytes.
    pub gallery_preset: TranscodePreset,

    /// Gallery images in flight per listing. Default: 3.
    pub gallery_concurrency: usize,

    /// Fetch + transcode tasks in flight across the whole batch. Default: 8.
    ///
    /// Every listing runs its own pipeline concurrently; this shared limit
    /// keeps a 200-listing batch from opening 600 connections at once.
    pub max_in_flight: usize,

    /// Total attempts per image. Default: 3.
    pub max_attempts: u32,

    /// Linear backoff step in milliseconds. Default: 300 (waits 300 ms, 600 ms).
    pub retry_backoff_ms: u64,

    /// Deadline for the whole batch in seconds. Default: 60.
    pub deadline_secs: u64,

    /// Largest accepted image payload in bytes. Default: 32 MiB.
    pub max_image_bytes: usize,

    /// `User-Agent` sent by the HTTP fetcher.
    pub user_agent: String,

    /// Page geometry. Default: A4 portrait with 20 pt padding.
    pub geometry: PageGeometry,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BrochureConfig {
    fn default() -> Self {
        Self {
            cover_preset: TranscodePreset::COVER,
            gallery_preset: TranscodePreset::GALLERY,
            gallery_concurrency: 3,
            max_in_flight: 8,
            max_attempts: 3,
            retry_backoff_ms: 300,
            deadline_secs: 60,
            max_image_bytes: 32 * 1024 * 1024,
            user_agent: concat!("listing-brochure/", env!("CARGO_PKG_VERSION")).to_string(),
            geometry: PageGeometry::A4_PORTRAIT,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BrochureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrochureConfig")
            .field("cover_preset", &self.cover_preset)
            .field("gallery_preset", &self.gallery_preset)
            .field("gallery_concurrency", &self.gallery_concurrency)
            .field("max_in_flight", &self.max_in_flight)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("deadline_secs", &self.deadline_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("geometry", &self.geometry)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BrochureConfig {
    /// Create a new builder for `BrochureConfig`.
    pub fn builder() -> BrochureConfigBuilder {
        BrochureConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_step: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Builder for [`BrochureConfig`].
#[derive(Debug)]
pub struct BrochureConfigBuilder {
    config: BrochureConfig,
}

impl BrochureConfigBuilder {
    pub fn cover_preset(mut self, preset: TranscodePreset) -> Self {
        self.config.cover_preset = preset;
        self
    }

    pub fn gallery_preset(mut self, preset: TranscodePreset) -> Self {
        self.config.gallery_preset = preset;
        self
    }

    pub fn gallery_concurrency(mut self, n: usize) -> Self {
        self.config.gallery_concurrency = n.max(1);
        self
    }

    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.config.max_in_flight = n.max(1);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        self.config.deadline_secs = secs;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BrochureConfig, BrochureError> {
        let c = &self.config;
        for (name, preset) in [("cover", &c.cover_preset), ("gallery", &c.gallery_preset)] {
            if preset.max_dimension == 0 {
                return Err(BrochureError::InvalidConfig(format!(
                    "{name} preset max dimension must be ≥ 1"
                )));
            }
            if !(preset.quality > 0.0 && preset.quality <= 1.0) {
                return Err(BrochureError::InvalidConfig(format!(
                    "{name} preset quality must be in (0, 1], got {}",
                    preset.quality
                )));
            }
        }
        if c.deadline_secs == 0 {
            return Err(BrochureError::InvalidConfig(
                "Deadline must be ≥ 1 second".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(BrochureError::InvalidConfig(
                "Max image size must be ≥ 1 byte".into(),
            ));
        }
        c.geometry.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_presets() {
        let c = BrochureConfig::default();
        assert_eq!(c.cover_preset.max_dimension, 1600);
        assert_eq!(c.gallery_preset.max_dimension, 600);
        assert_eq!(c.gallery_concurrency, 3);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.deadline(), Duration::from_secs(60));
        let generic = TranscodePreset::default();
        assert_eq!(generic.max_dimension, 1200);
        assert_eq!(generic.jpeg_quality(), 72);
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_after(1), Duration::from_millis(300));
        assert_eq!(p.backoff_after(2), Duration::from_millis(600));
    }

    #[test]
    fn jpeg_quality_rounds_and_clamps() {
        assert_eq!(TranscodePreset::COVER.jpeg_quality(), 80);
        assert_eq!(TranscodePreset::GALLERY.jpeg_quality(), 70);
        let tiny = TranscodePreset {
            max_dimension: 10,
            quality: 0.001,
        };
        assert_eq!(tiny.jpeg_quality(), 1);
    }

    #[test]
    fn builder_rejects_bad_quality() {
        let err = BrochureConfig::builder()
            .cover_preset(TranscodePreset {
                max_dimension: 800,
                quality: 1.5,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("quality"), "got: {err}");
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = BrochureConfig::builder()
            .gallery_concurrency(0)
            .max_in_flight(0)
            .build()
            .unwrap();
        assert_eq!(c.gallery_concurrency, 1);
        assert_eq!(c.max_in_flight, 1);
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", BrochureConfig::default());
        assert!(dbg.contains("progress_callback: None"));
    }
}
