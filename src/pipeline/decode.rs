//! Decode capability: turn an image payload into pixels.
//!
//! Two backends sit behind the [`DecoderBackend`] trait. [`probe_decoder`]
//! picks one once per process based on which codecs this build of `image`
//! enables, instead of branching on every call:
//!
//! * [`FormatSniffingDecoder`]: reads the magic bytes, refuses formats
//!   without a compiled-in codec up front, then drives the format's decoder
//!   directly.
//! * [`GenericDecoder`]: lets `image` guess and dispatch. Slower to fail on
//!   unsupported payloads, but works with any codec set.
//!
//! Both produce the same pixels and dimensions for the same payload.

use crate::error::MediaError;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use once_cell::sync::Lazy;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on decoded pixel buffers (≈ 12 000 × 12 000 RGBA).
const MAX_DECODE_ALLOC: u64 = 576 * 1024 * 1024;

/// Formats the fast path requires before it is selected.
const LISTING_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Something that can decode an image payload.
pub trait DecoderBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, MediaError>;
}

/// Fast path: sniff the format, then decode with that format's codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatSniffingDecoder;

impl DecoderBackend for FormatSniffingDecoder {
    fn name(&self) -> &'static str {
        "format-sniffing"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, MediaError> {
        let format = image::guess_format(bytes)
            .map_err(|e| MediaError::Decode(format!("unrecognised image payload: {e}")))?;
        if !format.reading_enabled() {
            return Err(MediaError::Decode(format!(
                "no decoder available for {format:?}"
            )));
        }
        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(decode_limits());
        reader
            .decode()
            .map_err(|e| MediaError::Decode(format!("{format:?}: {e}")))
    }
}

/// Portable path: let `image` guess the format and dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDecoder;

impl DecoderBackend for GenericDecoder {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, MediaError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| MediaError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(MediaError::Decode("unrecognised image payload".into()));
        }
        reader.limits(decode_limits());
        reader.decode().map_err(|e| MediaError::Decode(e.to_string()))
    }
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

static SELECTED: Lazy<Arc<dyn DecoderBackend>> = Lazy::new(|| {
    let backend: Arc<dyn DecoderBackend> = if LISTING_FORMATS.iter().all(|f| f.reading_enabled()) {
        Arc::new(FormatSniffingDecoder)
    } else {
        Arc::new(GenericDecoder)
    };
    debug!("Selected image decoder: {}", backend.name());
    backend
});

/// The decoder backend for this process, chosen on first use.
pub fn probe_decoder() -> Arc<dyn DecoderBackend> {
    Arc::clone(&SELECTED)
}
