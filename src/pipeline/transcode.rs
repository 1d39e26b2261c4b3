//! Image normalisation: decode → downscale → JPEG re-encode.
//!
//! Listing photos arrive straight from phones and agency uploads, often
//! 4000 px wide and several megabytes each. Embedding them untouched would
//! make a twenty-listing brochure hundreds of megabytes, so every image is
//! bounded to its preset's dimension and re-encoded as baseline JPEG, which
//! PDF embeds natively (`DCTDecode`) without a second re-encode.
//!
//! Decoding and encoding are CPU-bound and run on tokio's blocking pool so
//! they never stall the tasks waiting on the network.

use crate::config::TranscodePreset;
use crate::error::MediaError;
use crate::model::EncodedImage;
use crate::pipeline::decode::{probe_decoder, DecoderBackend};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Output dimensions for an image of `width × height` bounded by `max_dimension`.
///
/// Never upscales. When the longer side exceeds the bound it becomes exactly
/// `max_dimension`; the shorter side is scaled proportionally, rounded half
/// up, and never drops below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width.max(height) <= max_dimension {
        return (width, height);
    }
    let d = u64::from(max_dimension);
    let scale_short = |short: u32, long: u32| -> u32 {
        let (short, long) = (u64::from(short), u64::from(long));
        ((short * d * 2 + long) / (long * 2)).max(1) as u32
    };
    if width >= height {
        (max_dimension, scale_short(height, width))
    } else {
        (scale_short(width, height), max_dimension)
    }
}

/// Decodes, bounds and re-encodes images according to a [`TranscodePreset`].
#[derive(Clone)]
pub struct ImageTranscoder {
    decoder: Arc<dyn DecoderBackend>,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageTranscoder")
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

impl ImageTranscoder {
    /// Use the process-wide decoder picked by [`probe_decoder`].
    pub fn new() -> Self {
        Self::with_decoder(probe_decoder())
    }

    pub fn with_decoder(decoder: Arc<dyn DecoderBackend>) -> Self {
        Self { decoder }
    }

    /// Transcode on the blocking pool.
    ///
    /// `cancel` is checked before the work starts and between stages; a
    /// cancelled transcode returns [`MediaError::Cancelled`] and its partial
    /// result is dropped.
    pub async fn transcode(
        &self,
        bytes: Vec<u8>,
        preset: TranscodePreset,
        cancel: &CancellationToken,
    ) -> Result<EncodedImage, MediaError> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        let decoder = Arc::clone(&self.decoder);
        let token = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            transcode_with(decoder.as_ref(), &bytes, preset, Some(&token))
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MediaError::Cancelled),
            joined = handle => joined
                .map_err(|e| MediaError::Encode(format!("transcode task panicked: {e}")))?,
        }
    }

    /// Synchronous transcode on the calling thread.
    pub fn transcode_blocking(
        &self,
        bytes: &[u8],
        preset: TranscodePreset,
    ) -> Result<EncodedImage, MediaError> {
        transcode_with(self.decoder.as_ref(), bytes, preset, None)
    }
}

fn transcode_with(
    decoder: &dyn DecoderBackend,
    bytes: &[u8],
    preset: TranscodePreset,
    cancel: Option<&CancellationToken>,
) -> Result<EncodedImage, MediaError> {
    let check = || match cancel {
        Some(token) if token.is_cancelled() => Err(MediaError::Cancelled),
        _ => Ok(()),
    };

    let decoded = decoder.decode(bytes)?;
    check()?;

    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (width, height) = scaled_dimensions(src_w, src_h, preset.max_dimension);
    let resized = if (width, height) == (src_w, src_h) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::CatmullRom)
    };
    check()?;

    let rgb = flatten_on_white(resized);
    let quality = preset.jpeg_quality();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| MediaError::Encode(e.to_string()))?;

    debug!(
        "Transcoded {}x{} → {}x{} q{} ({} → {} bytes)",
        src_w,
        src_h,
        width,
        height,
        quality,
        bytes.len(),
        out.len()
    );

    Ok(EncodedImage {
        bytes: out,
        width,
        height,
        quality,
    })
}

/// Drop the alpha channel, compositing transparent pixels over white.
fn flatten_on_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut rgb = RgbImage::new(w, h);
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let a = u16::from(src[3]);
        for c in 0..3 {
            let v = u16::from(src[c]) * a + 255 * (255 - a);
            dst[c] = ((v + 127) / 255) as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 30, 30, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn small_images_are_never_upscaled() {
        assert_eq!(scaled_dimensions(300, 200, 600), (300, 200));
        assert_eq!(scaled_dimensions(600, 600, 600), (600, 600));
        assert_eq!(scaled_dimensions(1, 1, 1600), (1, 1));
    }

    #[test]
    fn longer_side_lands_on_bound() {
        assert_eq!(scaled_dimensions(4000, 3000, 1600), (1600, 1200));
        assert_eq!(scaled_dimensions(3000, 4000, 1600), (1200, 1600));
        assert_eq!(scaled_dimensions(1201, 1200, 600), (600, 600));
    }

    #[test]
    fn shorter_side_rounds_half_up() {
        // 1000 * 600 / 1500 = 400 exactly
        assert_eq!(scaled_dimensions(1500, 1000, 600), (600, 400));
        // 333 * 600 / 1000 = 199.8 → 200
        assert_eq!(scaled_dimensions(1000, 333, 600), (600, 200));
        // 1001 * 600 / 2000 = 300.3 → 300
        assert_eq!(scaled_dimensions(1001, 2000, 600), (300, 600));
        // 5 * 600 / 2000 = 1.5 → 2
        assert_eq!(scaled_dimensions(2000, 5, 600), (600, 2));
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        assert_eq!(scaled_dimensions(10_000, 1, 600), (600, 1));
    }

    #[test]
    fn transcode_produces_bounded_jpeg() {
        let t = ImageTranscoder::new();
        let out = t
            .transcode_blocking(&png_bytes(1000, 500), TranscodePreset::GALLERY)
            .unwrap();
        assert_eq!((out.width, out.height), (600, 300));
        assert_eq!(out.quality, 70);
        assert_eq!(&out.bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
        let back = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((back.width(), back.height()), (600, 300));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let rgb = flatten_on_white(img);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn undecodable_payload_is_decode_error() {
        let err = ImageTranscoder::new()
            .transcode_blocking(b"definitely not pixels", TranscodePreset::default())
            .unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    #[tokio::test]
    async fn async_transcode_respects_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ImageTranscoder::new()
            .transcode(png_bytes(10, 10), TranscodePreset::COVER, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, MediaError::Cancelled);
    }

    #[tokio::test]
    async fn async_transcode_matches_blocking() {
        let t = ImageTranscoder::new();
        let bytes = png_bytes(2400, 1800);
        let a = t
            .transcode(bytes.clone(), TranscodePreset::COVER, &CancellationToken::new())
            .await
            .unwrap();
        let b = t.transcode_blocking(&bytes, TranscodePreset::COVER).unwrap();
        assert_eq!((a.width, a.height), (1600, 1200));
        assert_eq!((a.width, a.height), (b.width, b.height));
    }
}
