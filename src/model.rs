//! Input records and per-stage outcome types.
//!
//! Inputs ([`SourceItem`], [`MediaReference`]) are plain data resolved by the
//! caller from its own record store; they are read-only for one run. The
//! outcome types ([`TaskResult`], [`ItemResult`], [`BatchResult`]) exist only
//! for the duration of one call.

use crate::error::{AbortReason, MediaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum gallery images one listing can show (a 3×3 grid).
pub const MAX_GALLERY_IMAGES: usize = 9;

/// Opaque locator for a remote image.
///
/// The built-in fetcher understands `http(s)://`, `file://` and `data:`
/// references; custom [`crate::pipeline::fetch::MediaFetcher`]
/// implementations may accept anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // data: URIs can be megabytes long; keep log lines readable.
        if self.0.starts_with("data:") && self.0.len() > 48 {
            let mut end = 48;
            while !self.0.is_char_boundary(end) {
                end -= 1;
            }
            write!(f, "{}…", &self.0[..end])
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for MediaReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MediaReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One pre-formatted label/value pair shown on a listing's field page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayField {
    pub label: String,
    pub value: String,
}

impl DisplayField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// One listing, rendered as a two-page block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Hero image shown at the top of the first page.
    #[serde(default)]
    pub cover: Option<MediaReference>,

    /// Up to [`MAX_GALLERY_IMAGES`] images for the 3×3 grid, in display order.
    #[serde(default)]
    pub gallery: Vec<MediaReference>,

    /// Headline shown above the field columns.
    #[serde(default)]
    pub title: Option<String>,

    /// Fields already formatted for the target locale.
    #[serde(default)]
    pub fields: Vec<DisplayField>,

    /// BCP-47 tag the fields were formatted for.
    #[serde(default)]
    pub locale: Option<String>,

    /// Skip the title line entirely on the field page.
    #[serde(default)]
    pub omit_title: bool,
}

impl SourceItem {
    /// Number of images this item will fetch: the cover plus at most
    /// [`MAX_GALLERY_IMAGES`] gallery images.
    pub fn image_count(&self) -> usize {
        usize::from(self.cover.is_some()) + self.gallery.len().min(MAX_GALLERY_IMAGES)
    }

    /// The title line to render, if any.
    pub fn visible_title(&self) -> Option<&str> {
        if self.omit_title {
            return None;
        }
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A transcoded JPEG ready for placement.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG quality (1–100) the payload was encoded with.
    pub quality: u8,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("quality", &self.quality)
            .finish()
    }
}

/// Outcome of one retrying fetch + transcode task.
#[derive(Debug, Clone)]
pub enum TaskResult {
    Success(EncodedImage),
    Failure { error: MediaError, attempts: u32 },
}

/// Outcome of one listing.
#[derive(Debug, Clone)]
pub enum ItemResult {
    /// Every requested image succeeded. `cover` is `None` only when the item
    /// had no cover reference.
    Ready {
        cover: Option<EncodedImage>,
        gallery: Vec<EncodedImage>,
    },
    Aborted(AbortReason),
}

/// Index-aligned outcomes of a whole batch. Only built when every item is
/// [`ItemResult::Ready`]; any abort surfaces as a
/// [`crate::error::BrochureError`] instead.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub items: Vec<ItemResult>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total images transcoded across the batch.
    pub fn image_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                ItemResult::Ready { cover, gallery } => {
                    usize::from(cover.is_some()) + gallery.len()
                }
                ItemResult::Aborted(_) => 0,
            })
            .sum()
    }
}
