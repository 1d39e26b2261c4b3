//! Progress-callback trait for per-image batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BrochureConfigBuilder::progress_callback`] to receive
//! events as the pipeline fetches and transcodes each image.
//!
//! # Example
//!
//! ```rust
//! use listing_brochure::{BatchProgressCallback, BrochureConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     images: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, item: usize, _images_done: usize) {
//!         let done = self.images.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("listing {item}: {done} images so far");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { images: AtomicUsize::new(0) });
//!
//! let config = BrochureConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::MediaReference;
use std::sync::Arc;

/// Called by the batch orchestrator as images complete.
///
/// Implementations must be `Send + Sync`: every listing's pipeline runs
/// concurrently, so methods may be called from several tasks at once. All
/// methods default to no-ops so callers only override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any image is fetched.
    ///
    /// # Arguments
    /// * `items`:  listings in the batch
    /// * `images`: images the batch will fetch (covers plus galleries)
    fn on_batch_start(&self, items: usize, images: usize) {
        let _ = (items, images);
    }

    /// Called after an attempt failed and before the backoff sleep.
    ///
    /// # Arguments
    /// * `reference`: image being retried
    /// * `attempt`:   1-based number of the attempt that just failed
    fn on_task_retry(&self, reference: &MediaReference, attempt: u32) {
        let _ = (reference, attempt);
    }

    /// Called when one image of listing `item` (0-based) is transcoded.
    ///
    /// `images_done` counts completed images across the whole batch.
    fn on_image_complete(&self, item: usize, images_done: usize) {
        let _ = (item, images_done);
    }

    /// Called when every image of listing `item` is ready.
    fn on_item_ready(&self, item: usize) {
        let _ = item;
    }

    /// Called once after every listing is ready, before layout.
    fn on_batch_complete(&self, items: usize) {
        let _ = items;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BrochureConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
