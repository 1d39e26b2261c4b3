//! Batch orchestration: every listing's images, all-or-nothing, on a deadline.
//!
//! Each listing runs two branches at once: the cover through one
//! [`RetryingTask`], the gallery through a [`WorkerPool`] of them. Every
//! listing runs at the same time, and one [`GlobalLimiter`] bounds the total
//! number of fetch + transcode attempts in flight across the batch.
//!
//! ## Failure policy
//!
//! A brochure with a hole in it is not a brochure. The first image that
//! exhausts its retries aborts its listing, and an aborted listing fails the
//! whole batch. There is no placeholder image and no partial document.
//!
//! A limiter permit covers the whole of an attempt, fetch included. When more
//! than `max_in_flight` fetches stall, a listing that would fail queues
//! behind them and the batch ends in [`BrochureError::Timeout`] rather than
//! [`BrochureError::BatchAbort`]. Either way nothing is rendered.
//!
//! ## Deadline and cancellation
//!
//! The whole batch races one deadline. When it expires, or when a listing
//! aborts, the batch [`CancellationToken`] fires and the outstanding futures
//! are dropped: fetches stop at their next await point and transcodes stop
//! between stages.

use crate::config::{BrochureConfig, TranscodePreset};
use crate::error::{AbortReason, BrochureError, MediaError};
use crate::model::{BatchResult, ItemResult, SourceItem, TaskResult, MAX_GALLERY_IMAGES};
use crate::pipeline::fetch::MediaFetcher;
use crate::pipeline::limiter::GlobalLimiter;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::retry::RetryingTask;
use crate::pipeline::transcode::ImageTranscoder;
use crate::progress::ProgressCallback;
use futures::future::try_join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the fetch + transcode stage for a whole batch.
pub struct BatchOrchestrator {
    task: RetryingTask,
    limiter: Arc<GlobalLimiter>,
    gallery_pool: WorkerPool,
    cover_preset: TranscodePreset,
    gallery_preset: TranscodePreset,
    deadline: Duration,
    progress: Option<ProgressCallback>,
}

impl BatchOrchestrator {
    pub fn new(config: &BrochureConfig, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self::with_transcoder(config, fetcher, ImageTranscoder::new())
    }

    pub fn with_transcoder(
        config: &BrochureConfig,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: ImageTranscoder,
    ) -> Self {
        let limiter = Arc::new(GlobalLimiter::new(config.max_in_flight.max(1)));
        let task = RetryingTask::new(fetcher, transcoder, config.retry_policy())
            .with_limiter(Arc::clone(&limiter))
            .with_progress(config.progress_callback.clone());
        Self {
            task,
            limiter,
            gallery_pool: WorkerPool::new(config.gallery_concurrency),
            cover_preset: config.cover_preset,
            gallery_preset: config.gallery_preset,
            deadline: config.deadline(),
            progress: config.progress_callback.clone(),
        }
    }

    /// Fetch and transcode every image of every item.
    ///
    /// Returns results index-aligned with `items`, or the first failure:
    /// [`BrochureError::BatchAbort`] for an item that could not be fully
    /// illustrated, [`BrochureError::Timeout`] when the deadline passed.
    pub async fn run(&self, items: &[SourceItem]) -> Result<BatchResult, BrochureError> {
        let start = Instant::now();
        let total_images: usize = items.iter().map(SourceItem::image_count).sum();
        info!(
            "Fetching {} images for {} listings (≤{} in flight)",
            total_images,
            items.len(),
            self.limiter.max_permits()
        );
        if let Some(ref cb) = self.progress {
            cb.on_batch_start(items.len(), total_images);
        }

        let cancel = CancellationToken::new();
        // Whatever way this function returns, abandoned work is told to stop.
        let _guard = cancel.clone().drop_guard();
        let images_done = AtomicUsize::new(0);
        let (cancel_ref, done_ref) = (&cancel, &images_done);

        let pipelines = items.iter().enumerate().map(|(index, item)| {
            let (cancel, images_done) = (cancel_ref, done_ref);
            async move {
                match self.run_item(index, item, cancel, images_done).await {
                    ItemResult::Aborted(reason) => {
                        warn!("Listing #{} aborted: {}", index + 1, reason);
                        cancel.cancel();
                        Err(BrochureError::BatchAbort { index, reason })
                    }
                    ready => {
                        if let Some(ref cb) = self.progress {
                            cb.on_item_ready(index);
                        }
                        Ok(ready)
                    }
                }
            }
        });

        let outcome = tokio::time::timeout(self.deadline, try_join_all(pipelines)).await;
        cancel.cancel();

        match outcome {
            Err(_elapsed) => {
                warn!(
                    "Batch deadline of {}s elapsed with {}/{} images done",
                    self.deadline.as_secs(),
                    images_done.load(Ordering::Relaxed),
                    total_images
                );
                Err(BrochureError::Timeout {
                    secs: self.deadline.as_secs(),
                })
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(results)) => {
                info!(
                    "Transcoded {} images in {}ms ({} retries, peak {} in flight)",
                    total_images,
                    start.elapsed().as_millis(),
                    self.task.retry_count(),
                    self.limiter.peak_in_flight()
                );
                if let Some(ref cb) = self.progress {
                    cb.on_batch_complete(results.len());
                }
                Ok(BatchResult { items: results })
            }
        }
    }

    /// Cover and gallery of one item, concurrently.
    ///
    /// The first real failure cancels the item's remaining tasks.
    pub async fn run_item(
        &self,
        index: usize,
        item: &SourceItem,
        batch_cancel: &CancellationToken,
        images_done: &AtomicUsize,
    ) -> ItemResult {
        let cancel = batch_cancel.child_token();
        let cancel = &cancel;
        let on_result = |result: &TaskResult| match result {
            TaskResult::Success(_) => {
                let done = images_done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref cb) = self.progress {
                    cb.on_image_complete(index, done);
                }
            }
            TaskResult::Failure {
                error: MediaError::Cancelled,
                ..
            } => {}
            TaskResult::Failure { .. } => cancel.cancel(),
        };

        let cover = async {
            let reference = item.cover.as_ref()?;
            let result = self.task.run(reference, self.cover_preset, cancel).await;
            on_result(&result);
            Some(result)
        };

        let refs = gallery_refs(index, item);
        let on_result = &on_result;
        let gallery = self.gallery_pool.run_ordered(refs, |_, reference| {
            let reference = reference.clone();
            async move {
                let result = self.task.run(&reference, self.gallery_preset, cancel).await;
                on_result(&result);
                result
            }
        });

        let (cover, gallery) = futures::join!(cover, gallery);
        resolve_item(cover, gallery)
    }

    /// Highest number of attempts in flight at once during the last run.
    pub fn peak_in_flight(&self) -> usize {
        self.limiter.peak_in_flight()
    }

    /// Retries performed across the batch so far.
    pub fn retry_count(&self) -> usize {
        self.task.retry_count()
    }
}

fn gallery_refs(index: usize, item: &SourceItem) -> &[crate::model::MediaReference] {
    if item.gallery.len() > MAX_GALLERY_IMAGES {
        warn!(
            "Listing #{} has {} gallery images; only the first {} are used",
            index + 1,
            item.gallery.len(),
            MAX_GALLERY_IMAGES
        );
        &item.gallery[..MAX_GALLERY_IMAGES]
    } else {
        &item.gallery
    }
}

/// Collapse task outcomes into an item outcome.
///
/// A real failure wins over a cancellation it caused: the reason reported
/// is the first non-cancelled failure, cover before gallery.
fn resolve_item(cover: Option<TaskResult>, gallery: Vec<TaskResult>) -> ItemResult {
    let mut cancelled: Option<AbortReason> = None;

    let cover = match cover {
        None => None,
        Some(TaskResult::Success(image)) => Some(image),
        Some(TaskResult::Failure { error, attempts }) => {
            let reason = AbortReason::Cover { attempts, error };
            if !matches!(reason, AbortReason::Cover { error: MediaError::Cancelled, .. }) {
                return ItemResult::Aborted(reason);
            }
            cancelled = Some(reason);
            None
        }
    };

    let mut images = Vec::with_capacity(gallery.len());
    for (index, result) in gallery.into_iter().enumerate() {
        match result {
            TaskResult::Success(image) => images.push(image),
            TaskResult::Failure {
                error: MediaError::Cancelled,
                attempts,
            } => {
                cancelled.get_or_insert(AbortReason::Gallery {
                    index,
                    attempts,
                    error: MediaError::Cancelled,
                });
            }
            TaskResult::Failure { error, attempts } => {
                return ItemResult::Aborted(AbortReason::Gallery {
                    index,
                    attempts,
                    error,
                });
            }
        }
    }

    if let Some(reason) = cancelled {
        return ItemResult::Aborted(reason);
    }
    debug!("Item ready: cover={} gallery={}", cover.is_some(), images.len());
    ItemResult::Ready {
        cover,
        gallery: images,
    }
}
