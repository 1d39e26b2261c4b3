//! Error types for the listing-brochure library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`BrochureError`]: **fatal**: the run produced no document (the batch
//!   timed out, one listing could not be illustrated, the renderer failed).
//!   Returned as `Err(BrochureError)` from the top-level `generate*`
//!   functions.
//!
//! * [`MediaError`]: **per task**: one image could not be fetched, decoded
//!   or re-encoded on one attempt. The retrying task recovers from it up to
//!   its attempt budget; once exhausted it is wrapped into
//!   [`BrochureError::BatchAbort`].
//!
//! There is no partial-success variant: a brochure is either complete and
//! fully illustrated or it is not produced at all.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the listing-brochure library.
#[derive(Debug, Error)]
pub enum BrochureError {
    // ── Batch errors ──────────────────────────────────────────────────────
    /// The batch did not finish before the configured deadline.
    #[error("Brochure generation timed out after {secs}s\nIncrease --deadline or check image hosting latency.")]
    Timeout { secs: u64 },

    /// One listing could not be fully illustrated, so the whole batch failed.
    /// `index` is 0-based; the message numbers listings from 1.
    #[error("Listing #{} could not be illustrated: {reason}", .index + 1)]
    BatchAbort { index: usize, reason: AbortReason },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The listing set could not be read or is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document renderer rejected the assembled pages.
    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single listing was aborted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AbortReason {
    /// The cover image failed after all attempts.
    Cover { attempts: u32, error: MediaError },
    /// A gallery image failed after all attempts. `index` is 0-based within
    /// the listing's gallery.
    Gallery {
        index: usize,
        attempts: u32,
        error: MediaError,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cover { attempts, error } => {
                write!(f, "cover image failed after {attempts} attempts: {error}")
            }
            AbortReason::Gallery {
                index,
                attempts,
                error,
            } => write!(
                f,
                "gallery image {} failed after {attempts} attempts: {error}",
                index + 1
            ),
        }
    }
}

/// A recoverable error for one fetch + transcode attempt.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum MediaError {
    /// Transport failure or non-success response.
    #[error("network error for '{reference}': {detail}")]
    Network {
        reference: String,
        status: Option<u16>,
        detail: String,
    },

    /// Payload is not a decodable image, or no codec is available for it.
    #[error("decode error: {0}")]
    Decode(String),

    /// JPEG re-encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// The batch was cancelled while this task was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl MediaError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MediaError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_abort_display_names_item_and_image() {
        let e = BrochureError::BatchAbort {
            index: 2,
            reason: AbortReason::Gallery {
                index: 0,
                attempts: 3,
                error: MediaError::Network {
                    reference: "https://img.example/a.jpg".into(),
                    status: Some(503),
                    detail: "HTTP 503 Service Unavailable".into(),
                },
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("#3"), "got: {msg}");
        assert!(msg.contains("gallery image 1"), "got: {msg}");
        assert!(msg.contains("3 attempts"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = BrochureError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!MediaError::Cancelled.is_retryable());
        assert!(MediaError::Decode("bad magic".into()).is_retryable());
        assert!(MediaError::Encode("oom".into()).is_retryable());
    }
}
