//! Media retrieval: resolve one [`MediaReference`] to raw bytes.
//!
//! Fetchers report every failure, including non-success HTTP statuses, as a
//! [`MediaError`] value so the retrying task decides what to do with it.
//! There is no retry logic at this level.
//!
//! The built-in [`HttpMediaFetcher`] understands three kinds of reference:
//!
//! | Reference | Source |
//! |-----------|--------|
//! | `http://…`, `https://…` | GET through a shared `reqwest::Client` |
//! | `data:image/…;base64,…` | inline payload, decoded in place |
//! | `file:///…` | local file (useful for previews and tests) |

use crate::config::BrochureConfig;
use crate::error::{BrochureError, MediaError};
use crate::model::MediaReference;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Retrieves the raw bytes behind a [`MediaReference`].
///
/// Implementations must return promptly with [`MediaError::Cancelled`] once
/// `cancel` fires; the orchestrator relies on it to interrupt abandoned work
/// after a deadline or a sibling failure.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, MediaError>;
}

/// Default fetcher for `http(s)`, `data:` and `file://` references.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpMediaFetcher {
    /// Build a fetcher with its own connection pool.
    ///
    /// No request timeout is set: the batch deadline is the only clock.
    pub fn new(config: &BrochureConfig) -> Result<Self, BrochureError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BrochureError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, config.max_image_bytes))
    }

    /// Wrap an existing client, e.g. one with custom proxies or TLS roots.
    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    async fn fetch_http(&self, reference: &MediaReference) -> Result<Vec<u8>, MediaError> {
        let url = reference.as_str();
        let network = |status: Option<u16>, detail: String| MediaError::Network {
            reference: url.to_string(),
            status,
            detail,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            network(None, format!("{kind}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(network(Some(status.as_u16()), format!("HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if (len as usize) > self.max_bytes {
                return Err(network(
                    Some(status.as_u16()),
                    format!("payload of {len} bytes exceeds limit of {}", self.max_bytes),
                ));
            }
        }

        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| network(Some(status.as_u16()), e.to_string()))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(network(
                    Some(status.as_u16()),
                    format!("payload exceeds limit of {} bytes", self.max_bytes),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} → {} bytes", reference, body.len());
        Ok(body)
    }

    async fn fetch_file(&self, reference: &MediaReference, path: &Path) -> Result<Vec<u8>, MediaError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| MediaError::Network {
            reference: reference.to_string(),
            status: None,
            detail: format!("cannot read {}: {e}", path.display()),
        })?;
        self.check_size(reference, bytes.len())?;
        Ok(bytes)
    }

    fn check_size(&self, reference: &MediaReference, len: usize) -> Result<(), MediaError> {
        if len > self.max_bytes {
            return Err(MediaError::Network {
                reference: reference.to_string(),
                status: None,
                detail: format!("payload of {len} bytes exceeds limit of {}", self.max_bytes),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, MediaError> {
        let work = async {
            match classify(reference) {
                ReferenceKind::Http => self.fetch_http(reference).await,
                ReferenceKind::Data => {
                    let bytes = decode_data_uri(reference.as_str())?;
                    self.check_size(reference, bytes.len())?;
                    Ok(bytes)
                }
                ReferenceKind::File(path) => self.fetch_file(reference, Path::new(path)).await,
                ReferenceKind::Unsupported => Err(MediaError::Network {
                    reference: reference.to_string(),
                    status: None,
                    detail: "unsupported reference scheme".into(),
                }),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MediaError::Cancelled),
            result = work => result,
        }
    }
}

enum ReferenceKind<'a> {
    Http,
    Data,
    File(&'a str),
    Unsupported,
}

fn classify(reference: &MediaReference) -> ReferenceKind<'_> {
    let s = reference.as_str();
    if s.starts_with("http://") || s.starts_with("https://") {
        ReferenceKind::Http
    } else if s.starts_with("data:") {
        ReferenceKind::Data
    } else if let Some(path) = s.strip_prefix("file://") {
        ReferenceKind::File(path)
    } else {
        ReferenceKind::Unsupported
    }
}

/// Decode a base64 `data:` URI into its payload.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, MediaError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| MediaError::Decode("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::Decode("data URI has no payload separator".into()))?;
    if !meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(MediaError::Decode(
            "data URI payload is not base64-encoded".into(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| MediaError::Decode(format!("invalid base64 in data URI: {e}")))
}
