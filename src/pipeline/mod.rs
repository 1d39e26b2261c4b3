//! Per-image pipeline stages and the primitives that schedule them.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ decode ──▶ transcode
//! (bytes)   (pixels)   (bounded JPEG)
//!   └──────── retry ────────┘   under pool (per listing) + limiter (per batch)
//! ```
//!
//! 1. [`fetch`]     the only stage with network I/O; races the batch
//!    cancellation token
//! 2. [`decode`]    decoder backend chosen once per process
//! 3. [`transcode`] downscale + JPEG re-encode on the blocking pool
//! 4. [`retry`]     3 attempts with linear backoff around fetch + transcode
//! 5. [`pool`]      at most K tasks per gallery, results in reference order
//! 6. [`limiter`]   one semaphore bounding attempts across the whole batch

pub mod decode;
pub mod fetch;
pub mod limiter;
pub mod pool;
pub mod retry;
pub mod transcode;
