//! Bounded, order-preserving worker pool.
//!
//! `K` workers share one claim cursor. Each worker repeatedly claims the next
//! unprocessed index with an atomic `fetch_add`, runs the job, and writes the
//! result into the pre-sized slot for that index. Indices are handed out
//! exactly once, so no two workers ever touch the same slot and the output
//! order is the input order no matter which job finishes first.
//!
//! All workers are futures joined on the caller's task: dropping the pool
//! future drops every in-flight job with it.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Runs jobs over a slice with at most `concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `job(index, input)` for every input; results are index-aligned.
    pub async fn run_ordered<T, R, F, Fut>(&self, inputs: &[T], job: F) -> Vec<R>
    where
        F: Fn(usize, &T) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = inputs.len();
        if total == 0 {
            return Vec::new();
        }

        let cursor = AtomicUsize::new(0);
        let slots: Vec<OnceLock<R>> = (0..total).map(|_| OnceLock::new()).collect();

        {
            let cursor = &cursor;
            let slots = &slots;
            let job = &job;
            let workers = (0..self.concurrency.min(total)).map(|_| async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    if index >= total {
                        break;
                    }
                    let result = job(index, &inputs[index]).await;
                    // Claimed indices are unique; the slot is always empty here.
                    let _ = slots[index].set(result);
                }
            });
            join_all(workers).await;
        }

        let results: Vec<R> = slots.into_iter().filter_map(OnceLock::into_inner).collect();
        debug_assert_eq!(results.len(), total);
        results
    }
}
