//! Bounded-concurrency execution of independent provider requests.
//!
//! The cap bounds in-flight requests on one cooperative flow, not CPU
//! parallelism. Work units are infallible by contract: each catches its own
//! error and degrades to a fallback value, so no single failure aborts a
//! batch.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures::stream::{Stream, StreamExt};
use tracing::debug;

/// Runs all `units` with at most `cap` in flight and returns every result
/// in input order, regardless of completion order.
pub async fn run_ordered<T, F>(units: Vec<F>, cap: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    futures::stream::iter(units).buffered(cap).collect().await
}

/// Runs all `units` with at most `cap` in flight, yielding each result as
/// soon as its unit completes. Used where results are consumed incrementally
/// and input order does not matter.
pub fn completion_stream<T, F>(units: Vec<F>, cap: usize) -> impl Stream<Item = T>
where
    F: Future<Output = T>,
{
    futures::stream::iter(units).buffer_unordered(cap)
}

/// Retries `op` up to `attempts` times, bounding each attempt by
/// `per_attempt`. The bound is local to this one request; other units in the
/// executor's queue are unaffected.
///
/// # Errors
///
/// Returns the last error once every attempt has failed or timed out.
/// Callers degrade from this error (empty result, trip skip) rather than
/// propagating it into the batch.
pub async fn with_retry<T, F, Fut>(attempts: u32, per_attempt: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for attempt in 1..=attempts {
        match tokio::time::timeout(per_attempt, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => {
                debug!(attempt, attempts, error = %error, "request attempt failed");
                last_error = Some(error);
            }
            Err(_) => {
                debug!(attempt, attempts, timeout_ms = per_attempt.as_millis() as u64, "request attempt timed out");
                last_error = Some(anyhow!("request timed out after {per_attempt:?}"));
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no attempts were made")))
}
