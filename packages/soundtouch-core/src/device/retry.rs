//! Retry logic for transient device API errors.
//!
//! Speakers waking from standby often drop the first request or answer with
//! a 5xx while their web server restarts.

use std::future::Future;
use std::time::Duration;

use super::http::{DeviceError, DeviceResult};

/// Delays before each retry (exponential backoff).
pub(crate) const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes a request with retry logic for transient errors.
///
/// Non-transient errors (error documents, parse failures, invalid
/// parameters) are returned immediately.
///
/// # Arguments
/// * `action` - Request description for logging
/// * `operation` - Closure that performs the request
pub(crate) async fn with_retry<T, F, Fut>(action: &str, mut operation: F) -> DeviceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DeviceResult<T>>,
{
    let mut last_error: Option<DeviceError> = None;
    for (attempt, &delay_ms) in std::iter::once(&0)
        .chain(RETRY_DELAYS_MS.iter())
        .enumerate()
    {
        if attempt > 0 {
            log::info!(
                "[HTTP] Retrying {} (attempt {}/{}) after {}ms",
                action,
                attempt + 1,
                RETRY_DELAYS_MS.len() + 1,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() => {
                log::warn!("[HTTP] {} transient error: {}", action, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DeviceError::HttpStatus(0, format!("{action}: retries exhausted"))
    }))
}
