//! Bounded retry with exponential backoff for transient catalog failures.
//!
//! Network errors, timeouts and 5xx responses are worth one or two more
//! attempts before a lookup degrades to "no result"; 4xx responses are
//! permanent and returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 250;

/// Retry `operation` while it fails transiently, up to [`MAX_ATTEMPTS`].
///
/// Backoff doubles per attempt (250ms, 500ms). Permanent errors short-circuit.
pub async fn retry_transient<F, Fut, T>(operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay_ms = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
