//! # Transport Backends
//!
//! Two implementations of [`ChainTransport`](crate::ports::ChainTransport):
//!
//! - [`StreamingTransport`]: new-head subscription, events fetched per
//!   header, resubscribes when the head stream ends.
//! - [`PollingTransport`]: fixed-interval polling of the best block
//!   number, catching up a bounded number of blocks per tick.

mod error_mapping;
mod polling;
mod streaming;

pub use error_mapping::{map_backend_message, map_rpc_error};
pub use polling::PollingTransport;
pub use streaming::StreamingTransport;

use std::future::Future;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::domain::TransportError;

/// Run `op` until it succeeds or the policy's attempts are spent, sleeping
/// with exponential backoff between attempts.
///
/// On exhaustion returns the number of attempts made and the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, (u32, TransportError)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err((attempt, e)),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
