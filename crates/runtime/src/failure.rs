//! Timeout and retry combinators shared by every protocol operation.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Bounds how long the caller waits for `future`.
///
/// On expiry the future is dropped and [`Error::Timeout`] carrying `label`
/// is returned. Effects already in flight (a send on the wire, a wait
/// registered in the queue) are not retracted; callers flush stale
/// registry entries themselves via
/// [`MessageQueue::reject_all_of_type`](crate::queue::MessageQueue::reject_all_of_type).
pub async fn with_timeout<T, F>(duration: Duration, label: &str, future: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(duration, future).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout(label.to_owned())),
	}
}

/// Runs `op` once and retries up to `retries` more times on failure,
/// propagating the last failure.
///
/// Retries are immediate, with no backoff beyond whatever the operation
/// itself awaits. Side-effecting operations must tolerate repeated partial
/// execution; nothing here deduplicates effects.
pub async fn with_retries<T, F, Fut>(retries: u32, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt = 0;
	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if attempt == retries => return Err(err),
			Err(err) => {
				attempt += 1;
				debug!(attempt, error = %err, "operation failed, retrying");
			}
		}
	}
}
