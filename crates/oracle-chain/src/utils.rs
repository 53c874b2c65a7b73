//! Retry helpers for network requests.
//!
//! Requests against the event API and the full node are retried with a linear
//! backoff: the n-th retry waits `base * n`. A policy with `max_retries = 3`
//! therefore makes at most four attempts.

use backoff::backoff::Backoff;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff whose delay grows by `base` on every retry.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
	base: Duration,
	max_retries: u32,
	attempt: u32,
}

impl LinearBackoff {
	pub fn new(base: Duration, max_retries: u32) -> Self {
		Self {
			base,
			max_retries,
			attempt: 0,
		}
	}
}

impl Backoff for LinearBackoff {
	fn next_backoff(&mut self) -> Option<Duration> {
		if self.attempt >= self.max_retries {
			return None;
		}
		self.attempt += 1;
		Some(self.base * self.attempt)
	}

	fn reset(&mut self) {
		self.attempt = 0;
	}
}

/// Retry settings for one class of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_retries: u32,
	pub base_delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_retries: u32, base_delay: Duration) -> Self {
		Self {
			max_retries,
			base_delay,
		}
	}

	pub fn backoff(&self) -> LinearBackoff {
		LinearBackoff::new(self.base_delay, self.max_retries)
	}

	/// Upper bound on the number of attempts.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries + 1
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(3, Duration::from_millis(100))
	}
}

/// Runs `operation` until it succeeds or the policy's backoff is exhausted.
///
/// The error of the last attempt is returned when every attempt fails.
pub async fn retry_with_backoff<T, E, F, Fut>(
	policy: &RetryPolicy,
	label: &str,
	mut operation: F,
) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: Display,
{
	let mut backoff = policy.backoff();
	let mut attempts = 0u32;

	loop {
		attempts += 1;
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) => match backoff.next_backoff() {
				Some(delay) => {
					warn!(
						"{} failed, attempt {}/{}, retrying in {:?}: {}",
						label,
						attempts,
						policy.max_attempts(),
						delay,
						e
					);
					tokio::time::sleep(delay).await;
				}
				None => {
					warn!("{} failed after {} attempts, giving up: {}", label, attempts, e);
					return Err(e);
				}
			},
		}
	}
}
