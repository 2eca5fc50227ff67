//! Bounded retry loop keyed on array status codes.
//!
//! A unit of work reports an [`Attempt`]: the classifiable status code it
//! observed (if any) and its result. [`retry_call`] redrives the unit only when
//! the attempt failed with a code listed in the [`RetryPolicy`].

use std::future::Future;
use std::time::Duration;

use stor_protocol::codes;
use tracing::{debug, warn};

use crate::error::Result;

/// Default delay between attempts for busy-array retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default attempt bound for busy-array retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Which failure codes are retried, how often, and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
	retryable_codes: Vec<i64>,
	max_attempts: u32,
	delay: Duration,
}

impl RetryPolicy {
	/// `max_attempts` counts the first call; values below one are raised to one.
	pub fn new(retryable_codes: impl Into<Vec<i64>>, max_attempts: u32, delay: Duration) -> Self {
		Self {
			retryable_codes: retryable_codes.into(),
			max_attempts: max_attempts.max(1),
			delay,
		}
	}

	/// Retries the array's "system busy" family.
	pub fn system_busy() -> Self {
		Self::new(codes::SYSTEM_BUSY_CODES, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
	}

	/// Never retries.
	pub fn single_attempt() -> Self {
		Self::new(Vec::new(), 1, Duration::ZERO)
	}

	pub fn is_retryable(&self, code: i64) -> bool {
		self.retryable_codes.contains(&code)
	}

	pub fn retryable_codes(&self) -> &[i64] {
		&self.retryable_codes
	}

	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	pub fn delay(&self) -> Duration {
		self.delay
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::system_busy()
	}
}

/// Outcome of one invocation of a unit of work.
#[derive(Debug)]
pub struct Attempt<T> {
	/// Status code read from the response; `None` when no envelope was obtained.
	pub code: Option<i64>,
	pub result: Result<T>,
}

impl<T> Attempt<T> {
	pub fn classified(code: i64, result: Result<T>) -> Self {
		Self { code: Some(code), result }
	}

	pub fn unclassified(result: Result<T>) -> Self {
		Self { code: None, result }
	}
}

/// Runs `unit` until it stops failing with a retryable code or the policy's
/// attempt bound is reached, and returns the last attempt's result.
///
/// An attempt without a code ends the loop immediately, whatever its result.
pub async fn retry_call<T, F, Fut>(policy: &RetryPolicy, mut unit: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Attempt<T>>,
{
	let mut attempt = 1;
	loop {
		let Attempt { code, result } = unit().await;

		let Some(code) = code else {
			return result;
		};

		match result {
			Err(err) if policy.is_retryable(code) && attempt < policy.max_attempts => {
				warn!(
					target = "stor.retry",
					code,
					attempt,
					max_attempts = policy.max_attempts,
					delay_ms = policy.delay.as_millis() as u64,
					error = %err,
					"retryable failure; retrying"
				);
				tokio::time::sleep(policy.delay).await;
				attempt += 1;
			}
			result => {
				if attempt > 1 {
					debug!(target = "stor.retry", code, attempts = attempt, ok = result.is_ok(), "retry loop finished");
				}
				return result;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Instant;

	use super::*;
	use crate::error::Error;

	const BUSY: i64 = codes::SYSTEM_BUSY;

	fn busy() -> Error {
		Error::Api {
			operation: "lun.create".into(),
			code: BUSY,
			description: "The system is busy.".into(),
		}
	}

	fn policy(max_attempts: u32) -> RetryPolicy {
		RetryPolicy::new(vec![BUSY], max_attempts, Duration::from_millis(1))
	}

	#[tokio::test]
	async fn succeeds_after_exactly_max_attempts() {
		let calls = AtomicU32::new(0);
		let policy = policy(4);

		let result = retry_call(&policy, || {
			let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
			async move {
				if n < 4 {
					Attempt::classified(BUSY, Err(busy()))
				} else {
					Attempt::classified(codes::SUCCESS, Ok(n))
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 4);
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test]
	async fn exhausted_retries_surface_last_failure() {
		let calls = AtomicU32::new(0);
		let result: Result<()> = retry_call(&policy(3), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Attempt::classified(BUSY, Err(busy())) }
		})
		.await;

		assert_eq!(result.unwrap_err().code(), Some(BUSY));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn missing_code_stops_immediately() {
		let calls = AtomicU32::new(0);
		let result: Result<()> = retry_call(&policy(5), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Attempt::unclassified(Err(Error::Transport("connection refused".into()))) }
		})
		.await;

		assert!(matches!(result, Err(Error::Transport(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn non_retryable_code_stops_immediately() {
		let calls = AtomicU32::new(0);
		let result: Result<()> = retry_call(&policy(5), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async {
				Attempt::classified(
					50331651,
					Err(Error::Api {
						operation: "lun.create".into(),
						code: 50331651,
						description: "invalid parameter".into(),
					}),
				)
			}
		})
		.await;

		assert_eq!(result.unwrap_err().code(), Some(50331651));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn retryable_code_without_error_is_not_retried() {
		let calls = AtomicU32::new(0);
		let result = retry_call(&policy(5), || {
			calls.fetch_add(1, Ordering::SeqCst);
			async { Attempt::classified(BUSY, Ok("remapped")) }
		})
		.await;

		assert_eq!(result.unwrap(), "remapped");
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn waits_fixed_delay_between_attempts() {
		let policy = RetryPolicy::new(vec![BUSY], 3, Duration::from_millis(20));
		let started = Instant::now();
		let _: Result<()> = retry_call(&policy, || async { Attempt::classified(BUSY, Err(busy())) }).await;
		assert!(started.elapsed() >= Duration::from_millis(40));
	}

	#[test]
	fn policy_constructors() {
		let policy = RetryPolicy::system_busy();
		assert!(policy.is_retryable(codes::SYSTEM_BUSY));
		assert!(policy.is_retryable(codes::CONTROLLER_BUSY));
		assert!(!policy.is_retryable(codes::NO_AUTHENTICATION));
		assert_eq!(policy.max_attempts(), DEFAULT_MAX_ATTEMPTS);

		let once = RetryPolicy::single_attempt();
		assert_eq!(once.max_attempts(), 1);
		assert!(once.retryable_codes().is_empty());

		assert_eq!(RetryPolicy::new(vec![], 0, Duration::ZERO).max_attempts(), 1);
	}
}
