// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, provider::DescriptorError};

/// Bounded exponential backoff applied to retryable refresh failures.
///
/// Authorization failures are never retried; only transport failures and retryable statuses
/// (408/429/5xx) consume attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts per refresh, including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles for each further attempt.
	pub initial_backoff: Duration,
	/// Ceiling applied to every delay, including upstream `Retry-After` hints.
	pub max_backoff: Duration,
	/// Adds up to half of the computed delay as random jitter.
	pub jitter: bool,
}
impl RetryPolicy {
	/// Policy that performs exactly one attempt.
	pub const fn none() -> Self {
		Self {
			max_attempts: 1,
			initial_backoff: Duration::ZERO,
			max_backoff: Duration::ZERO,
			jitter: false,
		}
	}

	/// Returns `true` if another attempt may follow `completed` attempts.
	pub fn allows_retry(&self, completed: u32) -> bool {
		completed < self.max_attempts
	}

	/// Delay to wait after `completed` (1-based) failed attempts.
	pub fn delay_for(&self, completed: u32, retry_after: Option<Duration>) -> Duration {
		let exponent = completed.saturating_sub(1);
		let factor = 1_i32.checked_shl(exponent).filter(|factor| *factor > 0).unwrap_or(i32::MAX);
		let backoff = self.initial_backoff.checked_mul(factor).unwrap_or(self.max_backoff);
		let delay = match retry_after {
			Some(hint) if hint > backoff => hint,
			_ => backoff,
		};
		let delay = delay.min(self.max_backoff).max(Duration::ZERO);

		if self.jitter { with_jitter(delay, self.max_backoff) } else { delay }
	}

	pub(crate) fn validate(&self) -> Result<(), DescriptorError> {
		if self.max_attempts == 0 {
			return Err(DescriptorError::NoAttempts);
		}
		if self.initial_backoff.is_negative() {
			return Err(DescriptorError::NonPositiveDuration { field: "initial_backoff" });
		}
		if self.max_backoff.is_negative() {
			return Err(DescriptorError::NonPositiveDuration { field: "max_backoff" });
		}

		Ok(())
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 2,
			initial_backoff: Duration::milliseconds(200),
			max_backoff: Duration::seconds(2),
			jitter: true,
		}
	}
}

fn with_jitter(delay: Duration, ceiling: Duration) -> Duration {
	let half = delay.whole_milliseconds() / 2;

	if half <= 0 {
		return delay;
	}

	let spread = i64::try_from(half).unwrap_or(i64::MAX);
	let extra = rand::rng().random_range(0..=spread);

	(delay + Duration::milliseconds(extra)).min(ceiling)
}
