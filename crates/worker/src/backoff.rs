use std::time::Duration;

/// Bounded exponential backoff: `min(base * 2^attempt, cap)`.
///
/// Delays never decrease as `attempt` grows and never exceed `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
	base: Duration,
	cap: Duration,
}

impl Backoff {
	/// Creates a backoff policy. A `cap` below `base` is raised to `base`.
	pub fn new(base: Duration, cap: Duration) -> Self {
		Self { base, cap: cap.max(base) }
	}

	/// Initial delay.
	pub const fn base(&self) -> Duration {
		self.base
	}

	/// Upper bound for every delay.
	pub const fn cap(&self) -> Duration {
		self.cap
	}

	/// Delay to wait before retry number `attempt` (zero-based).
	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
		self.base.checked_mul(factor).map_or(self.cap, |d| d.min(self.cap))
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Self::new(Duration::from_millis(500), Duration::from_secs(30))
	}
}
