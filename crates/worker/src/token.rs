use tokio_util::sync::CancellationToken;

/// Identifies one attempt within a single owner's lifecycle.
///
/// Completions tagged with a generation older than the owner's current one
/// are stale and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
	/// The generation assigned by a fresh clock.
	pub const FIRST: Self = Self(1);

	/// Raw counter value, for logging.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for Generation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "g{}", self.0)
	}
}

/// Monotonic generation counter owned by a single lifecycle.
///
/// Advancing the clock also cancels the token handed out for the previous
/// generation, so timers and calls spawned under it stop together.
#[derive(Debug)]
pub struct GenerationClock {
	current: Generation,
	token: GenerationToken,
}

impl Default for GenerationClock {
	fn default() -> Self {
		Self::new()
	}
}

impl GenerationClock {
	/// Creates a clock positioned at [`Generation::FIRST`].
	pub fn new() -> Self {
		Self {
			current: Generation::FIRST,
			token: GenerationToken::new(Generation::FIRST),
		}
	}

	/// Returns the current generation.
	pub const fn current(&self) -> Generation {
		self.current
	}

	/// Returns true when `generation` is still the live one.
	pub fn is_current(&self, generation: Generation) -> bool {
		self.current == generation
	}

	/// Cancellation scope for work spawned under the current generation.
	pub fn token(&self) -> GenerationToken {
		self.token.clone()
	}

	/// Cancels the current generation and moves to the next one.
	pub fn advance(&mut self) -> Generation {
		self.token.cancel();
		self.current = Generation(self.current.0.wrapping_add(1));
		self.token = GenerationToken::new(self.current);
		self.current
	}

	/// Cancels the current generation without advancing.
	pub fn cancel(&self) {
		self.token.cancel();
	}
}

/// Generation-scoped cancellation token.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: Generation,
	cancel: CancellationToken,
}

impl GenerationToken {
	/// Creates a fresh, uncancelled token.
	pub fn new(generation: Generation) -> Self {
		Self {
			generation,
			cancel: CancellationToken::new(),
		}
	}

	/// Returns the generation this token belongs to.
	pub const fn generation(&self) -> Generation {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
