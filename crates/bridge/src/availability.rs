//! Process-wide observation of registrar presence.
//!
//! Exactly one [`AvailabilityPublisher`] exists per watched service and it is
//! owned by the transport adapter. Everything else holds read-only
//! [`AvailabilityWatch`] subscriptions.

use tokio::sync::watch;

/// Whether the registrar currently owns its bus name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
	/// No observation yet. Calls are attempted and failures retried.
	#[default]
	Unknown,
	Present,
	Absent,
}

impl Availability {
	/// Maps a bus `NameHasOwner`-style answer.
	pub const fn from_present(present: bool) -> Self {
		if present { Self::Present } else { Self::Absent }
	}
}

/// Write side of the availability observation.
#[derive(Debug)]
pub struct AvailabilityPublisher {
	tx: watch::Sender<Availability>,
}

impl Default for AvailabilityPublisher {
	fn default() -> Self {
		Self::new()
	}
}

impl AvailabilityPublisher {
	/// Creates a publisher starting at [`Availability::Unknown`].
	pub fn new() -> Self {
		let (tx, _) = watch::channel(Availability::Unknown);
		Self { tx }
	}

	/// Publishes `availability`. Returns whether it differed from the previous value.
	///
	/// Never blocks; subscribers only ever see the latest value.
	pub fn publish(&self, availability: Availability) -> bool {
		self.tx.send_if_modified(|current| {
			if *current == availability {
				false
			} else {
				*current = availability;
				true
			}
		})
	}

	/// Last published value.
	pub fn current(&self) -> Availability {
		*self.tx.borrow()
	}

	/// Creates a new read-only subscription.
	pub fn subscribe(&self) -> AvailabilityWatch {
		AvailabilityWatch { rx: self.tx.subscribe() }
	}
}

/// Read side of the availability observation.
#[derive(Debug, Clone)]
pub struct AvailabilityWatch {
	rx: watch::Receiver<Availability>,
}

impl AvailabilityWatch {
	/// A watch that never changes from `availability`.
	pub fn fixed(availability: Availability) -> Self {
		let (_tx, rx) = watch::channel(availability);
		Self { rx }
	}

	/// Current value, marking it as seen.
	pub fn current(&mut self) -> Availability {
		*self.rx.borrow_and_update()
	}

	/// Waits for the next published change.
	///
	/// Returns `None` once the publisher is gone and no change is pending.
	pub async fn changed(&mut self) -> Option<Availability> {
		self.rx.changed().await.ok()?;
		Some(*self.rx.borrow_and_update())
	}
}
