use menubridge_worker::GenerationClock;
use tracing::debug;

use crate::{EntrySnapshot, EntryState, MenuObjectPath, TransportError, WindowHandle};

/// Mutable registration state for one window. Owned by [`super::Bridge`].
#[derive(Debug)]
pub(crate) struct RegistrationEntry {
	pub(crate) handle: WindowHandle,
	pub(crate) menu_path: MenuObjectPath,
	pub(crate) state: EntryState,
	pub(crate) retry_count: u32,
	pub(crate) last_error: Option<TransportError>,
	/// A register call for the current generation has not completed yet.
	pub(crate) in_flight: bool,
	/// Registration requested while unregistering; replayed after removal.
	pub(crate) requeued: Option<MenuObjectPath>,
	/// Advancing cancels every timer and call spawned for the old generation.
	pub(crate) clock: GenerationClock,
}

impl RegistrationEntry {
	pub(crate) fn new(handle: WindowHandle, menu_path: MenuObjectPath) -> Self {
		Self {
			handle,
			menu_path,
			state: EntryState::Pending,
			retry_count: 0,
			last_error: None,
			in_flight: false,
			requeued: None,
			clock: GenerationClock::new(),
		}
	}

	pub(crate) fn snapshot(&self) -> EntrySnapshot {
		EntrySnapshot {
			handle: self.handle,
			menu_path: self.menu_path.clone(),
			state: self.state,
			retry_count: self.retry_count,
			last_error: self.last_error.clone(),
		}
	}

	/// Returns whether the state actually changed.
	pub(crate) fn set_state(&mut self, state: EntryState) -> bool {
		if self.state == state {
			return false;
		}
		debug!(
			window = %self.handle,
			from = self.state.as_str(),
			to = state.as_str(),
			generation = self.clock.current().get(),
			"bridge.entry.state"
		);
		self.state = state;
		true
	}
}
