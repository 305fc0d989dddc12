//! Registration lifecycle for every window of the process.
//!
//! [`Bridge`] is a plain state machine owned by the supervisor actor. It never
//! awaits: remote calls and retry timers run in spawned tasks, each bound to
//! the entry generation that started it, and report back through
//! [`Completion`] messages. A completion whose generation is no longer current
//! is dropped, which is how unregistration and registrar loss invalidate work
//! that is already in flight.

mod entry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use menubridge_worker::{Backoff, Generation, TaskClass};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::{
	Availability, BridgeConfig, BridgeError, EntryEvent, EntrySnapshot, EntryState, MenuObjectPath, RegistrarAddress, RegistrarCall,
	RegistrarTransport, Result, TransportError, WindowHandle,
};
pub(crate) use entry::RegistrationEntry;

/// Result of spawned work, routed back to the owning actor.
#[derive(Debug)]
pub(crate) enum Completion {
	Registered {
		handle: WindowHandle,
		generation: Generation,
		result: Result<(), TransportError>,
	},
	Unregistered {
		handle: WindowHandle,
		generation: Generation,
	},
	RetryDue {
		handle: WindowHandle,
		generation: Generation,
	},
}

pub(crate) struct Bridge {
	transport: Arc<dyn RegistrarTransport>,
	address: Arc<RegistrarAddress>,
	backoff: Backoff,
	call_timeout: Duration,
	availability: Availability,
	entries: HashMap<WindowHandle, RegistrationEntry>,
	completions: mpsc::UnboundedSender<Completion>,
	events: broadcast::Sender<EntryEvent>,
}

impl Bridge {
	pub(crate) fn new(
		transport: Arc<dyn RegistrarTransport>,
		config: &BridgeConfig,
		completions: mpsc::UnboundedSender<Completion>,
		events: broadcast::Sender<EntryEvent>,
	) -> Self {
		Self {
			transport,
			address: Arc::new(config.registrar.clone()),
			backoff: config.retry.backoff(),
			call_timeout: config.call_timeout(),
			availability: Availability::Unknown,
			entries: HashMap::new(),
			completions,
			events,
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub(crate) fn snapshot(&self, handle: WindowHandle) -> Option<EntrySnapshot> {
		self.entries.get(&handle).map(RegistrationEntry::snapshot)
	}

	/// Snapshots of all entries, ordered by handle.
	pub(crate) fn snapshots(&self) -> Vec<EntrySnapshot> {
		let mut snapshots: Vec<_> = self.entries.values().map(RegistrationEntry::snapshot).collect();
		snapshots.sort_by_key(|s| s.handle);
		snapshots
	}

	/// Creates a `Pending` entry and issues its registration.
	///
	/// Fails with [`BridgeError::AlreadyRegistered`] if the handle has a live
	/// entry. An entry that is still unregistering is not live: the request is
	/// queued behind the unregister call and the returned snapshot describes
	/// the entry that will replace it.
	pub(crate) fn register(&mut self, handle: WindowHandle, menu_path: MenuObjectPath) -> Result<EntrySnapshot> {
		if let Some(entry) = self.entries.get_mut(&handle) {
			if entry.state != EntryState::Unregistering {
				return Err(BridgeError::AlreadyRegistered(handle));
			}
			debug!(window = %handle, menu = %menu_path, "bridge.entry.requeue");
			entry.requeued = Some(menu_path.clone());
			return Ok(RegistrationEntry::new(handle, menu_path).snapshot());
		}

		let entry = RegistrationEntry::new(handle, menu_path);
		let snapshot = entry.snapshot();
		self.entries.insert(handle, entry);
		emit(&self.events, EntryEvent::Changed(snapshot.clone()));
		self.issue(handle);
		Ok(snapshot)
	}

	/// Starts unregistering `handle`. Unknown handles are ignored.
	pub(crate) fn unregister(&mut self, handle: WindowHandle) {
		let Some(entry) = self.entries.get_mut(&handle) else {
			trace!(window = %handle, "bridge.entry.unregister_unknown");
			return;
		};
		entry.requeued = None;
		if entry.state == EntryState::Unregistering {
			return;
		}

		let generation = entry.clock.advance();
		entry.in_flight = false;
		entry.set_state(EntryState::Unregistering);
		emit(&self.events, EntryEvent::Changed(entry.snapshot()));

		if self.availability == Availability::Absent {
			debug!(window = %handle, "bridge.entry.unregister_skipped");
			self.remove(handle);
			return;
		}

		let call = RegistrarCall::UnregisterWindow { window: handle };
		let transport = Arc::clone(&self.transport);
		let address = Arc::clone(&self.address);
		let timeout = self.call_timeout;
		let completions = self.completions.clone();
		menubridge_worker::spawn_cancellable(TaskClass::RemoteCall, entry.clock.token(), async move {
			match call_with_timeout(transport.as_ref(), &address, &call, timeout).await {
				Ok(()) => debug!(window = %handle, "bridge.entry.unregistered"),
				Err(err) => debug!(window = %handle, error = %err, "bridge.entry.unregister_failed"),
			}
			let _ = completions.send(Completion::Unregistered { handle, generation });
		});
	}

	/// Unregisters every entry. Queued re-registrations are dropped.
	pub(crate) fn unregister_all(&mut self) {
		let mut handles: Vec<_> = self.entries.keys().copied().collect();
		handles.sort_unstable();
		for handle in handles {
			self.unregister(handle);
		}
	}

	/// Re-issues a `Failed` entry on explicit request from the application.
	pub(crate) fn retry(&mut self, handle: WindowHandle) -> Option<EntrySnapshot> {
		let entry = self.entries.get_mut(&handle)?;
		if entry.state == EntryState::Failed {
			entry.retry_count = 0;
			self.issue(handle);
		}
		self.snapshot(handle)
	}

	pub(crate) fn on_availability_changed(&mut self, availability: Availability) {
		let previous = std::mem::replace(&mut self.availability, availability);
		if previous == availability {
			return;
		}
		info!(?previous, current = ?availability, entries = self.entries.len(), "bridge.registrar.availability");

		match availability {
			Availability::Present => {
				// Only a registrar that came back from absence may accept what it rejected before.
				let restarted = previous == Availability::Absent;
				let mut handles: Vec<_> = self
					.entries
					.values_mut()
					.filter(|e| match e.state {
						// An attempt already on the wire will report back on its own.
						EntryState::Pending => !e.in_flight,
						EntryState::Failed => restarted || e.last_error.as_ref().is_none_or(TransportError::is_transient),
						EntryState::Registered | EntryState::Unregistering => false,
					})
					.map(|e| {
						e.retry_count = 0;
						e.handle
					})
					.collect();
				handles.sort_unstable();
				for handle in handles {
					self.issue(handle);
				}
			}
			Availability::Absent => {
				for entry in self.entries.values_mut() {
					if entry.state == EntryState::Unregistering {
						continue;
					}
					entry.clock.advance();
					entry.in_flight = false;
					// Failed entries keep their state; only their timers stop.
					if entry.state == EntryState::Registered && entry.set_state(EntryState::Pending) {
						emit(&self.events, EntryEvent::Changed(entry.snapshot()));
					}
				}
			}
			Availability::Unknown => {}
		}
	}

	pub(crate) fn on_completion(&mut self, completion: Completion) {
		match completion {
			Completion::Registered { handle, generation, result } => self.on_register_finished(handle, generation, result),
			Completion::Unregistered { handle, generation } => {
				if self.is_current(handle, generation, EntryState::Unregistering) {
					self.remove(handle);
				}
			}
			Completion::RetryDue { handle, generation } => {
				if self.is_current(handle, generation, EntryState::Failed) {
					self.issue(handle);
				}
			}
		}
	}

	/// Cancels all outstanding work and forgets every entry. Returns how many were dropped.
	pub(crate) fn abandon(&mut self) -> usize {
		let abandoned = self.entries.len();
		for (handle, entry) in self.entries.drain() {
			entry.clock.cancel();
			emit(&self.events, EntryEvent::Removed(handle));
		}
		abandoned
	}

	pub(crate) async fn close_transport(&self) {
		self.transport.close().await;
	}

	fn is_current(&self, handle: WindowHandle, generation: Generation, state: EntryState) -> bool {
		let current = self
			.entries
			.get(&handle)
			.is_some_and(|e| e.clock.is_current(generation) && e.state == state);
		if !current {
			trace!(window = %handle, %generation, "bridge.entry.stale_completion");
		}
		current
	}

	/// Moves a `Pending`/`Failed` entry into a fresh attempt.
	///
	/// While the registrar is known to be absent the entry is parked in
	/// `Pending` without a call; the next `Present` observation issues it.
	fn issue(&mut self, handle: WindowHandle) {
		let Some(entry) = self.entries.get_mut(&handle) else {
			return;
		};
		if !matches!(entry.state, EntryState::Pending | EntryState::Failed) {
			return;
		}

		let generation = entry.clock.advance();
		entry.in_flight = false;
		if entry.set_state(EntryState::Pending) {
			emit(&self.events, EntryEvent::Changed(entry.snapshot()));
		}

		if self.availability == Availability::Absent {
			debug!(window = %handle, "bridge.entry.parked");
			return;
		}

		entry.in_flight = true;
		debug!(
			window = %handle,
			menu = %entry.menu_path,
			%generation,
			retries = entry.retry_count,
			"bridge.entry.issue"
		);
		let call = RegistrarCall::RegisterWindow {
			window: handle,
			menu_path: entry.menu_path.clone(),
		};
		let transport = Arc::clone(&self.transport);
		let address = Arc::clone(&self.address);
		let timeout = self.call_timeout;
		let completions = self.completions.clone();
		menubridge_worker::spawn_cancellable(TaskClass::RemoteCall, entry.clock.token(), async move {
			let result = call_with_timeout(transport.as_ref(), &address, &call, timeout).await;
			let _ = completions.send(Completion::Registered { handle, generation, result });
		});
	}

	fn on_register_finished(&mut self, handle: WindowHandle, generation: Generation, result: Result<(), TransportError>) {
		if !self.is_current(handle, generation, EntryState::Pending) {
			return;
		}
		let Some(entry) = self.entries.get_mut(&handle) else {
			return;
		};
		entry.in_flight = false;

		match result {
			Ok(()) => {
				entry.retry_count = 0;
				entry.last_error = None;
				entry.set_state(EntryState::Registered);
				info!(window = %handle, menu = %entry.menu_path, "bridge.entry.registered");
			}
			Err(err) if err.is_transient() => {
				let delay = self.backoff.delay(entry.retry_count);
				entry.retry_count = entry.retry_count.saturating_add(1);
				debug!(window = %handle, error = %err, retry_in = ?delay, retries = entry.retry_count, "bridge.entry.retry_scheduled");
				entry.last_error = Some(err);
				entry.set_state(EntryState::Failed);

				let completions = self.completions.clone();
				menubridge_worker::spawn_after(TaskClass::Timer, entry.clock.token(), delay, async move {
					let _ = completions.send(Completion::RetryDue { handle, generation });
				});
			}
			Err(err) => {
				warn!(window = %handle, menu = %entry.menu_path, error = %err, "bridge.entry.rejected");
				entry.last_error = Some(err);
				entry.set_state(EntryState::Failed);
			}
		}
		emit(&self.events, EntryEvent::Changed(entry.snapshot()));
	}

	fn remove(&mut self, handle: WindowHandle) {
		let Some(entry) = self.entries.remove(&handle) else {
			return;
		};
		entry.clock.cancel();
		debug!(window = %handle, "bridge.entry.removed");
		emit(&self.events, EntryEvent::Removed(handle));

		if let Some(menu_path) = entry.requeued {
			if let Err(err) = self.register(handle, menu_path) {
				warn!(window = %handle, error = %err, "bridge.entry.requeue_failed");
			}
		}
	}
}

fn emit(events: &broadcast::Sender<EntryEvent>, event: EntryEvent) {
	let _ = events.send(event);
}

async fn call_with_timeout(
	transport: &dyn RegistrarTransport,
	address: &RegistrarAddress,
	call: &RegistrarCall,
	timeout: Duration,
) -> Result<(), TransportError> {
	match tokio::time::timeout(timeout, transport.call(address, call)).await {
		Ok(result) => result,
		Err(_) => Err(TransportError::Timeout(timeout)),
	}
}

#[cfg(test)]
mod tests;
