//! Process-wide front door for hosting applications.
//!
//! [`BridgeSupervisor`] is a cheap, cloneable handle to one actor task that
//! owns the [`Bridge`]. Every request goes through the actor's bounded
//! command queue and is handled in arrival order, so concurrent calls for the
//! same window are linearized without any lock around the entry map.
//! Registrar availability is observed inside the same loop, straight off the
//! transport's watch channel.

use std::sync::Arc;
use std::time::Duration;

use menubridge_worker::TaskClass;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, Completion};
use crate::{
	AvailabilityWatch, BridgeConfig, BridgeError, EntryEvent, EntrySnapshot, EntryState, MenuObjectPath, RegistrarTransport, Result,
	WindowEvent, WindowHandle,
};

enum Command {
	Register {
		handle: WindowHandle,
		menu_path: MenuObjectPath,
		reply: oneshot::Sender<Result<EntrySnapshot>>,
	},
	Destroyed {
		handle: WindowHandle,
		reply: oneshot::Sender<()>,
	},
	Retry {
		handle: WindowHandle,
		reply: oneshot::Sender<Option<EntrySnapshot>>,
	},
	Entry {
		handle: WindowHandle,
		reply: oneshot::Sender<Option<EntrySnapshot>>,
	},
	Entries {
		reply: oneshot::Sender<Vec<EntrySnapshot>>,
	},
	Shutdown {
		reply: oneshot::Sender<ShutdownReport>,
	},
}

/// Outcome of [`BridgeSupervisor::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
	requested: usize,
	abandoned: usize,
	timeout: Duration,
}

impl ShutdownReport {
	/// Entries live when shutdown began.
	pub fn requested(&self) -> usize {
		self.requested
	}

	/// Entries whose unregistration finished within the budget.
	pub fn unregistered(&self) -> usize {
		self.requested - self.abandoned
	}

	/// Entries dropped when the budget ran out.
	pub fn abandoned(&self) -> usize {
		self.abandoned
	}

	pub fn completed(&self) -> bool {
		self.abandoned == 0
	}

	pub fn timed_out(&self) -> bool {
		self.abandoned > 0
	}

	/// The timeout expressed as the error it stands for, if any.
	pub fn error(&self) -> Option<BridgeError> {
		self.timed_out().then_some(BridgeError::ShutdownTimeout {
			pending: self.abandoned,
			timeout: self.timeout,
		})
	}
}

/// Handle to the registration actor.
///
/// Dropping the last handle shuts the actor down the same way
/// [`Self::shutdown`] does.
#[derive(Debug, Clone)]
pub struct BridgeSupervisor {
	tx: mpsc::Sender<Command>,
	events: broadcast::Sender<EntryEvent>,
}

impl BridgeSupervisor {
	/// Validates `config` and spawns the actor on the current Tokio runtime.
	pub fn start(transport: Arc<dyn RegistrarTransport>, config: BridgeConfig) -> Result<Self> {
		config.validate()?;

		let (tx, rx) = mpsc::channel(config.mailbox_capacity);
		let (events, _) = broadcast::channel(config.event_buffer);
		let (completions_tx, completions_rx) = mpsc::unbounded_channel();
		let availability = transport.watch_presence(&config.registrar.service);
		let bridge = Bridge::new(transport, &config, completions_tx, events.clone());

		info!(
			service = %config.registrar.service,
			path = %config.registrar.path,
			"bridge.supervisor.start"
		);
		menubridge_worker::spawn(
			TaskClass::Actor,
			run_actor(bridge, rx, completions_rx, availability, config.shutdown_timeout()),
		);

		Ok(Self { tx, events })
	}

	/// Registers `handle` with `menu_path`, or returns its existing entry.
	///
	/// Returns as soon as the entry exists; the remote call completes in the
	/// background. A second call for a live handle returns the existing entry
	/// unchanged, even if `menu_path` differs.
	pub async fn register_window(&self, handle: WindowHandle, menu_path: MenuObjectPath) -> Result<EntrySnapshot> {
		self.request(|reply| Command::Register { handle, menu_path, reply }).await?
	}

	/// Unregisters `handle` and discards its entry. Unknown handles are ignored.
	///
	/// Must be called from the window's destruction notification.
	pub async fn on_window_destroyed(&self, handle: WindowHandle) -> Result<()> {
		self.request(|reply| Command::Destroyed { handle, reply }).await
	}

	/// Re-issues an entry parked in `Failed` after a rejection.
	pub async fn retry_window(&self, handle: WindowHandle) -> Result<Option<EntrySnapshot>> {
		self.request(|reply| Command::Retry { handle, reply }).await
	}

	pub async fn entry(&self, handle: WindowHandle) -> Result<Option<EntrySnapshot>> {
		self.request(|reply| Command::Entry { handle, reply }).await
	}

	/// All entries, ordered by handle.
	pub async fn entries(&self) -> Result<Vec<EntrySnapshot>> {
		self.request(|reply| Command::Entries { reply }).await
	}

	/// Subscribes to entry state changes.
	pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
		self.events.subscribe()
	}

	/// Drives registrations from a window lifecycle stream until it ends.
	///
	/// `menu_for` maps a created window to its menu path; windows it returns
	/// `None` for are not registered.
	pub async fn follow<F>(&self, mut events: mpsc::Receiver<WindowEvent>, mut menu_for: F) -> Result<()>
	where
		F: FnMut(WindowHandle) -> Option<MenuObjectPath>,
	{
		while let Some(event) = events.recv().await {
			match event {
				WindowEvent::Created(handle) => match menu_for(handle) {
					Some(menu_path) => {
						self.register_window(handle, menu_path).await?;
					}
					None => debug!(window = %handle, "bridge.supervisor.no_menu"),
				},
				WindowEvent::Destroyed(handle) => self.on_window_destroyed(handle).await?,
			}
		}
		Ok(())
	}

	/// Unregisters every entry within the configured budget and releases the transport.
	///
	/// A timeout is logged and reported, never raised. Calling this on a
	/// stopped supervisor returns an empty report.
	pub async fn shutdown(&self) -> ShutdownReport {
		self.request(|reply| Command::Shutdown { reply }).await.unwrap_or_default()
	}

	async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
		let (reply, rx) = oneshot::channel();
		self.tx.send(make(reply)).await.map_err(|_| BridgeError::Stopped)?;
		rx.await.map_err(|_| BridgeError::Stopped)
	}
}

async fn run_actor(
	mut bridge: Bridge,
	mut commands: mpsc::Receiver<Command>,
	mut completions: mpsc::UnboundedReceiver<Completion>,
	mut availability: AvailabilityWatch,
	shutdown_timeout: Duration,
) {
	bridge.on_availability_changed(availability.current());
	let mut watching = true;

	loop {
		tokio::select! {
			biased;
			Some(done) = completions.recv() => bridge.on_completion(done),
			changed = availability.changed(), if watching => match changed {
				Some(current) => bridge.on_availability_changed(current),
				None => {
					debug!("bridge.registrar.watch_closed");
					watching = false;
				}
			},
			cmd = commands.recv() => {
				let Some(cmd) = cmd else {
					debug!("bridge.supervisor.detached");
					shutdown(&mut bridge, &mut completions, shutdown_timeout).await;
					return;
				};
				match cmd {
					Command::Register { handle, menu_path, reply } => {
						let _ = reply.send(register_idempotent(&mut bridge, handle, menu_path));
					}
					Command::Destroyed { handle, reply } => {
						bridge.unregister(handle);
						let _ = reply.send(());
					}
					Command::Retry { handle, reply } => {
						let _ = reply.send(bridge.retry(handle));
					}
					Command::Entry { handle, reply } => {
						let _ = reply.send(bridge.snapshot(handle));
					}
					Command::Entries { reply } => {
						let _ = reply.send(bridge.snapshots());
					}
					Command::Shutdown { reply } => {
						let report = shutdown(&mut bridge, &mut completions, shutdown_timeout).await;
						let _ = reply.send(report);
						return;
					}
				}
			}
		}
	}
}

fn register_idempotent(bridge: &mut Bridge, handle: WindowHandle, menu_path: MenuObjectPath) -> Result<EntrySnapshot> {
	match bridge.snapshot(handle) {
		Some(existing) if existing.state != EntryState::Unregistering => {
			if existing.menu_path != menu_path {
				warn!(
					window = %handle,
					current = %existing.menu_path,
					requested = %menu_path,
					"bridge.supervisor.menu_path_ignored"
				);
			}
			Ok(existing)
		}
		_ => bridge.register(handle, menu_path),
	}
}

async fn shutdown(bridge: &mut Bridge, completions: &mut mpsc::UnboundedReceiver<Completion>, timeout: Duration) -> ShutdownReport {
	let requested = bridge.len();
	bridge.unregister_all();

	let deadline = Instant::now() + timeout;
	while !bridge.is_empty() {
		match tokio::time::timeout_at(deadline, completions.recv()).await {
			Ok(Some(done)) => bridge.on_completion(done),
			Ok(None) | Err(_) => break,
		}
	}

	let abandoned = bridge.abandon();
	let report = ShutdownReport {
		requested,
		abandoned,
		timeout,
	};
	if let Some(err) = report.error() {
		warn!(error = %err, "bridge.supervisor.shutdown_timeout");
	}
	bridge.close_transport().await;
	info!(requested, abandoned, "bridge.supervisor.stopped");
	report
}
