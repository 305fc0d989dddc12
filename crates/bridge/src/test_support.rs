//! In-memory registrar transport for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{Availability, AvailabilityPublisher, AvailabilityWatch, RegistrarAddress, RegistrarCall, RegistrarTransport, TransportError};

/// Records every call and answers according to its own presence flag.
///
/// Calls made while the mock is not `Present` fail with a transient error,
/// just like a bus call to a name without an owner, unless
/// [`Self::answer_regardless_of_presence`] decoupled the two.
pub(crate) struct MockTransport {
	publisher: AvailabilityPublisher,
	log: Mutex<Vec<(Instant, RegistrarCall)>>,
	rejected: Mutex<HashSet<String>>,
	register_delay: Mutex<Duration>,
	unregister_delay: Mutex<Duration>,
	/// Answer calls even while the published availability is not `Present`.
	decoupled: AtomicBool,
	closed: AtomicBool,
}

impl MockTransport {
	pub(crate) fn new(availability: Availability) -> Arc<Self> {
		let publisher = AvailabilityPublisher::new();
		publisher.publish(availability);
		Arc::new(Self {
			publisher,
			log: Mutex::new(Vec::new()),
			rejected: Mutex::new(HashSet::new()),
			register_delay: Mutex::new(Duration::ZERO),
			unregister_delay: Mutex::new(Duration::ZERO),
			decoupled: AtomicBool::new(false),
			closed: AtomicBool::new(false),
		})
	}

	pub(crate) fn set_availability(&self, availability: Availability) {
		self.publisher.publish(availability);
	}

	/// Replies as a reachable registrar whatever the presence watch says.
	pub(crate) fn answer_regardless_of_presence(&self) {
		self.decoupled.store(true, Ordering::SeqCst);
	}

	pub(crate) fn reject(&self, path: &str) {
		self.rejected.lock().unwrap().insert(path.to_string());
	}

	pub(crate) fn allow(&self, path: &str) {
		self.rejected.lock().unwrap().remove(path);
	}

	pub(crate) fn delay_register(&self, delay: Duration) {
		*self.register_delay.lock().unwrap() = delay;
	}

	pub(crate) fn delay_unregister(&self, delay: Duration) {
		*self.unregister_delay.lock().unwrap() = delay;
	}

	pub(crate) fn calls(&self) -> Vec<RegistrarCall> {
		self.log.lock().unwrap().iter().map(|(_, call)| call.clone()).collect()
	}

	pub(crate) fn methods(&self) -> Vec<&'static str> {
		self.log.lock().unwrap().iter().map(|(_, call)| call.method()).collect()
	}

	/// Start times of every `RegisterWindow` call.
	pub(crate) fn register_times(&self) -> Vec<Instant> {
		self.log
			.lock()
			.unwrap()
			.iter()
			.filter(|(_, call)| matches!(call, RegistrarCall::RegisterWindow { .. }))
			.map(|(at, _)| *at)
			.collect()
	}

	pub(crate) fn register_count(&self) -> usize {
		self.register_times().len()
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RegistrarTransport for MockTransport {
	async fn call(&self, _address: &RegistrarAddress, call: &RegistrarCall) -> Result<(), TransportError> {
		self.log.lock().unwrap().push((Instant::now(), call.clone()));

		let delay = match call {
			RegistrarCall::RegisterWindow { .. } => *self.register_delay.lock().unwrap(),
			RegistrarCall::UnregisterWindow { .. } => *self.unregister_delay.lock().unwrap(),
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		if !self.decoupled.load(Ordering::SeqCst) && self.publisher.current() != Availability::Present {
			return Err(TransportError::Unavailable("org.freedesktop.DBus.Error.ServiceUnknown".into()));
		}
		if let RegistrarCall::RegisterWindow { menu_path, .. } = call {
			if self.rejected.lock().unwrap().contains(menu_path.as_str()) {
				return Err(TransportError::Rejected {
					method: call.method(),
					name: "com.canonical.AppMenu.Registrar.Error".into(),
					message: format!("object path {menu_path} already registered"),
				});
			}
		}
		Ok(())
	}

	fn watch_presence(&self, _service: &str) -> AvailabilityWatch {
		self.publisher.subscribe()
	}

	async fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}
