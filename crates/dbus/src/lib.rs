//! Session bus transport for menubridge.
//!
//! [`ZbusTransport`] calls the registrar with `RegisterWindow(u, o)` and
//! `UnregisterWindow(u)`, and publishes its presence from `NameHasOwner` plus
//! `org.freedesktop.DBus.NameOwnerChanged`.

mod errors;
mod presence;

use async_trait::async_trait;
use menubridge::{AvailabilityWatch, RegistrarAddress, RegistrarCall, RegistrarTransport, TransportError};
use menubridge_worker::{Generation, GenerationToken};
use tracing::trace;
use zbus::zvariant::ObjectPath;

pub use errors::classify_error_reply;

/// [`RegistrarTransport`] over a zbus connection.
#[derive(Debug)]
pub struct ZbusTransport {
	conn: zbus::Connection,
	/// Scope of every presence relay spawned by this transport.
	relays: GenerationToken,
}

impl ZbusTransport {
	/// Connects to the session bus.
	pub async fn session() -> zbus::Result<Self> {
		Ok(Self::from_connection(zbus::Connection::session().await?))
	}

	/// Wraps an existing connection.
	pub fn from_connection(conn: zbus::Connection) -> Self {
		Self {
			conn,
			relays: GenerationToken::new(Generation::FIRST),
		}
	}

	/// Unique bus name of this connection, for diagnostics.
	pub fn unique_name(&self) -> Option<String> {
		self.conn.unique_name().map(|name| name.to_string())
	}
}

#[async_trait]
impl RegistrarTransport for ZbusTransport {
	async fn call(&self, address: &RegistrarAddress, call: &RegistrarCall) -> Result<(), TransportError> {
		let method = call.method();
		trace!(service = %address.service, method, window = %call.window(), "dbus.call");
		let reply = match call {
			RegistrarCall::RegisterWindow { window, menu_path } => {
				let menu_path = ObjectPath::try_from(menu_path.as_str()).map_err(|err| TransportError::Rejected {
					method,
					name: "org.freedesktop.DBus.Error.InvalidArgs".into(),
					message: err.to_string(),
				})?;
				self.conn
					.call_method(
						Some(address.service.as_str()),
						address.path.as_str(),
						Some(address.interface.as_str()),
						method,
						&(window.get(), menu_path),
					)
					.await
			}
			RegistrarCall::UnregisterWindow { window } => {
				self.conn
					.call_method(
						Some(address.service.as_str()),
						address.path.as_str(),
						Some(address.interface.as_str()),
						method,
						&(window.get(),),
					)
					.await
			}
		};
		reply.map(drop).map_err(|err| errors::classify(method, err))
	}

	fn watch_presence(&self, service: &str) -> AvailabilityWatch {
		presence::spawn_relay(self.conn.clone(), service.to_owned(), self.relays.clone())
	}

	async fn close(&self) {
		self.relays.cancel();
	}
}
