//! The seam between the bridge and the message bus.

use std::time::Duration;

use async_trait::async_trait;

use crate::{AvailabilityWatch, MenuObjectPath, RegistrarAddress, WindowHandle};

/// One remote method call on the registrar interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarCall {
	/// `RegisterWindow(u windowId, o menuObjectPath)`.
	RegisterWindow { window: WindowHandle, menu_path: MenuObjectPath },
	/// `UnregisterWindow(u windowId)`.
	UnregisterWindow { window: WindowHandle },
}

impl RegistrarCall {
	/// Member name on the registrar interface.
	pub const fn method(&self) -> &'static str {
		match self {
			Self::RegisterWindow { .. } => "RegisterWindow",
			Self::UnregisterWindow { .. } => "UnregisterWindow",
		}
	}

	/// Window the call refers to.
	pub const fn window(&self) -> WindowHandle {
		match self {
			Self::RegisterWindow { window, .. } | Self::UnregisterWindow { window } => *window,
		}
	}
}

/// Failure of a single registrar call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The registrar or the bus could not be reached.
	#[error("registrar unavailable: {0}")]
	Unavailable(String),
	/// No reply arrived within the call timeout.
	#[error("registrar call timed out after {0:?}")]
	Timeout(Duration),
	/// The registrar answered with an error reply.
	#[error("registrar rejected {method}: {name}: {message}")]
	Rejected {
		method: &'static str,
		name: String,
		message: String,
	},
}

impl TransportError {
	/// Transient errors are retried; rejections are not.
	pub const fn is_transient(&self) -> bool {
		!matches!(self, Self::Rejected { .. })
	}
}

/// Bus client able to call the registrar and observe its presence.
///
/// Implementations must tolerate concurrent calls; the bridge issues calls
/// for different windows from independent tasks.
#[async_trait]
pub trait RegistrarTransport: Send + Sync + 'static {
	/// Invokes `call` on the registrar at `address`.
	async fn call(&self, address: &RegistrarAddress, call: &RegistrarCall) -> Result<(), TransportError>;

	/// Subscribes to presence of the bus name `service`.
	fn watch_presence(&self, service: &str) -> AvailabilityWatch;

	/// Releases the underlying connection.
	async fn close(&self) {}
}
