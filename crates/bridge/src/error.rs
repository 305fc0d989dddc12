use std::time::Duration;

use crate::WindowHandle;
use crate::config::ConfigError;

/// A convenient type alias for `Result` with `E` = [`BridgeError`].
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Errors visible to the hosting application.
///
/// Transient transport failures never appear here; they are retried inside
/// the bridge and only observable through [`crate::EntrySnapshot::last_error`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BridgeError {
	/// An entry already exists for this window.
	#[error("window {0} is already registered")]
	AlreadyRegistered(WindowHandle),
	/// The string is not a valid D-Bus object path.
	#[error("invalid menu object path {0:?}")]
	InvalidMenuPath(String),
	/// The supervisor has shut down.
	#[error("bridge supervisor stopped")]
	Stopped,
	/// Best-effort unregistration did not finish within the shutdown budget.
	#[error("{pending} unregistration(s) still pending after {timeout:?}")]
	ShutdownTimeout {
		/// Entries abandoned when the deadline passed.
		pending: usize,
		/// The configured shutdown budget.
		timeout: Duration,
	},
	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
