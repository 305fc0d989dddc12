//! Bridge configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use menubridge_worker::Backoff;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::is_valid_object_path;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// TOML syntax or type error.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Bus coordinates of the registrar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrarAddress {
	/// Well-known bus name.
	pub service: String,
	/// Object path of the registrar object.
	pub path: String,
	/// Interface carrying `RegisterWindow`/`UnregisterWindow`.
	pub interface: String,
}

impl Default for RegistrarAddress {
	fn default() -> Self {
		Self {
			service: "com.canonical.AppMenu.Registrar".to_string(),
			path: "/com/canonical/AppMenu/Registrar".to_string(),
			interface: "com.canonical.AppMenu.Registrar".to_string(),
		}
	}
}

/// Backoff for transient registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
	/// First retry delay in milliseconds.
	pub base_ms: u64,
	/// Upper bound for any retry delay in milliseconds.
	pub cap_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			base_ms: 500,
			cap_ms: 30_000,
		}
	}
}

impl RetryConfig {
	/// Backoff policy described by this section.
	pub fn backoff(&self) -> Backoff {
		Backoff::new(Duration::from_millis(self.base_ms), Duration::from_millis(self.cap_ms))
	}
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
	pub registrar: RegistrarAddress,
	pub retry: RetryConfig,
	/// Per-call timeout in milliseconds.
	pub call_timeout_ms: u64,
	/// Total budget for unregistering everything on shutdown, in milliseconds.
	pub shutdown_timeout_ms: u64,
	/// Supervisor command queue capacity.
	pub mailbox_capacity: usize,
	/// Entry event broadcast capacity.
	pub event_buffer: usize,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			registrar: RegistrarAddress::default(),
			retry: RetryConfig::default(),
			call_timeout_ms: 5_000,
			shutdown_timeout_ms: 2_000,
			mailbox_capacity: 128,
			event_buffer: 128,
		}
	}
}

impl BridgeConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}

	/// Checks value ranges that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.retry.base_ms == 0 {
			return Err(ConfigError::Invalid("retry.base_ms must be > 0".into()));
		}
		if self.call_timeout_ms == 0 {
			return Err(ConfigError::Invalid("call_timeout_ms must be > 0".into()));
		}
		if self.mailbox_capacity == 0 || self.event_buffer == 0 {
			return Err(ConfigError::Invalid("mailbox_capacity and event_buffer must be > 0".into()));
		}
		if self.registrar.service.is_empty() || self.registrar.interface.is_empty() {
			return Err(ConfigError::Invalid("registrar service and interface must be set".into()));
		}
		if !is_valid_object_path(&self.registrar.path) {
			return Err(ConfigError::Invalid(format!("registrar.path {:?} is not an object path", self.registrar.path)));
		}
		Ok(())
	}

	/// Sets the retry backoff.
	#[must_use]
	pub fn with_retry(mut self, base: Duration, cap: Duration) -> Self {
		self.retry = RetryConfig {
			base_ms: duration_ms(base),
			cap_ms: duration_ms(cap),
		};
		self
	}

	/// Sets the per-call timeout.
	#[must_use]
	pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout_ms = duration_ms(timeout);
		self
	}

	/// Sets the shutdown budget.
	#[must_use]
	pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
		self.shutdown_timeout_ms = duration_ms(timeout);
		self
	}

	/// Sets the registrar coordinates.
	#[must_use]
	pub fn with_registrar(mut self, registrar: RegistrarAddress) -> Self {
		self.registrar = registrar;
		self
	}

	pub fn call_timeout(&self) -> Duration {
		Duration::from_millis(self.call_timeout_ms)
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}
}

fn duration_ms(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
