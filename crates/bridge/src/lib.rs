//! Registration bridge between application windows and a global menu registrar.
//!
//! A desktop shell displays a window's menu bar out-of-process by asking a
//! registrar service (`com.canonical.AppMenu.Registrar` on the session bus)
//! which exported menu object belongs to which window. This crate owns the
//! application side of that relationship:
//!
//! - [`BridgeSupervisor`]: the entry point for hosting applications. Runs a
//!   single actor task which serializes every registration for the process.
//! - [`RegistrarTransport`]: the seam to the bus. `menubridge-dbus` provides
//!   the zbus implementation.
//! - [`AvailabilityPublisher`] / [`AvailabilityWatch`]: the single-writer
//!   observation of whether the registrar currently owns its bus name.
//!
//! Registrations survive registrar restarts: when the registrar disappears,
//! registered windows fall back to `Pending` and are re-registered as soon as
//! it returns. Transient failures are retried with bounded exponential
//! backoff and are never reported to the caller; semantic rejections park the
//! entry in `Failed` until the application asks for a retry.
//!
//! Menu contents are not handled here. The application exports its menu
//! object separately and passes its path in.

mod availability;
mod bridge;
mod config;
mod error;
mod supervisor;
mod transport;
mod types;
mod window;

#[cfg(test)]
mod test_support;

pub use availability::{Availability, AvailabilityPublisher, AvailabilityWatch};
pub use config::{BridgeConfig, ConfigError, RegistrarAddress, RetryConfig};
pub use error::{BridgeError, Result};
pub use supervisor::{BridgeSupervisor, ShutdownReport};
pub use transport::{RegistrarCall, RegistrarTransport, TransportError};
pub use types::{EntryEvent, EntrySnapshot, EntryState, MenuObjectPath, WindowHandle};
pub use window::{WindowEvent, WindowSize, WindowSource};
