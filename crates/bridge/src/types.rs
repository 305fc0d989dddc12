//! Identifiers and entry state shared across the bridge.

use std::fmt;

use crate::{BridgeError, Result, TransportError};

/// Window identifier as sent to the registrar (`uint32` on the wire).
///
/// For X11 this is the window XID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowHandle(u32);

impl WindowHandle {
	/// Wraps a raw window id.
	pub const fn new(id: u32) -> Self {
		Self(id)
	}

	/// Raw window id.
	pub const fn get(self) -> u32 {
		self.0
	}
}

impl From<u32> for WindowHandle {
	fn from(id: u32) -> Self {
		Self(id)
	}
}

impl fmt::Display for WindowHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Validated D-Bus object path of an exported menu.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MenuObjectPath(String);

impl MenuObjectPath {
	/// Validates `path` against the D-Bus object path grammar.
	pub fn new(path: impl Into<String>) -> Result<Self> {
		let path = path.into();
		if is_valid_object_path(&path) {
			Ok(Self(path))
		} else {
			Err(BridgeError::InvalidMenuPath(path))
		}
	}

	/// Builds a per-window path by substituting `{id}` in `template`.
	pub fn from_template(template: &str, handle: WindowHandle) -> Result<Self> {
		Self::new(template.replace("{id}", &handle.to_string()))
	}

	/// The path as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for MenuObjectPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl TryFrom<&str> for MenuObjectPath {
	type Error = BridgeError;

	fn try_from(path: &str) -> Result<Self> {
		Self::new(path)
	}
}

pub(crate) fn is_valid_object_path(path: &str) -> bool {
	if path == "/" {
		return true;
	}
	let Some(rest) = path.strip_prefix('/') else {
		return false;
	};
	rest.split('/')
		.all(|element| !element.is_empty() && element.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
}

/// Lifecycle state of one registration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
	/// Waiting for a registration call to be issued or to complete.
	Pending,
	/// The registrar accepted the registration.
	Registered,
	/// The last attempt failed; see [`EntrySnapshot::last_error`].
	Failed,
	/// Unregistration is in flight; the entry is removed when it finishes.
	Unregistering,
}

impl EntryState {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Registered => "registered",
			Self::Failed => "failed",
			Self::Unregistering => "unregistering",
		}
	}
}

impl fmt::Display for EntryState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time copy of a registration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
	pub handle: WindowHandle,
	pub menu_path: MenuObjectPath,
	pub state: EntryState,
	/// Consecutive transient failures since the last success or reset.
	pub retry_count: u32,
	pub last_error: Option<TransportError>,
}

/// Entry change notification delivered to [`crate::BridgeSupervisor::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent {
	/// The entry was created or changed state.
	Changed(EntrySnapshot),
	/// The entry was discarded.
	Removed(WindowHandle),
}

impl EntryEvent {
	/// Window this event refers to.
	pub fn handle(&self) -> WindowHandle {
		match self {
			Self::Changed(snapshot) => snapshot.handle,
			Self::Removed(handle) => *handle,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_path_grammar() {
		for ok in ["/", "/app/menu", "/com/canonical/menu/1A2b", "/MenuBar/window_42"] {
			assert!(MenuObjectPath::new(ok).is_ok(), "{ok} should be valid");
		}
		for bad in ["", "app/menu", "/app/", "//app", "/app//menu", "/app-menu", "/app/menü", "/a.b"] {
			assert!(
				matches!(MenuObjectPath::new(bad), Err(BridgeError::InvalidMenuPath(p)) if p == bad),
				"{bad:?} should be rejected"
			);
		}
	}

	#[test]
	fn template_substitutes_window_id() {
		let path = MenuObjectPath::from_template("/com/example/MenuBar/{id}", WindowHandle::new(8388621)).unwrap();
		assert_eq!(path.as_str(), "/com/example/MenuBar/8388621");
	}
}
