//! Contract for the windowing side.

use tokio::sync::mpsc;

use crate::WindowHandle;

/// Requested window size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
	pub width: u32,
	pub height: u32,
}

impl WindowSize {
	pub const fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}
}

/// Window lifecycle notification.
///
/// A source delivers `Destroyed` exactly once per handle it announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
	Created(WindowHandle),
	Destroyed(WindowHandle),
}

/// A windowing toolkit adapter that issues window handles.
pub trait WindowSource {
	/// Toolkit-specific failure.
	type Error: std::error::Error + Send + Sync + 'static;

	/// Creates and maps a window, returning its handle once it has one.
	fn create_window(&mut self, title: &str, size: WindowSize) -> Result<WindowHandle, Self::Error>;

	/// Takes the lifecycle stream. Returns `None` if it was already taken.
	fn take_events(&mut self) -> Option<mpsc::Receiver<WindowEvent>>;
}
