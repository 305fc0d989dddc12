/// Execution classes used to label spawned work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Long-lived supervising actor loops.
	Actor,
	/// One remote call to the registrar.
	RemoteCall,
	/// Delayed wakeups such as retry timers.
	Timer,
	/// Forwarders relaying notifications between channels.
	Relay,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Actor => "actor",
			Self::RemoteCall => "remote_call",
			Self::Timer => "timer",
			Self::Relay => "relay",
		}
	}
}
