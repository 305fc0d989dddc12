use menubridge::TransportError;
use zbus::DBusError;

/// Error names meaning "nobody answered", as opposed to "the registrar said no".
const TRANSIENT_ERROR_NAMES: &[&str] = &[
	"org.freedesktop.DBus.Error.ServiceUnknown",
	"org.freedesktop.DBus.Error.NameHasNoOwner",
	"org.freedesktop.DBus.Error.NoReply",
	"org.freedesktop.DBus.Error.Timeout",
	"org.freedesktop.DBus.Error.TimedOut",
	"org.freedesktop.DBus.Error.Disconnected",
	"org.freedesktop.DBus.Error.NoServer",
];

/// Classifies a D-Bus error reply to `method`.
pub fn classify_error_reply(method: &'static str, name: &str, message: String) -> TransportError {
	if TRANSIENT_ERROR_NAMES.contains(&name) {
		TransportError::Unavailable(format!("{name}: {message}"))
	} else {
		TransportError::Rejected {
			method,
			name: name.to_owned(),
			message,
		}
	}
}

pub(crate) fn classify(method: &'static str, err: zbus::Error) -> TransportError {
	match err {
		zbus::Error::MethodError(name, message, _) => classify_error_reply(method, name.as_str(), message.unwrap_or_default()),
		zbus::Error::FDO(fdo) => {
			let name = fdo.name().to_string();
			let message = fdo.description().unwrap_or_default().to_owned();
			classify_error_reply(method, &name, message)
		}
		// Socket, handshake and serialization failures: the bus itself is unusable.
		other => TransportError::Unavailable(other.to_string()),
	}
}
