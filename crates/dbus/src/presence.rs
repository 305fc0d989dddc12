use futures::StreamExt;
use menubridge::{Availability, AvailabilityPublisher, AvailabilityWatch};
use menubridge_worker::{GenerationToken, TaskClass};
use tracing::{debug, info, warn};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;

/// Spawns a task mirroring ownership of `service` into the returned watch.
///
/// The watch starts at [`Availability::Unknown`] and closes when the relay
/// stops, either through `scope` or because the bus went away.
pub(crate) fn spawn_relay(conn: zbus::Connection, service: String, scope: GenerationToken) -> AvailabilityWatch {
	let publisher = AvailabilityPublisher::new();
	let watch = publisher.subscribe();
	menubridge_worker::spawn_cancellable(TaskClass::Relay, scope, async move {
		if let Err(err) = relay(&conn, &service, &publisher).await {
			warn!(service, error = %err, "dbus.presence.failed");
		}
	});
	watch
}

async fn relay(conn: &zbus::Connection, service: &str, publisher: &AvailabilityPublisher) -> zbus::Result<()> {
	let name = BusName::try_from(service)?;
	let dbus = DBusProxy::new(conn).await?;
	// Subscribe before asking, so an owner change between the two is not lost.
	// The match rule on arg0 keeps unrelated name changes off this connection.
	let mut changes = dbus.receive_name_owner_changed_with_args(&owner_changed_filter(service)).await?;

	let present = dbus.name_has_owner(name).await?;
	publisher.publish(Availability::from_present(present));
	debug!(service, present, "dbus.presence.initial");

	while let Some(signal) = changes.next().await {
		let Ok(args) = signal.args() else {
			continue;
		};
		if args.name().as_str() != service {
			continue;
		}
		let present = args.new_owner().is_some();
		if publisher.publish(Availability::from_present(present)) {
			info!(service, present, "dbus.presence.changed");
		}
	}
	Ok(())
}

/// Match-rule arguments selecting `NameOwnerChanged` for `service` only (arg0 is the name).
fn owner_changed_filter(service: &str) -> [(u8, &str); 1] {
	[(0, service)]
}
