use std::time::Duration;

use super::*;
use crate::test_support::MockTransport;

struct Harness {
	bridge: Bridge,
	completions: mpsc::UnboundedReceiver<Completion>,
	events: broadcast::Receiver<EntryEvent>,
	transport: Arc<MockTransport>,
}

fn harness(availability: Availability) -> Harness {
	let transport = MockTransport::new(availability);
	let (tx, completions) = mpsc::unbounded_channel();
	let (events_tx, events) = broadcast::channel(64);
	let config = BridgeConfig::default().with_retry(Duration::from_millis(100), Duration::from_millis(800));
	let mut bridge = Bridge::new(transport.clone(), &config, tx, events_tx);
	bridge.on_availability_changed(availability);
	Harness {
		bridge,
		completions,
		events,
		transport,
	}
}

impl Harness {
	/// Applies the next completion produced by spawned work.
	async fn pump(&mut self) {
		let done = tokio::time::timeout(Duration::from_secs(60), self.completions.recv())
			.await
			.expect("no completion arrived")
			.expect("completion channel closed");
		self.bridge.on_completion(done);
	}

	fn state(&self, handle: WindowHandle) -> Option<EntryState> {
		self.bridge.snapshot(handle).map(|s| s.state)
	}

	fn snapshot_retries(&self, handle: WindowHandle) -> u32 {
		self.bridge.snapshot(handle).map_or(0, |s| s.retry_count)
	}
}

fn window(id: u32) -> WindowHandle {
	WindowHandle::new(id)
}

fn path(p: &str) -> MenuObjectPath {
	MenuObjectPath::new(p).unwrap()
}

#[tokio::test]
async fn second_register_for_live_handle_is_rejected() {
	let mut h = harness(Availability::Present);
	let first = h.bridge.register(window(1), path("/app/menu")).unwrap();
	assert_eq!(first.state, EntryState::Pending);

	let err = h.bridge.register(window(1), path("/app/other")).unwrap_err();
	assert!(matches!(err, BridgeError::AlreadyRegistered(w) if w == window(1)));
	assert_eq!(h.bridge.len(), 1);
	assert_eq!(h.bridge.snapshot(window(1)).unwrap().menu_path, path("/app/menu"));
}

#[tokio::test]
async fn unregister_unknown_handle_is_a_noop() {
	let mut h = harness(Availability::Present);
	h.bridge.unregister(window(404));
	assert!(h.bridge.is_empty());
	assert!(h.transport.calls().is_empty());
	assert!(h.events.try_recv().is_err());
}

#[tokio::test]
async fn absent_registrar_parks_entry_until_present() {
	let mut h = harness(Availability::Absent);
	h.bridge.register(window(42), path("/app/menu")).unwrap();
	tokio::task::yield_now().await;
	assert_eq!(h.state(window(42)), Some(EntryState::Pending));
	assert!(h.transport.calls().is_empty(), "no call while the registrar is known absent");

	h.transport.set_availability(Availability::Present);
	h.bridge.on_availability_changed(Availability::Present);
	h.pump().await;
	assert_eq!(h.state(window(42)), Some(EntryState::Registered));
}

#[tokio::test]
async fn registrar_loss_demotes_registered_without_unregistering() {
	let mut h = harness(Availability::Present);
	h.bridge.register(window(3), path("/app/menu")).unwrap();
	h.pump().await;
	assert_eq!(h.state(window(3)), Some(EntryState::Registered));

	h.bridge.on_availability_changed(Availability::Absent);
	assert_eq!(h.state(window(3)), Some(EntryState::Pending));
	assert_eq!(h.transport.methods(), vec!["RegisterWindow"]);
}

#[tokio::test]
async fn stale_completion_is_ignored() {
	let mut h = harness(Availability::Present);
	h.bridge.register(window(5), path("/app/menu")).unwrap();
	h.bridge.on_availability_changed(Availability::Absent);

	h.bridge.on_completion(Completion::Registered {
		handle: window(5),
		generation: Generation::FIRST,
		result: Ok(()),
	});
	assert_eq!(h.state(window(5)), Some(EntryState::Pending));
}

#[tokio::test(start_paused = true)]
async fn transient_failure_arms_retry_timer() {
	let mut h = harness(Availability::Unknown);
	h.bridge.register(window(9), path("/app/menu")).unwrap();
	h.pump().await;

	let snapshot = h.bridge.snapshot(window(9)).unwrap();
	assert_eq!(snapshot.state, EntryState::Failed);
	assert_eq!(snapshot.retry_count, 1);
	assert!(snapshot.last_error.as_ref().is_some_and(TransportError::is_transient));

	h.transport.set_availability(Availability::Present);
	// Timer fires, entry is re-issued, call succeeds.
	h.pump().await;
	assert_eq!(h.state(window(9)), Some(EntryState::Pending));
	h.pump().await;
	assert_eq!(h.state(window(9)), Some(EntryState::Registered));
	assert_eq!(h.transport.register_count(), 2);
}

#[tokio::test]
async fn rejection_parks_entry_in_failed_without_timer() {
	let mut h = harness(Availability::Present);
	h.transport.reject("/dup");
	h.bridge.register(window(7), path("/dup")).unwrap();
	h.pump().await;

	let snapshot = h.bridge.snapshot(window(7)).unwrap();
	assert_eq!(snapshot.state, EntryState::Failed);
	assert!(matches!(snapshot.last_error, Some(TransportError::Rejected { method: "RegisterWindow", .. })));
	assert_eq!(snapshot.retry_count, 0);

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(h.completions.try_recv().is_err(), "rejections must not schedule retries");
}

#[tokio::test]
async fn explicit_retry_reissues_failed_entry() {
	let mut h = harness(Availability::Present);
	h.transport.reject("/dup");
	h.bridge.register(window(7), path("/dup")).unwrap();
	h.pump().await;

	h.transport.allow("/dup");
	let snapshot = h.bridge.retry(window(7)).unwrap();
	assert_eq!(snapshot.state, EntryState::Pending);
	h.pump().await;
	assert_eq!(h.state(window(7)), Some(EntryState::Registered));
}

#[tokio::test]
async fn unregister_removes_entry_after_remote_call() {
	let mut h = harness(Availability::Present);
	h.bridge.register(window(11), path("/app/menu")).unwrap();
	h.pump().await;

	h.bridge.unregister(window(11));
	assert_eq!(h.state(window(11)), Some(EntryState::Unregistering));
	h.pump().await;
	assert_eq!(h.state(window(11)), None);
	assert_eq!(h.transport.methods(), vec!["RegisterWindow", "UnregisterWindow"]);
}

#[tokio::test]
async fn unregister_with_absent_registrar_discards_immediately() {
	let mut h = harness(Availability::Absent);
	h.bridge.register(window(12), path("/app/menu")).unwrap();
	h.bridge.unregister(window(12));
	assert!(h.bridge.is_empty());
	assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn register_during_unregistering_is_replayed_after_removal() {
	let mut h = harness(Availability::Present);
	h.bridge.register(window(13), path("/app/menu")).unwrap();
	h.pump().await;
	h.bridge.unregister(window(13));

	let queued = h.bridge.register(window(13), path("/app/menu2")).unwrap();
	assert_eq!(queued.state, EntryState::Pending);
	assert_eq!(h.state(window(13)), Some(EntryState::Unregistering));

	h.pump().await; // unregister finished, replacement issued
	h.pump().await; // replacement registered
	let snapshot = h.bridge.snapshot(window(13)).unwrap();
	assert_eq!(snapshot.state, EntryState::Registered);
	assert_eq!(snapshot.menu_path, path("/app/menu2"));
	assert_eq!(h.transport.methods(), vec!["RegisterWindow", "UnregisterWindow", "RegisterWindow"]);
}

#[tokio::test]
async fn rejection_survives_first_presence_report() {
	let mut h = harness(Availability::Unknown);
	h.transport.answer_regardless_of_presence();
	h.transport.reject("/dup");
	h.bridge.register(window(15), path("/dup")).unwrap();
	h.pump().await;
	assert_eq!(h.state(window(15)), Some(EntryState::Failed));

	h.bridge.on_availability_changed(Availability::Present);
	assert_eq!(h.state(window(15)), Some(EntryState::Failed));
	assert_eq!(h.transport.register_count(), 1);

	// A registrar that went away and came back gets another chance.
	h.bridge.on_availability_changed(Availability::Absent);
	h.bridge.on_availability_changed(Availability::Present);
	assert_eq!(h.state(window(15)), Some(EntryState::Pending));
	h.pump().await;
	assert_eq!(h.state(window(15)), Some(EntryState::Failed));
	assert_eq!(h.transport.register_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn registrar_loss_keeps_failed_entries_and_stops_their_timers() {
	let mut h = harness(Availability::Unknown);
	h.bridge.register(window(14), path("/app/menu")).unwrap();
	h.pump().await;
	assert_eq!(h.state(window(14)), Some(EntryState::Failed));

	h.bridge.on_availability_changed(Availability::Absent);
	assert_eq!(h.state(window(14)), Some(EntryState::Failed));
	tokio::time::sleep(Duration::from_secs(5)).await;
	assert!(h.completions.try_recv().is_err(), "retry timer fired while the registrar was absent");
	assert_eq!(h.transport.register_count(), 1);

	h.transport.set_availability(Availability::Present);
	h.bridge.on_availability_changed(Availability::Present);
	h.pump().await;
	assert_eq!(h.state(window(14)), Some(EntryState::Registered));
	assert_eq!(h.snapshot_retries(window(14)), 0);
}
