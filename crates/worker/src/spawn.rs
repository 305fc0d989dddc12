use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{GenerationToken, TaskClass};

/// Spawns an async task on the current runtime with worker classification metadata.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	tokio::spawn(fut)
}

/// Spawns a task that is preempted as soon as `token` is cancelled.
///
/// Resolves to `None` when cancellation won the race. Cancellation is checked
/// before the future is first polled, so a token cancelled before the task
/// runs guarantees `fut` never starts.
pub fn spawn_cancellable<F>(class: TaskClass, token: GenerationToken, fut: F) -> JoinHandle<Option<F::Output>>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), generation = token.generation().get(), "worker.spawn_cancellable");
	tokio::spawn(async move {
		tokio::select! {
			biased;
			_ = token.cancelled() => None,
			out = fut => Some(out),
		}
	})
}

/// Spawns `fut` after `delay`, unless `token` is cancelled first.
pub fn spawn_after<F>(class: TaskClass, token: GenerationToken, delay: Duration, fut: F) -> JoinHandle<Option<F::Output>>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	spawn_cancellable(class, token, async move {
		tokio::time::sleep(delay).await;
		fut.await
	})
}
