use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio_util::task::AbortOnDropHandle;

use crate::error::SearchError;
use crate::token::WorkerId;
use crate::worker::{WorkerExit, WorkerReport};

/// Join set of running search workers.
///
/// Each worker runs in its own child task so a panic surfaces as a
/// [`WorkerReport::Failure`] for that worker id instead of an anonymous
/// join error. Aborting the set aborts the children too.
#[derive(Debug, Default)]
pub(crate) struct WorkerSet {
	inner: JoinSet<WorkerExit>,
}

impl WorkerSet {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn len(&self) -> usize {
		self.inner.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Spawns one worker future.
	pub(crate) fn spawn<F>(&mut self, worker: WorkerId, fut: F)
	where
		F: Future<Output = WorkerExit> + Send + 'static,
	{
		tracing::trace!(worker = %worker, pending = self.inner.len(), "search.worker_set.spawn");
		self.inner.spawn(async move {
			let child = AbortOnDropHandle::new(tokio::spawn(fut));
			match child.await {
				Ok(exit) => exit,
				Err(err) => {
					let message = join_error_panic_message(err).unwrap_or_else(|| "worker task cancelled".to_string());
					WorkerExit {
						worker,
						attempts: 0,
						report: WorkerReport::Failure(SearchError::Panicked(message)),
					}
				}
			}
		});
	}

	/// Waits for the next worker to finish. Returns `None` once the set is empty.
	pub(crate) async fn join_next(&mut self) -> Option<WorkerExit> {
		loop {
			match self.inner.join_next().await? {
				Ok(exit) => return Some(exit),
				Err(err) => tracing::debug!(%err, "search.worker_set.aborted"),
			}
		}
	}

	/// Waits up to `grace` for every worker to exit, then aborts the rest.
	pub(crate) async fn drain(&mut self, grace: Duration) -> Vec<WorkerExit> {
		let mut exits = Vec::new();
		let joined = tokio::time::timeout(grace, async {
			while let Some(exit) = self.join_next().await {
				exits.push(exit);
			}
		})
		.await;

		if joined.is_err() {
			tracing::warn!(remaining = self.inner.len(), grace = ?grace, "search.worker_set.drain_timeout");
			self.inner.abort_all();
			while self.inner.join_next().await.is_some() {}
		}
		exits
	}
}

/// Extracts the panic payload message from a join error.
pub(crate) fn join_error_panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		Some((*message).to_string())
	} else if let Some(message) = payload.downcast_ref::<String>() {
		Some(message.clone())
	} else {
		Some("non-string panic payload".to_string())
	}
}
