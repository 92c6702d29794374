//! Write-once success signal shared by every worker.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::WorkerId;
use crate::guess::CommittedIdentifier;

/// The first accepted match of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
	pub worker: WorkerId,
	pub identifier: CommittedIdentifier,
}

impl fmt::Display for SearchResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "success! the lucky sha was {} from worker {}", self.identifier, self.worker)
	}
}

struct ResultInner {
	slot: OnceLock<SearchResult>,
	done: CancellationToken,
}

/// Single-writer-wins cell for the [`SearchResult`].
///
/// Any number of workers may publish concurrently. The first write is kept;
/// later writes return `false` without blocking.
#[derive(Clone)]
pub struct ResultCell {
	inner: Arc<ResultInner>,
}

impl Default for ResultCell {
	fn default() -> Self {
		Self::new()
	}
}

impl ResultCell {
	/// Creates an empty cell.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ResultInner {
				slot: OnceLock::new(),
				done: CancellationToken::new(),
			}),
		}
	}

	/// Offers `result`. Returns `true` if it became the accepted result.
	pub fn publish(&self, result: SearchResult) -> bool {
		let accepted = self.inner.slot.set(result).is_ok();
		if accepted {
			self.inner.done.cancel();
		}
		accepted
	}

	/// Accepted result, if any.
	pub fn get(&self) -> Option<&SearchResult> {
		self.inner.slot.get()
	}

	/// Waits until a result has been accepted.
	pub async fn wait(&self) -> SearchResult {
		loop {
			if let Some(result) = self.get() {
				return result.clone();
			}
			self.inner.done.cancelled().await;
		}
	}
}

impl fmt::Debug for ResultCell {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResultCell").field("result", &self.get()).finish()
	}
}
