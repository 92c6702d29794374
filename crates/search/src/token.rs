use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Process-unique worker identity. Never reused, including across respawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
	/// Raw numeric id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for WorkerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Monotonic source of worker ids, starting at 0.
#[derive(Debug, Default, Clone)]
pub struct WorkerIdClock {
	next: Arc<AtomicU64>,
}

impl WorkerIdClock {
	/// Creates a new clock.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next unused id.
	pub fn next(&self) -> WorkerId {
		WorkerId(self.next.fetch_add(1, Ordering::AcqRel))
	}

	/// Number of ids handed out so far.
	pub fn issued(&self) -> u64 {
		self.next.load(Ordering::Acquire)
	}
}

/// Worker-scoped cancellation token.
///
/// Workers poll it between attempts; an in-flight collaborator call is always
/// allowed to finish.
#[derive(Debug, Clone)]
pub struct WorkerToken {
	worker: WorkerId,
	cancel: CancellationToken,
}

impl WorkerToken {
	/// Creates a token for `worker`.
	pub fn new(worker: WorkerId, cancel: CancellationToken) -> Self {
		Self { worker, cancel }
	}

	/// Worker this token belongs to.
	pub const fn worker(&self) -> WorkerId {
		self.worker
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
