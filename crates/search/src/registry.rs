use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::WorkerId;

/// Why a worker was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchReason {
	/// One of the configured workers started at run start.
	Initial,
	/// Replacement for a worker that failed.
	Respawn { replaces: WorkerId },
}

/// Snapshot for one launched worker.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
	pub worker: WorkerId,
	pub reason: LaunchReason,
	pub local_path: PathBuf,
	/// Attempts completed, known once the worker has exited.
	pub attempts: Option<u64>,
	pub last_exit: Option<String>,
}

impl WorkerRecord {
	/// Returns `true` until the worker's exit has been recorded.
	pub fn is_live(&self) -> bool {
		self.last_exit.is_none()
	}
}

/// Exited worker records kept by default.
pub const DEFAULT_RETAINED_EXITS: usize = 256;

#[derive(Debug, Default)]
struct RegistryState {
	records: HashMap<WorkerId, WorkerRecord>,
	/// Exited workers, oldest first.
	exited: VecDeque<WorkerId>,
	respawns: usize,
	/// Attempts of exited records that were evicted.
	evicted_attempts: u64,
}

/// In-memory record of the workers launched during a run.
///
/// Live workers are always tracked. Only the most recent exited records are
/// kept; older ones survive as counters.
#[derive(Debug, Clone)]
pub struct WorkerRegistry {
	inner: Arc<RwLock<RegistryState>>,
	retained_exits: usize,
}

impl Default for WorkerRegistry {
	fn default() -> Self {
		Self::with_retention(DEFAULT_RETAINED_EXITS)
	}
}

impl WorkerRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an empty registry that keeps at most `retained_exits` exited records.
	pub fn with_retention(retained_exits: usize) -> Self {
		Self {
			inner: Arc::default(),
			retained_exits,
		}
	}

	/// Records a launch.
	pub fn launched(&self, worker: WorkerId, reason: LaunchReason, local_path: PathBuf) {
		if let Ok(mut guard) = self.inner.write() {
			if matches!(reason, LaunchReason::Respawn { .. }) {
				guard.respawns += 1;
			}
			guard.records.insert(
				worker,
				WorkerRecord {
					worker,
					reason,
					local_path,
					attempts: None,
					last_exit: None,
				},
			);
		}
	}

	/// Records an exit, evicting the oldest exited records past the retention limit.
	pub fn exited(&self, worker: WorkerId, attempts: u64, exit: impl Into<String>) {
		let Ok(mut guard) = self.inner.write() else {
			return;
		};
		let state = &mut *guard;
		let Some(record) = state.records.get_mut(&worker) else {
			return;
		};
		let first_exit = record.is_live();
		record.attempts = Some(attempts);
		record.last_exit = Some(exit.into());
		if !first_exit {
			return;
		}

		state.exited.push_back(worker);
		while state.exited.len() > self.retained_exits {
			let Some(oldest) = state.exited.pop_front() else {
				break;
			};
			if let Some(evicted) = state.records.remove(&oldest) {
				state.evicted_attempts += evicted.attempts.unwrap_or_default();
			}
		}
	}

	/// Returns retained snapshots sorted by worker id.
	pub fn snapshots(&self) -> Vec<WorkerRecord> {
		let Ok(guard) = self.inner.read() else {
			return Vec::new();
		};
		let mut records: Vec<_> = guard.records.values().cloned().collect();
		records.sort_by_key(|record| record.worker);
		records
	}

	/// Ids of workers that have not exited.
	pub fn live(&self) -> Vec<WorkerId> {
		self.snapshots().into_iter().filter(WorkerRecord::is_live).map(|record| record.worker).collect()
	}

	/// Number of replacement workers launched.
	pub fn respawns(&self) -> usize {
		self.inner.read().map(|guard| guard.respawns).unwrap_or_default()
	}

	/// Sum of attempts over exited workers, evicted ones included.
	pub fn total_attempts(&self) -> u64 {
		let Ok(guard) = self.inner.read() else {
			return 0;
		};
		guard.evicted_attempts + guard.records.values().filter_map(|record| record.attempts).sum::<u64>()
	}
}
