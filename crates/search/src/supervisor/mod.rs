//! Launches search workers and arbitrates the outcome of the whole run.
//!
//! The supervisor is a loop over a queue of pending launches. Initial workers
//! are queued with a growing stagger delay; under the resilient policy each
//! failure queues exactly one replacement with a fresh id. The loop ends on the
//! first accepted [`SearchResult`], on external cancellation, or on the first
//! failure under the fail-fast policy. Every remaining worker is then
//! cancelled and given a grace period before it is aborted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{SearchError, SupervisorError};
use crate::guess::GuessGenerator;
use crate::registry::{LaunchReason, WorkerRegistry};
use crate::repo::HandleFactory;
use crate::result::{ResultCell, SearchResult};
use crate::token::{WorkerId, WorkerIdClock, WorkerToken};
use crate::worker::{SearchWorker, WorkerExit, WorkerReport, WorkerSettings};

mod set;

use set::WorkerSet;

/// Default delay between initial worker launches.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(100);

/// Default time workers get to stop after the run ends.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What the supervisor does when a worker fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPolicy {
	/// The first failure cancels every worker and ends the run in error.
	FailFast,
	/// A failed worker is replaced by a new one after `respawn_delay`.
	Resilient { respawn_delay: Duration },
}

impl Default for SupervisorPolicy {
	fn default() -> Self {
		Self::Resilient {
			respawn_delay: Duration::from_millis(100),
		}
	}
}

enum FailureAction {
	Respawn { delay: Duration },
	Abort(SupervisorError),
}

impl SupervisorPolicy {
	fn on_failure(&self, worker: WorkerId, error: SearchError) -> FailureAction {
		match *self {
			Self::FailFast => FailureAction::Abort(SupervisorError::WorkerFailed { worker, source: error }),
			Self::Resilient { respawn_delay } => {
				tracing::warn!(worker = %worker, kind = error.kind(), %error, "search.supervisor.worker_failed");
				FailureAction::Respawn { delay: respawn_delay }
			}
		}
	}

	const fn name(&self) -> &'static str {
		match self {
			Self::FailFast => "fail-fast",
			Self::Resilient { .. } => "resilient",
		}
	}
}

/// Start delay of the `index`-th initial worker, saturating instead of wrapping.
fn stagger_delay(stagger: Duration, index: usize) -> Duration {
	stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

/// One queued worker launch.
#[derive(Debug, Clone, Copy)]
struct Launch {
	worker: WorkerId,
	reason: LaunchReason,
	delay: Duration,
}

/// Coordinates the workers of one search run.
pub struct Supervisor<F>
where
	F: HandleFactory,
{
	factory: Arc<F>,
	settings: Arc<WorkerSettings>,
	guesses: GuessGenerator,
	workers: usize,
	policy: SupervisorPolicy,
	stagger: Duration,
	shutdown_grace: Duration,
	clock: WorkerIdClock,
	registry: WorkerRegistry,
	results: ResultCell,
}

impl<F> Supervisor<F>
where
	F: HandleFactory,
{
	/// Creates a supervisor for one worker under the default policy.
	pub fn new(factory: F, settings: WorkerSettings, guesses: GuessGenerator) -> Self {
		Self {
			factory: Arc::new(factory),
			settings: Arc::new(settings),
			guesses,
			workers: 1,
			policy: SupervisorPolicy::default(),
			stagger: DEFAULT_STAGGER,
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
			clock: WorkerIdClock::new(),
			registry: WorkerRegistry::new(),
			results: ResultCell::new(),
		}
	}

	/// Sets the number of concurrent workers.
	///
	/// # Panics
	///
	/// Panics if `workers` is zero.
	#[must_use]
	pub fn workers(mut self, workers: usize) -> Self {
		assert!(workers > 0, "worker count must be > 0");
		self.workers = workers;
		self
	}

	/// Sets the failure policy.
	#[must_use]
	pub fn policy(mut self, policy: SupervisorPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Sets the delay between initial worker launches.
	#[must_use]
	pub fn stagger(mut self, stagger: Duration) -> Self {
		self.stagger = stagger;
		self
	}

	/// Sets how long workers get to stop before they are aborted.
	#[must_use]
	pub fn shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	/// Registry of every worker launched by this supervisor.
	pub fn registry(&self) -> WorkerRegistry {
		self.registry.clone()
	}

	/// The run's write-once success cell.
	pub fn results(&self) -> ResultCell {
		self.results.clone()
	}

	/// Runs until the first accepted match, a fail-fast failure, or `cancel`.
	pub async fn run(self, cancel: CancellationToken) -> Result<SearchResult, SupervisorError> {
		let scope = cancel.child_token();
		let mut set = WorkerSet::new();
		let mut pending: VecDeque<Launch> = (0..self.workers)
			.map(|index| Launch {
				worker: self.clock.next(),
				reason: LaunchReason::Initial,
				delay: stagger_delay(self.stagger, index),
			})
			.collect();

		tracing::info!(
			workers = self.workers,
			policy = self.policy.name(),
			run_dir = %self.settings.run_dir.display(),
			"search.supervisor.start"
		);

		let outcome = loop {
			while let Some(launch) = pending.pop_front() {
				self.launch(&mut set, &scope, launch);
			}

			tokio::select! {
				biased;
				result = self.results.wait() => break Ok(result),
				_ = cancel.cancelled() => break Err(SupervisorError::Cancelled),
				Some(exit) = set.join_next(), if !set.is_empty() => {
					let WorkerExit { worker, attempts, report } = exit;
					self.registry.exited(worker, attempts, report.summary());
					if let WorkerReport::Failure(error) = report {
						match self.policy.on_failure(worker, error) {
							FailureAction::Respawn { delay } => {
								let replacement = self.clock.next();
								tracing::info!(worker = %replacement, replaces = %worker, delay = ?delay, "search.supervisor.respawn");
								pending.push_back(Launch {
									worker: replacement,
									reason: LaunchReason::Respawn { replaces: worker },
									delay,
								});
							}
							FailureAction::Abort(error) => break Err(error),
						}
					}
				}
			}
		};

		scope.cancel();
		for exit in set.drain(self.shutdown_grace).await {
			self.registry.exited(exit.worker, exit.attempts, exit.report.summary());
		}

		match &outcome {
			Ok(result) => tracing::info!(
				worker = %result.worker,
				identifier = %result.identifier,
				attempts = self.registry.total_attempts(),
				launched = self.clock.issued(),
				respawns = self.registry.respawns(),
				"search.supervisor.matched"
			),
			Err(error) => tracing::error!(
				%error,
				attempts = self.registry.total_attempts(),
				launched = self.clock.issued(),
				respawns = self.registry.respawns(),
				"search.supervisor.stopped"
			),
		}
		outcome
	}

	fn launch(&self, set: &mut WorkerSet, scope: &CancellationToken, launch: Launch) {
		let worker = SearchWorker::new(launch.worker, Arc::clone(&self.factory), Arc::clone(&self.settings), self.guesses.clone());
		self.registry.launched(launch.worker, launch.reason, worker.state().local_path.clone());
		tracing::debug!(worker = %launch.worker, reason = ?launch.reason, delay = ?launch.delay, "search.supervisor.launch");

		let token = WorkerToken::new(launch.worker, scope.child_token());
		let results = self.results.clone();
		set.spawn(launch.worker, async move {
			if !launch.delay.is_zero() {
				tokio::select! {
					biased;
					_ = token.cancelled() => {
						return WorkerExit {
							worker: token.worker(),
							attempts: 0,
							report: WorkerReport::Cancelled,
						};
					}
					_ = tokio::time::sleep(launch.delay) => {}
				}
			}
			worker.run(token, results).await
		});
	}
}

#[cfg(test)]
mod tests;
