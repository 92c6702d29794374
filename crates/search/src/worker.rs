//! Sequential attempt loop bound to one handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::attempt::{AttemptOutcome, AttemptReport, SearchAttempt};
use crate::error::SearchError;
use crate::guess::GuessGenerator;
use crate::repo::{HandleFactory, RepositoryHandle};
use crate::result::{ResultCell, SearchResult};
use crate::token::{WorkerId, WorkerToken};

/// File written into the winning worker's local path.
pub const ARTIFACT_FILE: &str = "short.sha";

/// Settings shared by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
	/// Source each handle is initialized from.
	pub source: String,
	/// Directory holding every worker's local path.
	pub run_dir: PathBuf,
	pub length: usize,
	pub refresh_interval: u64,
	pub log_interval: u64,
	pub compact_interval: u64,
}

impl WorkerSettings {
	/// Local path owned by `worker`. Distinct ids never share a path.
	pub fn local_path(&self, worker: WorkerId) -> PathBuf {
		self.run_dir.join(format!("{worker}-self-referential-commit"))
	}

	fn refresh_due(&self, attempts: u64) -> bool {
		attempts % self.refresh_interval.max(1) == 0
	}

	fn log_due(&self, attempt: u64) -> bool {
		attempt % self.log_interval.max(1) == 0
	}

	fn compact_due(&self, attempts: u64) -> bool {
		self.compact_interval > 0 && attempts % self.compact_interval == 0
	}
}

/// How a worker ended.
#[derive(Debug)]
pub enum WorkerReport {
	/// The worker found a match. `accepted` is `false` if another worker's
	/// result had already been accepted.
	Success { result: SearchResult, accepted: bool },
	/// A fatal collaborator error ended the worker.
	Failure(SearchError),
	/// Cancellation was observed between attempts.
	Cancelled,
}

impl WorkerReport {
	/// Short label for logs and the registry.
	pub fn summary(&self) -> String {
		match self {
			WorkerReport::Success { result, accepted: true } => format!("matched {}", result.identifier),
			WorkerReport::Success { result, accepted: false } => format!("matched {} after another worker", result.identifier),
			WorkerReport::Failure(error) => format!("failed: {error}"),
			WorkerReport::Cancelled => "cancelled".to_string(),
		}
	}
}

/// Final report of one worker.
#[derive(Debug)]
pub struct WorkerExit {
	pub worker: WorkerId,
	pub attempts: u64,
	pub report: WorkerReport,
}

/// State owned by exactly one worker; discarded on respawn.
pub struct WorkerState<H> {
	pub id: WorkerId,
	/// Attempts completed so far.
	pub attempt_count: u64,
	/// Attempt count at which the handle was last initialized.
	pub last_refresh_at: Option<u64>,
	pub local_path: PathBuf,
	handle: Option<H>,
}

impl<H> WorkerState<H> {
	fn new(id: WorkerId, local_path: PathBuf) -> Self {
		Self {
			id,
			attempt_count: 0,
			last_refresh_at: None,
			local_path,
			handle: None,
		}
	}

	/// Returns the handle for the next attempt, reinitializing it when the
	/// refresh policy is due.
	async fn handle_for_attempt<F>(&mut self, factory: &F, settings: &WorkerSettings) -> Result<&mut H, SearchError>
	where
		F: HandleFactory<Handle = H>,
	{
		let handle = match self.handle.take() {
			Some(handle) if !settings.refresh_due(self.attempt_count) => handle,
			stale => {
				drop(stale);
				let handle = factory.initialize(&settings.source, &self.local_path).await?;
				tracing::debug!(
					worker = %self.id,
					attempt = self.attempt_count,
					path = %self.local_path.display(),
					"search.worker.refresh"
				);
				self.last_refresh_at = Some(self.attempt_count);
				handle
			}
		};
		Ok(self.handle.insert(handle))
	}
}

/// Runs attempts against one handle until a match, a fatal error, or
/// cancellation.
pub struct SearchWorker<F>
where
	F: HandleFactory,
{
	state: WorkerState<F::Handle>,
	factory: Arc<F>,
	settings: Arc<WorkerSettings>,
	guesses: GuessGenerator,
}

impl<F> SearchWorker<F>
where
	F: HandleFactory,
{
	/// Creates a worker. No handle exists until the first attempt.
	pub fn new(id: WorkerId, factory: Arc<F>, settings: Arc<WorkerSettings>, guesses: GuessGenerator) -> Self {
		let local_path = settings.local_path(id);
		Self {
			state: WorkerState::new(id, local_path),
			factory,
			settings,
			guesses,
		}
	}

	pub fn id(&self) -> WorkerId {
		self.state.id
	}

	/// Worker-owned state.
	pub fn state(&self) -> &WorkerState<F::Handle> {
		&self.state
	}

	/// Loops attempts. Cancellation is checked once per iteration.
	pub async fn run(mut self, token: WorkerToken, results: ResultCell) -> WorkerExit {
		let worker = self.state.id;
		tracing::debug!(worker = %worker, path = %self.state.local_path.display(), "search.worker.start");

		let report = loop {
			if token.is_cancelled() {
				break WorkerReport::Cancelled;
			}

			let handle = match self.state.handle_for_attempt(&*self.factory, &self.settings).await {
				Ok(handle) => handle,
				Err(error) => break WorkerReport::Failure(error),
			};
			let report = SearchAttempt::new(handle, &self.guesses, self.settings.length).run().await;
			let attempt = self.state.attempt_count;
			self.state.attempt_count += 1;

			if self.settings.log_due(attempt) {
				log_progress(worker, attempt, &report);
			}

			match report.outcome {
				AttemptOutcome::Matched(identifier) => {
					let result = SearchResult { worker, identifier };
					break accept(result, &self.state.local_path, self.state.attempt_count, &results).await;
				}
				AttemptOutcome::Fatal(error) => break WorkerReport::Failure(error),
				AttemptOutcome::NoMatch => self.maintain().await,
			}
		};

		let exit = WorkerExit {
			worker,
			attempts: self.state.attempt_count,
			report,
		};
		tracing::debug!(worker = %worker, attempts = exit.attempts, exit = %exit.report.summary(), "search.worker.exit");
		exit
	}

	async fn maintain(&mut self) {
		if !self.settings.compact_due(self.state.attempt_count) {
			return;
		}
		let Some(handle) = self.state.handle.as_mut() else {
			return;
		};
		if let Err(error) = handle.compact().await {
			tracing::warn!(worker = %self.state.id, kind = error.kind(), %error, "search.worker.maintenance_failed");
		}
	}
}

/// Writes the artifact for a match, then publishes it.
///
/// Borrows only plain worker data so the worker future stays `Send` for
/// handles that are not `Sync`.
async fn accept(result: SearchResult, local_path: &Path, attempts: u64, results: &ResultCell) -> WorkerReport {
	let path = local_path.join(ARTIFACT_FILE);
	match tokio::fs::write(&path, format!("{result}\n")).await {
		Ok(()) => tracing::info!(worker = %result.worker, path = %path.display(), "search.worker.artifact"),
		Err(error) => {
			let error = SearchError::Artifact { path, error };
			tracing::warn!(worker = %result.worker, %error, "search.worker.artifact_failed");
		}
	}

	let accepted = results.publish(result.clone());
	tracing::info!(
		worker = %result.worker,
		identifier = %result.identifier,
		attempts,
		accepted,
		"search.worker.matched"
	);
	WorkerReport::Success { result, accepted }
}

fn log_progress(worker: WorkerId, attempt: u64, report: &AttemptReport) {
	tracing::info!(
		worker = %worker,
		attempt,
		guess = report.candidate.as_ref().map(|c| c.as_str()).unwrap_or_default(),
		derived = report.derived.as_ref().map(|d| d.as_str()).unwrap_or_default(),
		elapsed = ?report.elapsed,
		"search.progress"
	);
}
