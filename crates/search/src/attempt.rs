//! One guess → realize → verify → accept-or-rollback cycle.

use std::time::{Duration, Instant};

use crate::error::SearchError;
use crate::guess::{Candidate, CommittedIdentifier, GuessGenerator};
use crate::repo::RepositoryHandle;

/// Position of a [`SearchAttempt`] in its lifecycle.
///
/// `Matched`, `Mismatched` and `Failed` are terminal.
#[derive(Debug)]
pub enum AttemptState {
	Start,
	Guessed(Candidate),
	Realized { candidate: Candidate, identifier: CommittedIdentifier },
	/// The derived identifier equals the candidate. The matching state is kept.
	Matched { candidate: Candidate, identifier: CommittedIdentifier },
	/// The identifier differed and the realize has been rolled back.
	Mismatched { candidate: Candidate, identifier: CommittedIdentifier },
	Failed {
		candidate: Option<Candidate>,
		identifier: Option<CommittedIdentifier>,
		error: SearchError,
	},
}

impl AttemptState {
	/// Returns `true` once no further transition is possible.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Matched { .. } | Self::Mismatched { .. } | Self::Failed { .. })
	}

	pub(crate) const fn name(&self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::Guessed(_) => "guessed",
			Self::Realized { .. } => "realized",
			Self::Matched { .. } => "matched",
			Self::Mismatched { .. } => "mismatched",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Result of one attempt, consumed once by the owning worker.
#[derive(Debug)]
pub enum AttemptOutcome {
	Matched(CommittedIdentifier),
	NoMatch,
	Fatal(SearchError),
}

/// Terminal summary of a finished attempt.
#[derive(Debug)]
pub struct AttemptReport {
	/// Drawn candidate, absent only if the attempt never got that far.
	pub candidate: Option<Candidate>,
	/// Identifier derived after realizing the candidate.
	pub derived: Option<CommittedIdentifier>,
	pub elapsed: Duration,
	pub outcome: AttemptOutcome,
}

/// State machine for one attempt against a borrowed handle.
///
/// The handle is exclusively borrowed for the attempt's lifetime, so attempts
/// of one worker are strictly serialized.
pub struct SearchAttempt<'a, H> {
	handle: &'a mut H,
	guesses: &'a GuessGenerator,
	length: usize,
	state: AttemptState,
}

impl<'a, H> SearchAttempt<'a, H>
where
	H: RepositoryHandle,
{
	/// Creates an attempt in the [`AttemptState::Start`] state.
	pub fn new(handle: &'a mut H, guesses: &'a GuessGenerator, length: usize) -> Self {
		Self {
			handle,
			guesses,
			length,
			state: AttemptState::Start,
		}
	}

	/// Current state.
	pub fn state(&self) -> &AttemptState {
		&self.state
	}

	/// Performs one transition. Terminal states are left as they are.
	pub async fn advance(&mut self) -> &AttemptState {
		let state = std::mem::replace(&mut self.state, AttemptState::Start);
		self.state = match state {
			AttemptState::Start => AttemptState::Guessed(self.guesses.next(self.length)),
			AttemptState::Guessed(candidate) => match self.handle.realize_and_derive(&candidate).await {
				Ok(identifier) => AttemptState::Realized { candidate, identifier },
				Err(error) => AttemptState::Failed {
					candidate: Some(candidate),
					identifier: None,
					error,
				},
			},
			AttemptState::Realized { candidate, identifier } if identifier.matches(&candidate) => AttemptState::Matched { candidate, identifier },
			AttemptState::Realized { candidate, identifier } => match self.handle.rollback_one().await {
				Ok(()) => AttemptState::Mismatched { candidate, identifier },
				Err(error) => AttemptState::Failed {
					candidate: Some(candidate),
					identifier: Some(identifier),
					error,
				},
			},
			terminal => terminal,
		};
		tracing::trace!(state = self.state.name(), "search.attempt.advance");
		&self.state
	}

	/// Drives the attempt to a terminal state.
	pub async fn run(mut self) -> AttemptReport {
		let started = Instant::now();
		while !self.state.is_terminal() {
			self.advance().await;
		}
		let elapsed = started.elapsed();

		match self.state {
			AttemptState::Matched { candidate, identifier } => AttemptReport {
				candidate: Some(candidate),
				derived: Some(identifier.clone()),
				elapsed,
				outcome: AttemptOutcome::Matched(identifier),
			},
			AttemptState::Mismatched { candidate, identifier } => AttemptReport {
				candidate: Some(candidate),
				derived: Some(identifier),
				elapsed,
				outcome: AttemptOutcome::NoMatch,
			},
			AttemptState::Failed { candidate, identifier, error } => AttemptReport {
				candidate,
				derived: identifier,
				elapsed,
				outcome: AttemptOutcome::Fatal(error),
			},
			AttemptState::Start | AttemptState::Guessed(_) | AttemptState::Realized { .. } => unreachable!("loop exits only on terminal states"),
		}
	}
}
