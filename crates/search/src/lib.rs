//! Concurrent brute-force search for a self-referential commit.
//!
//! A worker repeatedly draws a random [`Candidate`], records it through a
//! [`RepositoryHandle`], and checks whether the identifier derived from the new
//! state equals the candidate. Mismatches are rolled back. The [`Supervisor`]
//! runs many workers in parallel, keeps the first match, and either stops or
//! replaces workers that fail, depending on its [`SupervisorPolicy`].

pub mod attempt;
pub mod config;
pub mod error;
pub mod guess;
pub mod registry;
pub mod repo;
pub mod result;
pub mod supervisor;
mod token;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use attempt::{AttemptOutcome, AttemptReport, AttemptState, SearchAttempt};
pub use config::{PolicyKind, SearchConfig};
pub use error::{ConfigError, SearchError, SupervisorError};
pub use guess::{Alphabet, Candidate, CommittedIdentifier, GuessGenerator, HEX_ALPHABET};
pub use registry::{LaunchReason, WorkerRecord, WorkerRegistry};
pub use repo::{HandleFactory, IdentifierSpace, RepositoryHandle};
pub use result::{ResultCell, SearchResult};
pub use supervisor::{Supervisor, SupervisorPolicy};
pub use token::{WorkerId, WorkerIdClock, WorkerToken};
pub use worker::{ARTIFACT_FILE, SearchWorker, WorkerExit, WorkerReport, WorkerSettings, WorkerState};
