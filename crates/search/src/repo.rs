//! Collaborator surface the search drives.
//!
//! A handle is one independent unit of durable state (for example one working
//! copy). The search never looks inside it; it relies on these contracts:
//!
//! * [`RepositoryHandle::realize_and_derive`] records content as the new latest
//!   state and returns the identifier derived from that state.
//! * [`RepositoryHandle::rollback_one`] undoes exactly the most recent realize,
//!   so realize followed by rollback leaves the latest state unchanged.
//! * [`RepositoryHandle::compact`] reclaims storage without changing logical
//!   state. It is best-effort.

use std::path::Path;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::guess::{Alphabet, Candidate, CommittedIdentifier};

/// One working copy owned by exactly one worker.
#[async_trait]
pub trait RepositoryHandle: Send + 'static {
	/// Records `candidate` and returns the identifier derived from the new state.
	async fn realize_and_derive(&mut self, candidate: &Candidate) -> Result<CommittedIdentifier, SearchError>;

	/// Restores the state that preceded the most recent realize.
	async fn rollback_one(&mut self) -> Result<(), SearchError>;

	/// Normalizes internal storage. Failures are reported as
	/// [`SearchError::Maintenance`].
	async fn compact(&mut self) -> Result<(), SearchError> {
		Ok(())
	}
}

/// Identifiers a collaborator is able to derive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSpace {
	/// Every symbol a derived identifier can contain.
	pub alphabet: Alphabet,
	/// Longest identifier that can be derived.
	pub max_length: usize,
}

/// Materializes fresh handles.
#[async_trait]
pub trait HandleFactory: Send + Sync + 'static {
	type Handle: RepositoryHandle;

	/// Identifiers handles from this factory can derive. `None` places no limit.
	fn identifier_space(&self) -> Option<IdentifierSpace> {
		None
	}

	/// Creates an independent handle at `local_path` seeded from `source`.
	async fn initialize(&self, source: &str, local_path: &Path) -> Result<Self::Handle, SearchError>;
}
