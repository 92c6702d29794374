//! Git-backed repository handles.
//!
//! Each handle is a clone of the source repository. A candidate is realized as
//! an empty commit whose message names it, and the derived identifier is the
//! new `HEAD` object id truncated to the candidate's length.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use selfsha_search::{Alphabet, Candidate, CommittedIdentifier, HandleFactory, IdentifierSpace, RepositoryHandle, SearchError};

mod command;

pub use command::CommitIdentity;
use command::Git;

/// Message prefix of every search commit.
pub const MESSAGE_PREFIX: &str = "short sha: ";

/// Length of a hex SHA-1 object id.
pub const OBJECT_ID_LEN: usize = 40;

/// Creates [`GitHandle`]s by cloning the source repository.
#[derive(Debug, Clone)]
pub struct GitFactory {
	git: Git,
}

impl GitFactory {
	/// Locates `git` on `PATH`.
	pub fn discover(identity: Option<CommitIdentity>) -> Result<Self, SearchError> {
		let program = which::which("git").map_err(|err| SearchError::Init {
			path: PathBuf::new(),
			source_path: String::new(),
			reason: format!("git executable not found: {err}"),
		})?;
		tracing::debug!(program = %program.display(), "git.discover");
		Ok(Self::with_program(program, identity))
	}

	/// Uses an explicit git binary.
	pub fn with_program(program: PathBuf, identity: Option<CommitIdentity>) -> Self {
		Self {
			git: Git::new(program, identity),
		}
	}
}

#[async_trait]
impl HandleFactory for GitFactory {
	type Handle = GitHandle;

	fn identifier_space(&self) -> Option<IdentifierSpace> {
		Some(IdentifierSpace {
			alphabet: Alphabet::hex(),
			max_length: OBJECT_ID_LEN,
		})
	}

	async fn initialize(&self, source: &str, local_path: &Path) -> Result<GitHandle, SearchError> {
		let init_error = |reason: String| SearchError::Init {
			path: local_path.to_path_buf(),
			source_path: source.to_string(),
			reason,
		};

		if tokio::fs::try_exists(local_path).await.unwrap_or(false) {
			tokio::fs::remove_dir_all(local_path)
				.await
				.map_err(|err| init_error(format!("failed to remove stale clone: {err}")))?;
		}
		if let Some(parent) = local_path.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|err| init_error(format!("failed to create {}: {err}", parent.display())))?;
		}

		let target = local_path.to_string_lossy();
		self.git.run(None, &["clone", "--quiet", source, &target]).await.map_err(init_error)?;
		tracing::debug!(source, path = %local_path.display(), "git.clone");

		Ok(GitHandle {
			git: self.git.clone(),
			path: local_path.to_path_buf(),
		})
	}
}

/// One clone owned by one worker.
#[derive(Debug)]
pub struct GitHandle {
	git: Git,
	path: PathBuf,
}

impl GitHandle {
	/// Working copy path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Full object id of `HEAD`.
	pub async fn head(&self) -> Result<String, String> {
		self.git.run(Some(&self.path), &["rev-parse", "HEAD"]).await
	}
}

#[async_trait]
impl RepositoryHandle for GitHandle {
	async fn realize_and_derive(&mut self, candidate: &Candidate) -> Result<CommittedIdentifier, SearchError> {
		let realize_error = |reason: String| SearchError::Realize {
			candidate: candidate.to_string(),
			reason,
		};

		let message = format!("{MESSAGE_PREFIX}{candidate}");
		self.git
			.run(Some(&self.path), &["commit", "--quiet", "--allow-empty", "--no-verify", "-m", &message])
			.await
			.map_err(realize_error)?;
		let head = self.head().await.map_err(realize_error)?;

		match head.get(..candidate.len()) {
			Some(prefix) => Ok(CommittedIdentifier::new(prefix)),
			None => Err(realize_error(format!("object id {head:?} is shorter than {} symbols", candidate.len()))),
		}
	}

	async fn rollback_one(&mut self) -> Result<(), SearchError> {
		self.git
			.run(Some(&self.path), &["reset", "--quiet", "--hard", "HEAD~"])
			.await
			.map(drop)
			.map_err(|reason| SearchError::Rollback { reason })
	}

	async fn compact(&mut self) -> Result<(), SearchError> {
		self.git
			.run(Some(&self.path), &["gc", "--quiet"])
			.await
			.map(drop)
			.map_err(|reason| SearchError::Maintenance { reason })
	}
}
