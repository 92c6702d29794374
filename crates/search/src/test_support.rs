//! In-memory collaborator for exercising the search without git.

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SearchError;
use crate::guess::{Candidate, CommittedIdentifier};
use crate::repo::{HandleFactory, RepositoryHandle};

/// How a [`MemoryHandle`] derives identifiers.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Derive {
	/// Identifier equals the realized candidate, so every attempt matches.
	Echo,
	/// Identifier is constant regardless of content.
	Fixed(&'static str),
	/// Identifier is a digest of the whole history.
	Digest,
}

#[derive(Default)]
struct Stats {
	realizes: AtomicUsize,
	compacts: AtomicUsize,
	inits: Mutex<Vec<PathBuf>>,
}

#[derive(Clone)]
pub(crate) struct MemoryFactory {
	derive: Derive,
	fail_realize_after: Option<usize>,
	fail_rollback: bool,
	fail_inits: usize,
	fail_compact: bool,
	panic_on_realize: bool,
	stats: Arc<Stats>,
}

impl MemoryFactory {
	pub(crate) fn new(derive: Derive) -> Self {
		Self {
			derive,
			fail_realize_after: None,
			fail_rollback: false,
			fail_inits: 0,
			fail_compact: false,
			panic_on_realize: false,
			stats: Arc::default(),
		}
	}

	/// Realize fails once `limit` realizes have happened across all handles.
	pub(crate) fn fail_realize_after(mut self, limit: usize) -> Self {
		self.fail_realize_after = Some(limit);
		self
	}

	pub(crate) fn fail_rollback(mut self) -> Self {
		self.fail_rollback = true;
		self
	}

	pub(crate) fn fail_init(self) -> Self {
		self.fail_first_inits(usize::MAX)
	}

	/// The first `count` initializations fail.
	pub(crate) fn fail_first_inits(mut self, count: usize) -> Self {
		self.fail_inits = count;
		self
	}

	pub(crate) fn fail_compact(mut self) -> Self {
		self.fail_compact = true;
		self
	}

	pub(crate) fn panic_on_realize(mut self) -> Self {
		self.panic_on_realize = true;
		self
	}

	/// Handle that was not created through [`HandleFactory::initialize`].
	pub(crate) fn handle(&self) -> MemoryHandle {
		MemoryHandle {
			factory: self.clone(),
			history: Vec::new(),
			rollbacks: 0,
			_not_sync: PhantomData,
		}
	}

	pub(crate) fn init_paths(&self) -> Vec<PathBuf> {
		self.stats.inits.lock().clone()
	}

	pub(crate) fn initializations(&self) -> usize {
		self.stats.inits.lock().len()
	}

	pub(crate) fn realizes(&self) -> usize {
		self.stats.realizes.load(Ordering::SeqCst)
	}

	pub(crate) fn compacts(&self) -> usize {
		self.stats.compacts.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl HandleFactory for MemoryFactory {
	type Handle = MemoryHandle;

	async fn initialize(&self, source: &str, local_path: &Path) -> Result<MemoryHandle, SearchError> {
		let index = {
			let mut inits = self.stats.inits.lock();
			inits.push(local_path.to_path_buf());
			inits.len() - 1
		};
		if index < self.fail_inits {
			return Err(SearchError::Init {
				path: local_path.to_path_buf(),
				source_path: source.to_string(),
				reason: "stub refuses to initialize".to_string(),
			});
		}
		tokio::fs::create_dir_all(local_path).await.map_err(|err| SearchError::Init {
			path: local_path.to_path_buf(),
			source_path: source.to_string(),
			reason: err.to_string(),
		})?;
		let mut handle = self.handle();
		handle.seed_history([source]);
		Ok(handle)
	}
}

pub(crate) struct MemoryHandle {
	factory: MemoryFactory,
	history: Vec<String>,
	rollbacks: usize,
	/// Keeps the stub `Send` but not `Sync`.
	_not_sync: PhantomData<Cell<()>>,
}

impl MemoryHandle {
	pub(crate) fn seed_history<'a>(&mut self, entries: impl IntoIterator<Item = &'a str>) {
		self.history.extend(entries.into_iter().map(str::to_string));
	}

	pub(crate) fn history(&self) -> Vec<String> {
		self.history.clone()
	}

	pub(crate) fn rollbacks(&self) -> usize {
		self.rollbacks
	}

	fn derive(&self, candidate: &Candidate) -> CommittedIdentifier {
		match self.factory.derive {
			Derive::Echo => CommittedIdentifier::new(candidate.as_str()),
			Derive::Fixed(id) => CommittedIdentifier::new(id),
			Derive::Digest => {
				let mut hasher = DefaultHasher::new();
				self.history.hash(&mut hasher);
				let digest = format!("{:016x}", hasher.finish());
				CommittedIdentifier::new(&digest[..candidate.len().min(digest.len())])
			}
		}
	}
}

#[async_trait]
impl RepositoryHandle for MemoryHandle {
	async fn realize_and_derive(&mut self, candidate: &Candidate) -> Result<CommittedIdentifier, SearchError> {
		tokio::task::yield_now().await;
		let seen = self.factory.stats.realizes.fetch_add(1, Ordering::SeqCst);
		if self.factory.panic_on_realize {
			panic!("stub realize panicked");
		}
		if self.factory.fail_realize_after.is_some_and(|limit| seen >= limit) {
			return Err(SearchError::Realize {
				candidate: candidate.to_string(),
				reason: "stub realize failure".to_string(),
			});
		}
		self.history.push(candidate.to_string());
		Ok(self.derive(candidate))
	}

	async fn rollback_one(&mut self) -> Result<(), SearchError> {
		if self.factory.fail_rollback || self.history.pop().is_none() {
			return Err(SearchError::Rollback {
				reason: "nothing to roll back".to_string(),
			});
		}
		self.rollbacks += 1;
		Ok(())
	}

	async fn compact(&mut self) -> Result<(), SearchError> {
		self.factory.stats.compacts.fetch_add(1, Ordering::SeqCst);
		if self.factory.fail_compact {
			return Err(SearchError::Maintenance {
				reason: "stub compaction failure".to_string(),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Alphabet, GuessGenerator};

	#[tokio::test]
	async fn handles_from_one_factory_are_isolated() {
		let dir = tempfile::tempdir().expect("create tempdir");
		let factory = MemoryFactory::new(Derive::Digest);
		let mut a = factory.initialize("origin", &dir.path().join("a")).await.unwrap();
		let mut b = factory.initialize("origin", &dir.path().join("b")).await.unwrap();
		let guesses = GuessGenerator::seeded(Alphabet::hex(), 5);

		let id_a = a.realize_and_derive(&guesses.next(7)).await.unwrap();
		assert_eq!(b.history(), vec!["origin".to_string()]);
		let id_b = b.realize_and_derive(&guesses.next(7)).await.unwrap();
		a.rollback_one().await.unwrap();

		assert_eq!(a.history(), vec!["origin".to_string()]);
		assert_eq!(b.history().len(), 2);
		assert_ne!(id_a, id_b);
	}
}
