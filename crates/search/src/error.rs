//! Error types for the search engine and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

use crate::WorkerId;

/// Failures raised while driving one worker's handle.
///
/// Every variant except [`SearchError::Maintenance`] ends the worker that hit
/// it. Workers never retry in place; the supervisor decides what happens next.
#[derive(Debug, Error)]
pub enum SearchError {
	/// A fresh handle could not be materialized.
	#[error("failed to initialize handle at {path} from {source_path}: {reason}")]
	Init {
		/// Where the handle was being materialized.
		path: PathBuf,
		/// Source the handle was materialized from.
		source_path: String,
		/// Collaborator-provided cause.
		reason: String,
	},

	/// A candidate could not be recorded or its identifier derived.
	#[error("failed to realize candidate {candidate}: {reason}")]
	Realize { candidate: String, reason: String },

	/// The most recent realize could not be undone.
	#[error("failed to roll back last realize: {reason}")]
	Rollback { reason: String },

	/// Best-effort storage maintenance failed.
	#[error("maintenance failed: {reason}")]
	Maintenance { reason: String },

	/// The success record could not be written.
	#[error("failed to write success record {path}: {error}")]
	Artifact {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},

	/// The worker task panicked.
	#[error("worker panicked: {0}")]
	Panicked(String),
}

impl SearchError {
	/// Returns `false` for errors the search keeps running through.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Self::Maintenance { .. })
	}

	pub(crate) const fn kind(&self) -> &'static str {
		match self {
			Self::Init { .. } => "init",
			Self::Realize { .. } => "realize",
			Self::Rollback { .. } => "rollback",
			Self::Maintenance { .. } => "maintenance",
			Self::Artifact { .. } => "artifact",
			Self::Panicked(_) => "panicked",
		}
	}
}

/// Terminal errors of a whole search run.
#[derive(Debug, Error)]
pub enum SupervisorError {
	/// A worker failed under the fail-fast policy.
	#[error("worker {worker} failed: {source}")]
	WorkerFailed {
		worker: WorkerId,
		#[source]
		source: SearchError,
	},

	/// The run was cancelled before any worker found a match.
	#[error("search cancelled before a match was found")]
	Cancelled,
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	/// Error parsing TOML syntax or shape.
	#[error("invalid config file {path}: {error}")]
	Parse { path: PathBuf, error: toml::de::Error },

	/// A value is outside its accepted range.
	#[error("invalid value for '{field}': {reason}")]
	Invalid { field: &'static str, reason: String },
}
