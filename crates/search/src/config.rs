//! Search configuration.
//!
//! Values come from built-in defaults, optionally overlaid by a TOML file and
//! then by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::guess::{Alphabet, HEX_ALPHABET};
use crate::repo::IdentifierSpace;
use crate::supervisor::SupervisorPolicy;
use crate::worker::WorkerSettings;

/// Which supervisor strategy to run under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
	/// First failure stops the whole search.
	FailFast,
	/// Failed workers are replaced.
	#[default]
	Resilient,
}

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SearchConfig {
	/// Root under which handles materialize.
	pub directory: PathBuf,
	/// Repository each handle is cloned from.
	pub source: String,
	pub workers: usize,
	/// Attempts between handle reinitializations.
	pub refresh_interval: u64,
	/// Attempts between progress records.
	pub log_interval: u64,
	/// Attempts between best-effort compactions. Zero disables compaction.
	pub compact_interval: u64,
	/// Candidate length.
	pub length: usize,
	pub alphabet: String,
	pub policy: PolicyKind,
	pub stagger_ms: u64,
	pub respawn_delay_ms: u64,
	pub shutdown_grace_ms: u64,
	pub commit_name: Option<String>,
	pub commit_email: Option<String>,
}

impl Default for SearchConfig {
	fn default() -> Self {
		Self {
			directory: PathBuf::from("clones"),
			source: ".".to_string(),
			workers: 1,
			refresh_interval: 1000,
			log_interval: 10,
			compact_interval: 0,
			length: 7,
			alphabet: HEX_ALPHABET.to_string(),
			policy: PolicyKind::default(),
			stagger_ms: 100,
			respawn_delay_ms: 100,
			shutdown_grace_ms: 5000,
			commit_name: None,
			commit_email: None,
		}
	}
}

impl SearchConfig {
	/// Loads and validates a TOML config file. Missing keys keep their defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::parse(&text).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	fn parse(text: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(text)
	}

	/// Checks value ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let at_least_one = |field: &'static str, value: u64| {
			if value == 0 {
				Err(ConfigError::Invalid {
					field,
					reason: "must be at least 1".to_string(),
				})
			} else {
				Ok(())
			}
		};
		at_least_one("workers", self.workers as u64)?;
		at_least_one("refresh-interval", self.refresh_interval)?;
		at_least_one("log-interval", self.log_interval)?;
		at_least_one("length", self.length as u64)?;
		if self.source.trim().is_empty() {
			return Err(ConfigError::Invalid {
				field: "source",
				reason: "must not be empty".to_string(),
			});
		}
		if self.commit_name.is_some() != self.commit_email.is_some() {
			return Err(ConfigError::Invalid {
				field: if self.commit_name.is_some() { "commit-email" } else { "commit-name" },
				reason: "commit-name and commit-email must be set together".to_string(),
			});
		}
		self.alphabet()?;
		Ok(())
	}

	/// Checks value ranges, then that every candidate is one `space` can derive.
	///
	/// A length beyond `max_length` fails every attempt, and a symbol outside
	/// the space's alphabet can never match.
	pub fn validate_for(&self, space: &IdentifierSpace) -> Result<(), ConfigError> {
		self.validate()?;
		if self.length > space.max_length {
			return Err(ConfigError::Invalid {
				field: "length",
				reason: format!("{} exceeds the {}-symbol identifiers the repository derives", self.length, space.max_length),
			});
		}
		if let Some(symbol) = self.alphabet.chars().find(|c| !c.is_ascii() || !space.alphabet.contains(*c as u8)) {
			return Err(ConfigError::Invalid {
				field: "alphabet",
				reason: format!("'{symbol}' never appears in identifiers drawn from '{}'", space.alphabet.as_str()),
			});
		}
		Ok(())
	}

	/// Parsed candidate alphabet.
	pub fn alphabet(&self) -> Result<Alphabet, ConfigError> {
		Alphabet::new(&self.alphabet)
	}

	/// Supervisor strategy with its delays.
	pub fn policy(&self) -> SupervisorPolicy {
		match self.policy {
			PolicyKind::FailFast => SupervisorPolicy::FailFast,
			PolicyKind::Resilient => SupervisorPolicy::Resilient {
				respawn_delay: Duration::from_millis(self.respawn_delay_ms),
			},
		}
	}

	/// Per-worker settings for handles materialized under `run_dir`.
	pub fn worker_settings(&self, run_dir: PathBuf) -> WorkerSettings {
		WorkerSettings {
			source: self.source.clone(),
			run_dir,
			length: self.length,
			refresh_interval: self.refresh_interval,
			log_interval: self.log_interval,
			compact_interval: self.compact_interval,
		}
	}

	pub fn stagger(&self) -> Duration {
		Duration::from_millis(self.stagger_ms)
	}

	pub fn shutdown_grace(&self) -> Duration {
		Duration::from_millis(self.shutdown_grace_ms)
	}
}
