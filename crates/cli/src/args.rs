use std::path::PathBuf;

use clap::Parser;
use selfsha_search::{PolicyKind, SearchConfig};

/// Command line arguments. Every search setting overrides the config file.
#[derive(Parser, Debug)]
#[command(name = "selfsha")]
#[command(about = "Search for a commit whose message names its own short hash")]
pub struct Args {
	/// TOML config file
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Root directory for working clones
	#[arg(short, long, value_name = "DIR")]
	pub directory: Option<PathBuf>,

	/// Repository to clone into each worker
	#[arg(short, long, value_name = "REPO")]
	pub source: Option<String>,

	/// Number of concurrent workers
	#[arg(short, long)]
	pub workers: Option<usize>,

	/// Attempts between fresh clones
	#[arg(short, long)]
	pub refresh_interval: Option<u64>,

	/// Attempts between progress records
	#[arg(short, long)]
	pub log_interval: Option<u64>,

	/// Attempts between `git gc` runs (0 disables)
	#[arg(long)]
	pub compact_interval: Option<u64>,

	/// Short hash length
	#[arg(long)]
	pub length: Option<usize>,

	/// Symbols a short hash is drawn from
	#[arg(long)]
	pub alphabet: Option<String>,

	/// Failure policy: fail-fast or resilient
	#[arg(long, value_parser = parse_policy)]
	pub policy: Option<PolicyKind>,

	/// Remove the clone directory before starting
	#[arg(long)]
	pub clean: bool,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

fn parse_policy(value: &str) -> Result<PolicyKind, String> {
	match value {
		"fail-fast" => Ok(PolicyKind::FailFast),
		"resilient" => Ok(PolicyKind::Resilient),
		other => Err(format!("unknown policy '{other}', expected fail-fast or resilient")),
	}
}

impl Args {
	/// Overlays the flags that were given onto `config`.
	pub fn apply(&self, config: &mut SearchConfig) {
		if let Some(directory) = &self.directory {
			config.directory = directory.clone();
		}
		if let Some(source) = &self.source {
			config.source = source.clone();
		}
		if let Some(workers) = self.workers {
			config.workers = workers;
		}
		if let Some(interval) = self.refresh_interval {
			config.refresh_interval = interval;
		}
		if let Some(interval) = self.log_interval {
			config.log_interval = interval;
		}
		if let Some(interval) = self.compact_interval {
			config.compact_interval = interval;
		}
		if let Some(length) = self.length {
			config.length = length;
		}
		if let Some(alphabet) = &self.alphabet {
			config.alphabet = alphabet.clone();
		}
		if let Some(policy) = self.policy {
			config.policy = policy;
		}
	}
}
