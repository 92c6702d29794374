//! selfsha binary.
//!
//! Clones the source repository once per worker and commits random short
//! hashes until one worker's commit hash starts with the hash it names.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use selfsha_git::{CommitIdentity, GitFactory};
use selfsha_search::{GuessGenerator, HandleFactory, SearchConfig, Supervisor};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod args;

use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let mut config = match &args.config {
		Some(path) => SearchConfig::load(path)?,
		None => SearchConfig::default(),
	};
	args.apply(&mut config);
	config.validate()?;

	if args.clean {
		clean_directory(&config.directory).await?;
	}
	let run_dir = run_directory(&config.directory)?;
	info!(run_dir = %run_dir.display(), source = %config.source, workers = config.workers, "starting selfsha");

	let identity = match (&config.commit_name, &config.commit_email) {
		(Some(name), Some(email)) => Some(CommitIdentity {
			name: name.clone(),
			email: email.clone(),
		}),
		_ => None,
	};
	let factory = GitFactory::discover(identity)?;
	if let Some(space) = factory.identifier_space() {
		config.validate_for(&space)?;
	}
	let supervisor = Supervisor::new(factory, config.worker_settings(run_dir), GuessGenerator::from_time(config.alphabet()?))
		.workers(config.workers)
		.policy(config.policy())
		.stagger(config.stagger())
		.shutdown_grace(config.shutdown_grace());

	let shutdown = CancellationToken::new();
	spawn_ctrl_c(shutdown.clone());

	let result = supervisor.run(shutdown).await?;
	println!("{result}");
	Ok(())
}

async fn clean_directory(directory: &Path) -> anyhow::Result<()> {
	match tokio::fs::remove_dir_all(directory).await {
		Ok(()) => {
			info!(directory = %directory.display(), "removed previous clones");
			Ok(())
		}
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(err) => Err(err).with_context(|| format!("failed to remove {}", directory.display())),
	}
}

/// `<directory>/<unix-seconds>`, unique per run.
fn run_directory(directory: &Path) -> anyhow::Result<PathBuf> {
	let started = SystemTime::now().duration_since(UNIX_EPOCH).context("system clock is before the unix epoch")?;
	Ok(directory.join(started.as_secs().to_string()))
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("interrupt received, stopping workers");
			shutdown.cancel();
		}
	});
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

	// SELFSHA_LOG_DIR keeps stderr clean for long runs
	if let Some(log_dir) = std::env::var("SELFSHA_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("selfsha.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::registry()
		.with(filter())
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}
