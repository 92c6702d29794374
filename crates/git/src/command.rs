use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Identity used for search commits when the ambient git config has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
	pub name: String,
	pub email: String,
}

/// Runs one git binary with fixed global options.
#[derive(Debug, Clone)]
pub(crate) struct Git {
	program: PathBuf,
	identity: Option<CommitIdentity>,
}

impl Git {
	pub(crate) fn new(program: PathBuf, identity: Option<CommitIdentity>) -> Self {
		Self { program, identity }
	}

	/// Runs `git [-C dir] args...` and returns trimmed stdout.
	///
	/// A non-zero exit becomes an error carrying the trimmed stderr.
	pub(crate) async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String, String> {
		let mut command = tokio::process::Command::new(&self.program);
		if let Some(dir) = dir {
			command.arg("-C").arg(dir);
		}
		if let Some(identity) = &self.identity {
			command.arg("-c").arg(format!("user.name={}", identity.name));
			command.arg("-c").arg(format!("user.email={}", identity.email));
		}
		command
			.arg("-c")
			.arg("commit.gpgsign=false")
			.args(args)
			.stdin(Stdio::null())
			.kill_on_drop(true);

		tracing::trace!(dir = ?dir, ?args, "git.run");
		let output = command.output().await.map_err(|err| format!("failed to spawn {}: {err}", self.program.display()))?;
		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
		} else {
			let stderr = String::from_utf8_lossy(&output.stderr);
			Err(format!("git {} exited with {}: {}", args.first().copied().unwrap_or_default(), output.status, stderr.trim()))
		}
	}
}
