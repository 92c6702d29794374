use std::collections::HashSet;
use std::path::Path;

use super::*;
use crate::Alphabet;
use crate::test_support::{Derive, MemoryFactory};
use crate::worker::ARTIFACT_FILE;

fn settings(run_dir: &Path, length: usize) -> WorkerSettings {
	WorkerSettings {
		source: "origin".to_string(),
		run_dir: run_dir.to_path_buf(),
		length,
		refresh_interval: 1000,
		log_interval: 1000,
		compact_interval: 0,
	}
}

fn binary_supervisor(factory: MemoryFactory, run_dir: &Path) -> Supervisor<MemoryFactory> {
	Supervisor::new(factory, settings(run_dir, 2), GuessGenerator::seeded(Alphabet::new("01").unwrap(), 17))
		.stagger(Duration::ZERO)
		.shutdown_grace(Duration::from_secs(2))
}

const RESPAWN_FAST: SupervisorPolicy = SupervisorPolicy::Resilient {
	respawn_delay: Duration::from_millis(1),
};

#[tokio::test]
async fn binary_search_finds_fixed_identifier() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Fixed("01"));
	let supervisor = binary_supervisor(factory.clone(), dir.path());
	let registry = supervisor.registry();

	let result = tokio::time::timeout(Duration::from_secs(10), supervisor.run(CancellationToken::new()))
		.await
		.expect("search terminates")
		.expect("search succeeds");

	assert_eq!(result.identifier.as_str(), "01");
	assert!(registry.live().is_empty());
	let artifact = std::fs::read_to_string(dir.path().join(format!("{}-self-referential-commit", result.worker)).join(ARTIFACT_FILE)).unwrap();
	assert_eq!(artifact.trim(), result.to_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_success_stops_every_peer() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Fixed("01"));
	let supervisor = binary_supervisor(factory, dir.path()).workers(4);
	let registry = supervisor.registry();
	let results = supervisor.results();

	let result = tokio::time::timeout(Duration::from_secs(10), supervisor.run(CancellationToken::new()))
		.await
		.expect("search terminates")
		.expect("search succeeds");

	assert_eq!(results.get(), Some(&result));
	assert!(registry.live().is_empty(), "all workers exit after the first success");
	assert_eq!(registry.snapshots().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_matches_produce_one_result() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Echo);
	let supervisor = Supervisor::new(factory, settings(dir.path(), 7), GuessGenerator::seeded(Alphabet::hex(), 4))
		.workers(8)
		.stagger(Duration::ZERO);
	let registry = supervisor.registry();
	let results = supervisor.results();

	let result = supervisor.run(CancellationToken::new()).await.expect("every attempt matches");

	assert_eq!(results.get(), Some(&result));
	let winners = registry
		.snapshots()
		.into_iter()
		.filter(|record| record.last_exit.as_deref().is_some_and(|exit| exit.starts_with("matched") && !exit.ends_with("after another worker")))
		.count();
	assert_eq!(winners, 1);
	assert!(settings(dir.path(), 7).local_path(result.worker).join(ARTIFACT_FILE).exists());
}

#[tokio::test]
async fn fail_fast_propagates_first_failure() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Fixed("zz")).fail_realize_after(0);
	let supervisor = binary_supervisor(factory, dir.path()).workers(3).policy(SupervisorPolicy::FailFast);
	let registry = supervisor.registry();

	let err = tokio::time::timeout(Duration::from_secs(10), supervisor.run(CancellationToken::new()))
		.await
		.expect("search terminates")
		.expect_err("realize always fails");

	let SupervisorError::WorkerFailed { source, .. } = err else {
		panic!("expected worker failure, got {err:?}");
	};
	assert!(matches!(source, SearchError::Realize { .. }));
	assert!(registry.live().is_empty());
	assert_eq!(registry.respawns(), 0);
}

#[tokio::test]
async fn fail_fast_reports_panics_with_their_message() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Echo).panic_on_realize();
	let supervisor = binary_supervisor(factory, dir.path()).policy(SupervisorPolicy::FailFast);

	let err = supervisor.run(CancellationToken::new()).await.expect_err("worker panics");
	let SupervisorError::WorkerFailed {
		source: SearchError::Panicked(message),
		..
	} = err
	else {
		panic!("expected panic failure, got {err:?}");
	};
	assert!(message.contains("stub realize panicked"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resilient_policy_keeps_respawning_failed_workers() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Fixed("zz")).fail_realize_after(0);
	let supervisor = binary_supervisor(factory.clone(), dir.path()).workers(2).policy(RESPAWN_FAST);
	let registry = supervisor.registry();
	let cancel = CancellationToken::new();
	let run = tokio::spawn(supervisor.run(cancel.clone()));

	tokio::time::timeout(Duration::from_secs(10), async {
		while registry.respawns() < 10 {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.expect("respawn count keeps growing");
	assert!(!run.is_finished(), "failures never end a resilient search");

	cancel.cancel();
	let outcome = tokio::time::timeout(Duration::from_secs(5), run).await.expect("run stops on cancel").unwrap();
	assert!(matches!(outcome, Err(SupervisorError::Cancelled)));
	assert!(registry.live().is_empty());

	let records = registry.snapshots();
	let ids: HashSet<_> = records.iter().map(|record| record.worker).collect();
	let paths: HashSet<_> = records.iter().map(|record| record.local_path.clone()).collect();
	assert_eq!(ids.len(), records.len());
	assert_eq!(paths.len(), records.len());

	let init_paths = factory.init_paths();
	let unique_inits: HashSet<_> = init_paths.iter().collect();
	assert_eq!(unique_inits.len(), init_paths.len(), "no two workers share a local path");
}

#[tokio::test]
async fn resilient_policy_recovers_and_finds_match() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Fixed("01")).fail_first_inits(2);
	let supervisor = binary_supervisor(factory.clone(), dir.path()).workers(2).policy(RESPAWN_FAST);
	let registry = supervisor.registry();

	let result = tokio::time::timeout(Duration::from_secs(10), supervisor.run(CancellationToken::new()))
		.await
		.expect("search terminates")
		.expect("replacements find the match");

	assert_eq!(result.identifier.as_str(), "01");
	assert_eq!(registry.respawns(), 2);
	assert!(result.worker.get() >= 2, "initial workers failed to initialize");
	let replaced: Vec<_> = registry
		.snapshots()
		.into_iter()
		.filter_map(|record| match record.reason {
			LaunchReason::Respawn { replaces } => Some(replaces.get()),
			LaunchReason::Initial => None,
		})
		.collect();
	assert_eq!(replaced.len(), 2);
	assert!(replaced.iter().all(|id| *id < 2));
}

#[tokio::test]
async fn external_cancellation_stops_the_search() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Digest);
	let supervisor = Supervisor::new(factory.clone(), settings(dir.path(), 7), GuessGenerator::seeded(Alphabet::hex(), 8))
		.workers(3)
		.stagger(Duration::ZERO);
	let registry = supervisor.registry();
	let cancel = CancellationToken::new();
	let run = tokio::spawn(supervisor.run(cancel.clone()));

	while factory.realizes() < 20 {
		tokio::task::yield_now().await;
	}
	cancel.cancel();

	let outcome = tokio::time::timeout(Duration::from_secs(5), run).await.expect("run stops on cancel").unwrap();
	assert!(matches!(outcome, Err(SupervisorError::Cancelled)));
	assert!(registry.live().is_empty());
	assert!(registry.total_attempts() >= 20);
	assert!(registry.snapshots().iter().all(|record| record.last_exit.as_deref() == Some("cancelled")));
}

#[tokio::test]
async fn initial_launches_are_staggered() {
	let dir = tempfile::tempdir().expect("create tempdir");
	let factory = MemoryFactory::new(Derive::Digest);
	let supervisor = Supervisor::new(factory.clone(), settings(dir.path(), 7), GuessGenerator::seeded(Alphabet::hex(), 8))
		.workers(3)
		.stagger(Duration::from_secs(30));
	let cancel = CancellationToken::new();
	let run = tokio::spawn(supervisor.run(cancel.clone()));

	while factory.realizes() < 5 {
		tokio::task::yield_now().await;
	}
	assert_eq!(factory.initializations(), 1, "later workers are still waiting out their stagger");

	cancel.cancel();
	let outcome = tokio::time::timeout(Duration::from_secs(5), run).await.expect("delayed workers observe cancel").unwrap();
	assert!(matches!(outcome, Err(SupervisorError::Cancelled)));
	assert_eq!(factory.initializations(), 1);
}

#[test]
fn stagger_delay_saturates_for_huge_indices() {
	let step = Duration::from_nanos(1);
	assert_eq!(stagger_delay(step, 3), Duration::from_nanos(3));
	assert_eq!(stagger_delay(step, usize::MAX), Duration::from_nanos(u64::from(u32::MAX)));
	assert_eq!(stagger_delay(Duration::MAX, 2), Duration::MAX);
}
