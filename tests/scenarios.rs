//! End-to-end passes over in-memory sources.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::watch;

use backlogwatch::command::check_with;
use backlogwatch::data::{aggregate_at, evaluate, DedupKey};
use backlogwatch::runner::RunLock;
use backlogwatch::{
    CheckOptions, ExitStatus, FileCache, MemoryCache, PassOptions, Runner, RunnerError,
    RunnerSettings, SnapshotCache, StaticSource, Thresholds,
};
use backlogwatch_types::{Measurement, Snapshot, SubType, Threshold};

fn delay_limit(sub_type: SubType, seconds: u64) -> Threshold {
    Threshold::unset(sub_type).with_max_delay_seconds(seconds)
}

fn kickoff(id: u64, count: u64, delay: f64) -> Measurement {
    Measurement::new(id, format!("Campaign {id}"), SubType::Kickoff)
        .with_count(count)
        .with_avg_delay_seconds(delay)
}

fn scheduled(id: u64, event: u64, count: u64, delay: f64) -> Measurement {
    Measurement::new(id, format!("Campaign {id}"), SubType::Scheduled)
        .with_event(event, format!("Event {event}"))
        .with_count(count)
        .with_avg_delay_seconds(delay)
}

/// A shutdown signal that never fires.
fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[test]
fn scenario_a_long_delay_is_an_incident() {
    let m = kickoff(1, 50, 7200.0);
    let incident = evaluate(&m, &delay_limit(SubType::Kickoff, 3600)).expect("incident");
    assert!(incident.message.contains("7200"));
    assert!(incident.exceeded.includes_delay());
    assert!(!incident.exceeded.includes_count());
}

#[test]
fn scenario_b_short_delay_is_healthy() {
    let m = kickoff(1, 5, 100.0);
    assert!(evaluate(&m, &delay_limit(SubType::Kickoff, 3600)).is_none());
}

#[tokio::test]
async fn scenario_c_empty_pass_is_healthy() {
    let cache = Arc::new(MemoryCache::new());
    let runner = Runner::builder(Arc::new(StaticSource::new()), cache.clone()).build();

    let pass = runner.run_pass(PassOptions::default()).await.unwrap();
    assert!(pass.snapshot.incidents.is_empty());
    assert!(pass.snapshot.is_healthy());
    assert!(pass.is_complete());

    let cached = cache.latest().unwrap().expect("snapshot stored");
    assert!(cached.incidents.is_empty());
}

#[tokio::test]
async fn scenario_d_held_lock_leaves_cache_untouched() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("snapshot.json");
    let lock = RunLock::new(dir.path().join("backlogwatch.lock"));

    let cache = Arc::new(FileCache::new(&cache_path));
    cache.store(&Snapshot::with_timestamp(1234)).unwrap();
    let before = std::fs::read(&cache_path).unwrap();

    let source = Arc::new(StaticSource::new().measurement(kickoff(1, 50, 7200.0)));
    let runner = Runner::builder(source.clone(), cache.clone())
        .lock(lock.clone())
        .build();

    let _held = lock.acquire().unwrap();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let status = check_with(
        &runner,
        &CheckOptions::default(),
        &mut out,
        &mut err,
        no_shutdown(),
    )
    .await;

    assert_eq!(status, ExitStatus::AlreadyRunning);
    assert_eq!(source.fetch_count(), 0);
    assert_eq!(std::fs::read(&cache_path).unwrap(), before);
    assert!(out.is_empty());
    assert!(String::from_utf8(err).unwrap().contains("already running"));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_concurrent_pass_in_process() {
    let source = StaticSource::new()
        .measurement(kickoff(1, 50, 7200.0))
        .latency(SubType::Kickoff, Duration::from_secs(5));
    let runner = Arc::new(
        Runner::builder(Arc::new(source), Arc::new(MemoryCache::new())).build(),
    );

    let first = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_pass(PassOptions::default()).await })
    };
    tokio::task::yield_now().await;

    let second = runner.run_pass(PassOptions::default()).await;
    assert!(matches!(second, Err(RunnerError::AlreadyRunning)));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.snapshot.incidents.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_e_scheduled_timeout_keeps_kickoff_incidents() {
    let source = StaticSource::new()
        .measurements([kickoff(1, 50, 7200.0), scheduled(2, 20, 9, 9000.0)])
        .latency(SubType::Scheduled, Duration::from_secs(600));
    let cache = Arc::new(MemoryCache::new());
    let runner = Runner::builder(Arc::new(source), cache.clone())
        .settings(RunnerSettings {
            query_timeout: Duration::from_secs(30),
            ..Default::default()
        })
        .build();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let status = check_with(
        &runner,
        &CheckOptions::default(),
        &mut out,
        &mut err,
        no_shutdown(),
    )
    .await;
    assert_eq!(status, ExitStatus::Success);

    let snapshot = cache.latest().unwrap().unwrap();
    assert_eq!(snapshot.incidents.len(), 1);
    assert!(snapshot
        .incidents
        .iter()
        .all(|i| i.sub_type() == SubType::Kickoff));

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("[CRIT] Campaign Campaign 1 (1)"));
    assert!(out.contains("[WARN] scheduled backlog check failed: timed out after 30s"));
}

#[tokio::test]
async fn unreachable_backend_is_a_failure() {
    let cache = Arc::new(MemoryCache::new());
    let runner = Runner::builder(
        Arc::new(StaticSource::new().unreachable("connection refused")),
        cache.clone(),
    )
    .build();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let options = CheckOptions {
        quiet: true,
        ..Default::default()
    };
    let status = check_with(&runner, &options, &mut out, &mut err, no_shutdown()).await;

    assert_eq!(status, ExitStatus::Failure);
    assert!(cache.latest().unwrap().is_none());
    assert!(out.is_empty());
    // Fatal errors are printed even in quiet mode.
    assert!(String::from_utf8(err).unwrap().starts_with("[FAIL]"));
}

#[tokio::test]
async fn every_category_failing_is_a_failure() {
    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("snapshot.json");
    let cache = Arc::new(FileCache::new(&cache_path));
    cache.store(&Snapshot::with_timestamp(1234)).unwrap();
    let before = std::fs::read(&cache_path).unwrap();

    let source = StaticSource::new()
        .measurement(kickoff(1, 50, 7200.0))
        .failing(SubType::Kickoff, "deadlock")
        .failing(SubType::Scheduled, "deadlock");
    let runner = Runner::builder(Arc::new(source), cache.clone()).build();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let status = check_with(
        &runner,
        &CheckOptions::default(),
        &mut out,
        &mut err,
        no_shutdown(),
    )
    .await;

    assert_eq!(status, ExitStatus::Failure);
    assert_eq!(std::fs::read(&cache_path).unwrap(), before);
    assert!(!String::from_utf8(out).unwrap().contains("No delays detected"));
    assert!(String::from_utf8(err)
        .unwrap()
        .contains("metric backend unavailable: Query failed: deadlock"));
}

#[tokio::test]
async fn verbose_output_lists_healthy_backlogs() {
    let source = StaticSource::new().measurements([kickoff(1, 2, 10.0), kickoff(2, 80, 4000.0)]);
    let runner = Runner::builder(Arc::new(source), Arc::new(MemoryCache::new())).build();

    let mut out = Vec::new();
    let options = CheckOptions {
        verbose: true,
        dry_run: true,
        ..Default::default()
    };
    let status = check_with(&runner, &options, &mut out, &mut Vec::new(), no_shutdown()).await;
    assert_eq!(status, ExitStatus::Success);

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("[CRIT] Campaign Campaign 2 (2) has 80 contacts"));
    assert!(out.contains("[ OK ] Campaign Campaign 1 (1) has 2 contacts"));
    assert!(out.contains("Status page: dry run, not reported"));
}

#[test]
fn aggregate_is_idempotent_and_sorted() {
    let measurements = vec![
        kickoff(1, 50, 4000.0),
        scheduled(2, 20, 9, 9000.0),
        kickoff(3, 50, 7000.0),
        scheduled(2, 21, 4, 100.0),
    ];
    let thresholds = Thresholds::new()
        .with(delay_limit(SubType::Kickoff, 3600))
        .with(delay_limit(SubType::Scheduled, 3600));

    let first = aggregate_at(measurements.clone(), &thresholds, DedupKey::ResourceEvent, 1);
    let second = aggregate_at(measurements, &thresholds, DedupKey::ResourceEvent, 2);
    assert_eq!(first.incidents, second.incidents);
    assert_eq!(first.measurements, second.measurements);

    let delays: Vec<f64> = first.incidents.iter().map(|i| i.avg_delay_seconds()).collect();
    assert_eq!(delays, vec![9000.0, 7000.0, 4000.0]);
    assert!(delays.windows(2).all(|w| w[0] >= w[1]));
}
