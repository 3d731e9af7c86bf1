//! One monitoring pass: fetch, evaluate, cache, report.
//!
//! ```text
//! Idle ──▶ FetchingMetrics ──▶ Evaluating ──▶ Reporting ──▶ Idle
//! ```
//!
//! The current state is published on a watch channel. Whatever happens
//! (error, timeout, cancellation) the runner is back in `Idle` once the pass
//! future completes or is dropped.

pub mod lock;

pub use lock::{LockError, RunLock, RunLockGuard, DEFAULT_STALE_AFTER};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{Measurement, Snapshot, SubType};

use crate::cache::{CacheError, SnapshotCache};
use crate::data::duration::format_duration;
use crate::data::{aggregate, DedupKey, Thresholds};
use crate::report::{ReportError, ReportOutcome, StatusReporter};
use crate::source::MetricSource;

/// Default trailing window over which backlogs are measured.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2 * 24 * 3600);

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    FetchingMetrics,
    Evaluating,
    Reporting,
}

/// Fatal pass errors. Per-category and reporting failures are not here;
/// they are recorded in the [`PassReport`] instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("another pass is already running")]
    AlreadyRunning,

    #[error("metric backend unavailable: {0}")]
    BackendUnavailable(#[source] AdapterError),

    #[error("failed to store snapshot: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Lock(LockError),

    #[error("pass cancelled")]
    Cancelled,
}

/// Per-pass options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Evaluate and cache, but do not touch the status page.
    pub dry_run: bool,
}

/// A backlog category that could not be measured in this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFailure {
    pub sub_type: SubType,
    pub reason: String,
}

/// Everything a completed pass produced.
#[derive(Debug)]
pub struct PassReport {
    pub snapshot: Snapshot,
    pub failed: Vec<CategoryFailure>,
    pub report: Result<ReportOutcome, ReportError>,
}

impl PassReport {
    /// True when every configured category was measured.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Scheduling and scoping settings of the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub window: Duration,
    pub query_timeout: Duration,
    pub report_timeout: Duration,
    pub sub_types: Vec<SubType>,
    /// Campaigns to monitor. Empty means all published campaigns.
    pub resource_ids: BTreeSet<u64>,
    pub dedup: DedupKey,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            report_timeout: DEFAULT_REPORT_TIMEOUT,
            sub_types: SubType::ALL.to_vec(),
            resource_ids: BTreeSet::new(),
            dedup: DedupKey::default(),
        }
    }
}

/// Runs monitoring passes.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use backlogwatch::{MemoryCache, PassOptions, Runner, StaticSource};
/// use backlogwatch_types::{Measurement, SubType};
///
/// # tokio_test::block_on(async {
/// let source = StaticSource::new().measurement(
///     Measurement::new(7, "Welcome", SubType::Kickoff)
///         .with_count(50)
///         .with_avg_delay_seconds(7200.0),
/// );
/// let runner = Runner::builder(Arc::new(source), Arc::new(MemoryCache::new())).build();
///
/// let pass = runner.run_pass(PassOptions::default()).await.unwrap();
/// assert_eq!(pass.snapshot.incidents.len(), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct Runner {
    source: Arc<dyn MetricSource>,
    cache: Arc<dyn SnapshotCache>,
    // Doubles as the in-process pass lock.
    reporter: Mutex<StatusReporter>,
    thresholds: Thresholds,
    settings: RunnerSettings,
    lock: Option<RunLock>,
    state: watch::Sender<PassState>,
}

impl Runner {
    /// Create a new builder for configuring the runner.
    pub fn builder(source: Arc<dyn MetricSource>, cache: Arc<dyn SnapshotCache>) -> RunnerBuilder {
        RunnerBuilder {
            source,
            cache,
            reporter: None,
            thresholds: Thresholds::default(),
            settings: RunnerSettings::default(),
            lock: None,
        }
    }

    /// Current pass state.
    pub fn state(&self) -> PassState {
        *self.state.borrow()
    }

    /// Watch pass state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PassState> {
        self.state.subscribe()
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run one pass.
    pub async fn run_pass(&self, options: PassOptions) -> Result<PassReport, RunnerError> {
        let mut reporter = self
            .reporter
            .try_lock()
            .map_err(|_| RunnerError::AlreadyRunning)?;
        let _file_lock = match &self.lock {
            Some(lock) => Some(lock.acquire().map_err(|e| match e {
                LockError::Held { .. } => RunnerError::AlreadyRunning,
                other => RunnerError::Lock(other),
            })?),
            None => None,
        };
        let _idle = IdleOnDrop(&self.state);

        self.state.send_replace(PassState::FetchingMetrics);
        let (measurements, failed) = self.fetch_all().await?;

        self.state.send_replace(PassState::Evaluating);
        let snapshot = aggregate(measurements, &self.thresholds, self.settings.dedup);
        self.cache.store(&snapshot)?;
        debug!(
            measurements = snapshot.measurements.len(),
            incidents = snapshot.incidents.len(),
            "Snapshot stored"
        );

        self.state.send_replace(PassState::Reporting);
        let report = if options.dry_run {
            Ok(ReportOutcome::DryRun)
        } else {
            let limit = self.settings.report_timeout;
            match timeout(limit, reporter.report(&snapshot)).await {
                Ok(result) => result,
                Err(_) => Err(ReportError::Timeout(limit)),
            }
        };
        match &report {
            Ok(outcome) => debug!(?outcome, "Report finished"),
            Err(e) => warn!(error = %e, "Status page report failed"),
        }

        info!(
            incidents = snapshot.incidents.len(),
            failed_categories = failed.len(),
            "Pass complete"
        );
        Ok(PassReport {
            snapshot,
            failed,
            report,
        })
    }

    /// Run one pass, giving up as soon as `shutdown` turns true.
    ///
    /// The snapshot is stored in one synchronous step, so a cancelled pass
    /// leaves the cache either untouched or fully updated.
    pub async fn run_pass_with_shutdown(
        &self,
        options: PassOptions,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<PassReport, RunnerError> {
        tokio::select! {
            result = self.run_pass(options) => result,
            _ = shutdown_requested(&mut shutdown) => {
                warn!("Pass cancelled by shutdown request");
                Err(RunnerError::Cancelled)
            }
        }
    }

    async fn fetch_all(&self) -> Result<(Vec<Measurement>, Vec<CategoryFailure>), RunnerError> {
        let limit = self.settings.query_timeout;

        let catalog = match timeout(limit, self.source.resources()).await {
            Ok(Ok(catalog)) => catalog,
            Ok(Err(e)) => return Err(RunnerError::BackendUnavailable(e)),
            Err(_) => return Err(RunnerError::BackendUnavailable(AdapterError::Timeout)),
        };
        let catalog = catalog.restrict_to(&self.settings.resource_ids);
        debug!(
            source = self.source.description(),
            campaigns = catalog.campaigns.len(),
            "Catalog loaded"
        );

        let window = self.settings.window;
        let catalog = &catalog;
        let fetches = self.settings.sub_types.iter().map(|&sub_type| async move {
            let result = match timeout(limit, self.source.fetch(sub_type, catalog, window)).await {
                Ok(Ok(found)) => Ok(found),
                Ok(Err(e)) => {
                    debug!(%sub_type, transient = e.is_transient(), "Backlog query failed");
                    Err((e.to_string(), e))
                }
                Err(_) => Err((
                    format!("timed out after {}", format_duration(limit)),
                    AdapterError::Timeout,
                )),
            };
            (sub_type, result)
        });

        let mut measurements = Vec::new();
        let mut failed = Vec::new();
        let mut last_error = None;
        for (sub_type, result) in join_all(fetches).await {
            match result {
                Ok(found) => {
                    debug!(%sub_type, count = found.len(), "Backlog measured");
                    measurements.extend(found);
                }
                Err((reason, error)) => {
                    warn!(%sub_type, %reason, "Backlog check failed");
                    failed.push(CategoryFailure { sub_type, reason });
                    last_error = Some(error);
                }
            }
        }

        // Nothing was measured: an empty snapshot would read as healthy.
        if failed.len() == self.settings.sub_types.len() {
            if let Some(error) = last_error {
                return Err(RunnerError::BackendUnavailable(error));
            }
        }
        Ok((measurements, failed))
    }
}

/// Builder for Runner.
#[derive(Debug)]
pub struct RunnerBuilder {
    source: Arc<dyn MetricSource>,
    cache: Arc<dyn SnapshotCache>,
    reporter: Option<StatusReporter>,
    thresholds: Thresholds,
    settings: RunnerSettings,
    lock: Option<RunLock>,
}

impl RunnerBuilder {
    /// Set the status reporter (default: disabled).
    pub fn reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Guard passes with a cross-process lock file.
    pub fn lock(mut self, lock: RunLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn build(self) -> Runner {
        let (state, _) = watch::channel(PassState::Idle);
        Runner {
            source: self.source,
            cache: self.cache,
            reporter: Mutex::new(self.reporter.unwrap_or_else(StatusReporter::disabled)),
            thresholds: self.thresholds,
            settings: self.settings,
            lock: self.lock,
            state,
        }
    }
}

/// Puts the runner back to `Idle` when dropped.
struct IdleOnDrop<'a>(&'a watch::Sender<PassState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(PassState::Idle);
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender gone: nobody can ask us to stop any more.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::source::StaticSource;

    fn slow_kickoff() -> Measurement {
        Measurement::new(7, "Welcome", SubType::Kickoff)
            .with_count(50)
            .with_avg_delay_seconds(7200.0)
    }

    #[tokio::test]
    async fn test_pass_caches_snapshot_and_returns_idle() {
        let cache = Arc::new(MemoryCache::new());
        let runner = Runner::builder(
            Arc::new(StaticSource::new().measurement(slow_kickoff())),
            cache.clone(),
        )
        .build();

        let pass = runner.run_pass(PassOptions { dry_run: true }).await.unwrap();
        assert_eq!(pass.snapshot.incidents.len(), 1);
        assert!(pass.is_complete());
        assert_eq!(pass.report.unwrap(), ReportOutcome::DryRun);
        assert_eq!(runner.state(), PassState::Idle);
        assert_eq!(cache.latest().unwrap(), Some(pass.snapshot));
    }

    #[tokio::test]
    async fn test_disabled_reporter_outcome() {
        let runner = Runner::builder(
            Arc::new(StaticSource::new()),
            Arc::new(MemoryCache::new()),
        )
        .build();
        let pass = runner.run_pass(PassOptions::default()).await.unwrap();
        assert_eq!(pass.report.unwrap(), ReportOutcome::Disabled);
        assert!(pass.snapshot.is_healthy());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_fatal() {
        let cache = Arc::new(MemoryCache::new());
        let runner = Runner::builder(
            Arc::new(StaticSource::new().unreachable("connection refused")),
            cache.clone(),
        )
        .build();

        let err = runner.run_pass(PassOptions::default()).await.unwrap_err();
        assert!(matches!(err, RunnerError::BackendUnavailable(_)));
        assert!(cache.latest().unwrap().is_none());
        assert_eq!(runner.state(), PassState::Idle);
    }

    #[tokio::test]
    async fn test_failed_category_is_isolated() {
        let source = StaticSource::new()
            .measurement(slow_kickoff())
            .failing(SubType::Scheduled, "deadlock");
        let runner = Runner::builder(Arc::new(source), Arc::new(MemoryCache::new())).build();

        let pass = runner.run_pass(PassOptions::default()).await.unwrap();
        assert_eq!(pass.snapshot.incidents.len(), 1);
        assert_eq!(
            pass.failed,
            vec![CategoryFailure {
                sub_type: SubType::Scheduled,
                reason: "Query failed: deadlock".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_every_category_failing_is_fatal() {
        let cache = Arc::new(MemoryCache::new());
        cache.store(&Snapshot::with_timestamp(1234)).unwrap();
        let source = StaticSource::new()
            .measurement(slow_kickoff())
            .failing(SubType::Kickoff, "gone")
            .failing(SubType::Scheduled, "gone");
        let runner = Runner::builder(Arc::new(source), cache.clone()).build();

        let err = runner.run_pass(PassOptions::default()).await.unwrap_err();
        match err {
            RunnerError::BackendUnavailable(e) => assert_eq!(e.to_string(), "Query failed: gone"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.latest().unwrap().unwrap().generated_at_ms, 1234);
        assert_eq!(runner.state(), PassState::Idle);
    }

    #[tokio::test]
    async fn test_configured_sub_types_only() {
        let source = Arc::new(StaticSource::new().measurement(slow_kickoff()));
        let settings = RunnerSettings {
            sub_types: vec![SubType::Scheduled],
            ..Default::default()
        };
        let runner = Runner::builder(source.clone(), Arc::new(MemoryCache::new()))
            .settings(settings)
            .build();

        let pass = runner.run_pass(PassOptions::default()).await.unwrap();
        assert!(pass.snapshot.is_healthy());
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let runner = Runner::builder(
            Arc::new(StaticSource::new().measurement(slow_kickoff())),
            Arc::new(MemoryCache::new()),
        )
        .build();
        let mut states = runner.subscribe();
        assert_eq!(*states.borrow_and_update(), PassState::Idle);

        runner.run_pass(PassOptions::default()).await.unwrap();
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), PassState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pass() {
        let cache = Arc::new(MemoryCache::new());
        let source = StaticSource::new()
            .measurement(slow_kickoff())
            .latency(SubType::Kickoff, Duration::from_secs(30));
        let runner = Runner::builder(Arc::new(source), cache.clone()).build();

        let (stop_tx, stop_rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = stop_tx.send(true);
            stop_tx
        });

        let err = runner
            .run_pass_with_shutdown(PassOptions::default(), stop_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled));
        assert!(cache.latest().unwrap().is_none());
        assert_eq!(runner.state(), PassState::Idle);
        drop(stopper.await.unwrap());
    }
}
