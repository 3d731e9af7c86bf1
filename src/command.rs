//! The `check` and `show` commands.
//!
//! `check` runs one pass and maps its outcome to a process exit status:
//!
//! | status             | code | when                                          |
//! |--------------------|------|-----------------------------------------------|
//! | `Success`          | 0    | the pass completed, with or without incidents |
//! | `Failure`          | 1    | configuration, backend or cache failure       |
//! | `AlreadyRunning`   | 2    | another pass holds the run lock               |
//!
//! Partial backlog failures and status page failures are reported as
//! warnings and do not change the exit status.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use backlogwatch_adapters::mysql::MySqlAdapter;
use backlogwatch_adapters::statuspage::StatuspageClient;
use backlogwatch_types::{SubType, Threshold};

use crate::cache::FileCache;
use crate::config::{DatabaseSettings, Settings, StatuspageSettings};
use crate::data::{describe, evaluate, Thresholds};
use crate::display::WidgetData;
use crate::report::StatusReporter;
use crate::runner::{PassOptions, PassReport, RunLock, Runner, RunnerError};
use crate::source::{FixtureSource, MetricSource, SqlSource};

/// Process exit status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    AlreadyRunning = 2,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

/// Options of the `check` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub kickoff_delay_seconds: Option<u64>,
    pub scheduled_delay_seconds: Option<u64>,
    pub kickoff_max_count: Option<u64>,
    pub scheduled_max_count: Option<u64>,
    /// Print fatal errors only.
    pub quiet: bool,
    /// Also print backlogs within their thresholds.
    pub verbose: bool,
    /// Store the snapshot but do not report.
    pub dry_run: bool,
    /// Read measurements from a JSON fixture instead of the database.
    pub fixture: Option<PathBuf>,
}

impl CheckOptions {
    /// Apply the command-line bounds on top of the configured thresholds.
    pub fn apply(&self, mut thresholds: Thresholds) -> Thresholds {
        let overrides = [
            (SubType::Kickoff, self.kickoff_max_count, self.kickoff_delay_seconds),
            (SubType::Scheduled, self.scheduled_max_count, self.scheduled_delay_seconds),
        ];
        for (sub_type, max_count, max_delay) in overrides {
            let mut threshold: Threshold = thresholds.get(sub_type);
            if let Some(count) = max_count {
                threshold.max_count = Some(count);
            }
            if let Some(delay) = max_delay {
                threshold.max_delay_seconds = Some(delay);
            }
            thresholds.set(threshold);
        }
        thresholds
    }
}

/// Run one health check pass.
///
/// Builds the runner from `settings`, runs the pass and prints the result.
/// Fatal errors go to `err` even in quiet mode.
pub async fn run_health_check(
    settings: &Settings,
    options: &CheckOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
    shutdown: watch::Receiver<bool>,
) -> ExitStatus {
    let runner = match build_runner(settings, options).await {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Health check setup failed");
            let _ = writeln!(err, "[FAIL] {:#}", e);
            return ExitStatus::Failure;
        }
    };
    check_with(&runner, options, out, err, shutdown).await
}

/// Run one pass on an already built runner and print the result.
pub async fn check_with(
    runner: &Runner,
    options: &CheckOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
    shutdown: watch::Receiver<bool>,
) -> ExitStatus {
    let pass_options = PassOptions {
        dry_run: options.dry_run,
    };

    match runner.run_pass_with_shutdown(pass_options, shutdown).await {
        Ok(pass) => {
            if !options.quiet {
                if let Err(e) = print_pass(&pass, runner.thresholds(), options.verbose, out) {
                    warn!(error = %e, "Failed to write check output");
                }
            }
            ExitStatus::Success
        }
        Err(RunnerError::AlreadyRunning) => {
            info!("Another health check is running; skipping");
            if !options.quiet {
                let _ = writeln!(err, "[SKIP] Another health check is already running.");
            }
            ExitStatus::AlreadyRunning
        }
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            let _ = writeln!(err, "[FAIL] {}", e);
            ExitStatus::Failure
        }
    }
}

fn print_pass(
    pass: &PassReport,
    thresholds: &Thresholds,
    verbose: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    for incident in &pass.snapshot.incidents {
        writeln!(out, "[CRIT] {}", incident.message)?;
    }

    if verbose {
        for m in &pass.snapshot.measurements {
            if evaluate(m, &thresholds.get(m.sub_type)).is_none() {
                writeln!(out, "[ OK ] {}", describe(m))?;
            }
        }
    }

    for failure in &pass.failed {
        writeln!(
            out,
            "[WARN] {} backlog check failed: {}",
            failure.sub_type, failure.reason
        )?;
    }

    if pass.snapshot.is_healthy() {
        writeln!(
            out,
            "[ OK ] No delays detected ({} backlogs measured).",
            pass.snapshot.measurements.len()
        )?;
    }

    match &pass.report {
        Ok(outcome) if verbose => writeln!(out, "Status page: {}", outcome)?,
        Ok(_) => {}
        Err(e) => writeln!(out, "[WARN] {}", e)?,
    }
    Ok(())
}

/// Build a runner from configuration.
pub async fn build_runner(settings: &Settings, options: &CheckOptions) -> Result<Runner> {
    let source: Arc<dyn MetricSource> = match &options.fixture {
        Some(path) => Arc::new(FixtureSource::new(path)),
        None => Arc::new(connect_database(&settings.database, settings.monitor.round_delays).await?),
    };
    let cache = Arc::new(FileCache::new(&settings.cache.path));

    let mut builder = Runner::builder(source, cache)
        .thresholds(options.apply(settings.thresholds()))
        .settings(settings.runner_settings())
        .reporter(build_reporter(&settings.statuspage));

    if settings.lock.enabled {
        builder = builder.lock(RunLock::new(&settings.lock.path).stale_after(settings.lock.stale_after));
    }
    Ok(builder.build())
}

async fn connect_database(database: &DatabaseSettings, round_delays: bool) -> Result<SqlSource> {
    let url = database
        .replica_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .or(database.url.as_deref())
        .context("database.url is not set; pass --fixture to run without a database")?;

    let mut builder = MySqlAdapter::builder()
        .table_prefix(&database.table_prefix)
        .index_hints(database.index_hints)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout)
        .round_delays(round_delays);
    if let Some(primary) = &database.url {
        builder = builder.url(primary);
    }
    if let Some(replica) = &database.replica_url {
        builder = builder.replica_url(replica);
    }

    let adapter = builder
        .build()
        .await
        .with_context(|| format!("failed to connect to {}", display_host(url)))?;
    Ok(SqlSource::new(adapter, &display_host(url)))
}

/// A status reporter, or a disabled one when the status page is not
/// configured or the client cannot be built.
pub fn build_reporter(statuspage: &StatuspageSettings) -> StatusReporter {
    if !statuspage.is_configured() {
        info!("Status page reporting disabled: api_key, page_id and component_id are required");
        return StatusReporter::disabled();
    }

    let mut builder = StatuspageClient::builder()
        .api_key(statuspage.api_key.clone().unwrap_or_default())
        .page_id(statuspage.page_id.clone().unwrap_or_default())
        .timeout(statuspage.timeout);
    if let Some(base_url) = &statuspage.base_url {
        builder = builder.base_url(base_url);
    }

    match builder.build() {
        Ok(client) => StatusReporter::new(Arc::new(client), statuspage.reporter_settings()),
        Err(e) => {
            warn!(error = %e, "Status page client unavailable; reporting disabled");
            StatusReporter::disabled()
        }
    }
}

/// Host part of a database URL, without credentials.
fn display_host(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let rest = rest.rsplit_once('@').map(|(_, host)| host).unwrap_or(rest);
    rest.split(['/', '?']).next().unwrap_or(rest).to_string()
}

/// Print the latest cached snapshot.
pub fn show_snapshot(settings: &Settings, json: bool, out: &mut dyn Write) -> Result<ExitStatus> {
    let cache = FileCache::new(&settings.cache.path);
    let data = WidgetData::load(&settings.dashboard, &cache)
        .with_context(|| format!("failed to read {}", cache.path().display()))?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &data.snapshot)?;
        writeln!(out)?;
        return Ok(ExitStatus::Success);
    }

    let Some(snapshot) = &data.snapshot else {
        writeln!(out, "No data yet: no health check has completed.")?;
        return Ok(ExitStatus::Success);
    };

    if let Some(at) = data.calculated_at() {
        writeln!(out, "Calculated: {}", at)?;
    }
    if snapshot.is_healthy() {
        writeln!(out, "No delays detected.")?;
    }
    for incident in &snapshot.incidents {
        writeln!(out, "[CRIT] {}", incident.message)?;
    }
    writeln!(out, "{} backlogs measured.", snapshot.measurements.len())?;
    Ok(ExitStatus::Success)
}
