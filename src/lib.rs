//! # backlogwatch
//!
//! A scheduled backlog monitor for campaign processing queues.
//!
//! Each pass measures how many contacts are waiting on campaign work and how
//! long they have waited, turns threshold breaches into incidents, stores the
//! result as a snapshot for the dashboard, and keeps a status page incident in
//! line with it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Runner                                │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌──────────────┐  │
//! │  │ source  │───▶│   data   │───▶│  cache  │───▶│    report    │  │
//! │  │(measure)│    │(evaluate,│    │(snapshot│    │(status page) │  │
//! │  │         │    │aggregate)│    │  store) │    │              │  │
//! │  └─────────┘    └──────────┘    └────┬────┘    └──────────────┘  │
//! └──────────────────────────────────────┼───────────────────────────┘
//!                                        ▼
//!                          display ───▶ ui (dashboard)
//! ```
//!
//! - **[`source`]**: where measurements come from ([`MetricSource`] trait):
//!   the campaign database, a JSON fixture, or an in-memory list
//! - **[`data`]**: threshold evaluation, incident aggregation, duration
//!   parsing and formatting
//! - **[`cache`]**: last-write-wins storage of the latest [`Snapshot`]
//! - **[`report`]**: the status page reporter and its API seam
//! - **[`runner`]**: one pass from fetch to report, guarded by the run lock
//! - **[`command`]**: the `check` and `show` commands and their exit statuses
//! - **[`display`]**, **[`ui`]**, **[`app`]**, **[`events`]**: the dashboard
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Run one pass against the configured database (from cron)
//! backlogwatch check
//!
//! # Run against a fixture without reporting
//! backlogwatch check --fixture demos/fixture.json --dry-run -v
//!
//! # Print or watch the latest snapshot
//! backlogwatch show --json
//! backlogwatch dashboard --refresh 5
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use backlogwatch::{MemoryCache, PassOptions, Runner, SnapshotCache, StaticSource, Thresholds};
//! use backlogwatch_types::{Measurement, SubType, Threshold};
//!
//! # tokio_test::block_on(async {
//! let source = StaticSource::new().measurement(
//!     Measurement::new(3, "Trial", SubType::Kickoff).with_count(500),
//! );
//! let cache = Arc::new(MemoryCache::new());
//! let runner = Runner::builder(Arc::new(source), cache.clone())
//!     .thresholds(Thresholds::new().with(Threshold::unset(SubType::Kickoff).with_max_count(100)))
//!     .build();
//!
//! runner.run_pass(PassOptions::default()).await.unwrap();
//! assert_eq!(cache.latest().unwrap().unwrap().incidents.len(), 1);
//! # });
//! ```

pub mod app;
pub mod cache;
pub mod command;
pub mod config;
pub mod data;
pub mod display;
pub mod events;
pub mod report;
pub mod runner;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use backlogwatch_types::{Incident, Measurement, Snapshot, SubType, Threshold};
pub use cache::{CacheError, FileCache, MemoryCache, SnapshotCache};
pub use command::{CheckOptions, ExitStatus};
pub use config::Settings;
pub use data::{DedupKey, Thresholds};
pub use display::WidgetData;
pub use report::{ReportError, ReportOutcome, StatusPageApi, StatusReporter};
pub use runner::{PassOptions, PassReport, Runner, RunnerError, RunnerSettings};
pub use source::{FixtureSource, MetricSource, SqlSource, StaticSource};
