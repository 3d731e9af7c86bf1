//! Evaluation of backlog measurements.
//!
//! ## Submodules
//!
//! - [`threshold`]: Per-measurement threshold checks ([`evaluate`], [`Thresholds`])
//! - [`aggregate`]: Deduplication and ordering of a whole pass into a [`Snapshot`]
//! - [`duration`]: Parsing and formatting of durations and delays (e.g., "2h", "12m 05s")
//!
//! ## Data Flow
//!
//! ```text
//! Vec<Measurement> (from a MetricSource)
//!        │
//!        ▼
//! aggregate()
//!        │
//!        ├──▶ evaluate() per measurement, against Thresholds
//!        │
//!        └──▶ dedup + worst-first sort ──▶ Snapshot
//! ```
//!
//! [`Snapshot`]: backlogwatch_types::Snapshot

pub mod aggregate;
pub mod duration;
pub mod threshold;

pub use aggregate::{aggregate, aggregate_at, worst_first, DedupKey};
pub use threshold::{describe, evaluate, Thresholds};
