//! # backlogwatch-types
//!
//! Core types for campaign backlog monitoring. This crate defines the data
//! model shared by the metric sources, the evaluator, the snapshot cache and
//! any display consumer reading cached snapshots.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to persist snapshots
//! - **Versioned schema**: Snapshots include version info so cached data written
//!   by an older release is detected instead of misread
//!
//! ## Example
//!
//! ```rust
//! use backlogwatch_types::{Measurement, SubType, Threshold};
//!
//! let measurement = Measurement::new(42, "Welcome series", SubType::Kickoff)
//!     .with_count(120)
//!     .with_avg_delay_seconds(5400.0);
//!
//! let threshold = Threshold::default_for(SubType::Kickoff);
//! assert_eq!(threshold.max_delay_seconds, Some(3600));
//! assert!(measurement.avg_delay_seconds > 3600.0);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**.

mod catalog;
mod incident;
mod measurement;
mod snapshot;
mod threshold;
mod version;

pub use catalog::*;
pub use incident::*;
pub use measurement::*;
pub use snapshot::*;
pub use threshold::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const SCHEMA_VERSION: u32 = 1;
