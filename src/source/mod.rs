//! Metric source abstraction for measuring backlogs.
//!
//! This module provides a trait-based abstraction over where backlog
//! measurements come from: the campaign database, a JSON fixture file, or an
//! in-memory list.

mod file;
mod sql;
mod static_source;

pub use file::{Fixture, FixtureSource};
pub use sql::SqlSource;
pub use static_source::StaticSource;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{Measurement, ResourceCatalog, SubType};

/// Trait for producing backlog measurements.
///
/// A failing [`resources`](MetricSource::resources) call means the backend is
/// unreachable and the pass cannot continue. A failing
/// [`fetch`](MetricSource::fetch) only affects that one sub type.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use backlogwatch::{MetricSource, StaticSource};
/// use backlogwatch_types::{Measurement, SubType};
///
/// # tokio_test::block_on(async {
/// let source = StaticSource::new()
///     .measurement(Measurement::new(1, "Welcome", SubType::Kickoff).with_count(3));
///
/// let catalog = source.resources().await.unwrap();
/// let found = source
///     .fetch(SubType::Kickoff, &catalog, Duration::from_secs(3600))
///     .await
///     .unwrap();
/// assert_eq!(found.len(), 1);
/// # });
/// ```
#[async_trait]
pub trait MetricSource: Send + Sync + Debug {
    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;

    /// Monitored campaigns and events.
    async fn resources(&self) -> Result<ResourceCatalog, AdapterError>;

    /// Measure one backlog category for the catalog's resources over the
    /// trailing `window`.
    async fn fetch(
        &self,
        sub_type: SubType,
        catalog: &ResourceCatalog,
        window: Duration,
    ) -> Result<Vec<Measurement>, AdapterError>;
}
