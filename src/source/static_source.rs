//! In-memory metric source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{Measurement, ResourceCatalog, SubType};

use super::MetricSource;

/// A metric source serving a fixed list of measurements.
///
/// Each sub type can be given an artificial latency or a failure, which makes
/// this the source of choice for exercising timeouts and partial failures.
#[derive(Debug, Default)]
pub struct StaticSource {
    catalog: ResourceCatalog,
    measurements: Vec<Measurement>,
    latency: HashMap<SubType, Duration>,
    failures: HashMap<SubType, String>,
    catalog_failure: Option<String>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(mut self, catalog: ResourceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.push(measurement);
        self
    }

    pub fn measurements(mut self, measurements: impl IntoIterator<Item = Measurement>) -> Self {
        self.measurements.extend(measurements);
        self
    }

    /// Delay every fetch of `sub_type` by `latency`.
    pub fn latency(mut self, sub_type: SubType, latency: Duration) -> Self {
        self.latency.insert(sub_type, latency);
        self
    }

    /// Make every fetch of `sub_type` fail.
    pub fn failing(mut self, sub_type: SubType, reason: impl Into<String>) -> Self {
        self.failures.insert(sub_type, reason.into());
        self
    }

    /// Make the catalog lookup fail, as if the backend were down.
    pub fn unreachable(mut self, reason: impl Into<String>) -> Self {
        self.catalog_failure = Some(reason.into());
        self
    }

    /// Number of fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetricSource for StaticSource {
    fn description(&self) -> &str {
        "static"
    }

    async fn resources(&self) -> Result<ResourceCatalog, AdapterError> {
        match &self.catalog_failure {
            Some(reason) => Err(AdapterError::Connection(reason.clone())),
            None => Ok(self.catalog.clone()),
        }
    }

    async fn fetch(
        &self,
        sub_type: SubType,
        _catalog: &ResourceCatalog,
        _window: Duration,
    ) -> Result<Vec<Measurement>, AdapterError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency.get(&sub_type) {
            tokio::time::sleep(*latency).await;
        }
        if let Some(reason) = self.failures.get(&sub_type) {
            return Err(AdapterError::Query(reason.clone()));
        }

        Ok(self
            .measurements
            .iter()
            .filter(|m| m.sub_type == sub_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filters_by_sub_type() {
        let source = StaticSource::new()
            .measurement(Measurement::new(1, "a", SubType::Kickoff))
            .measurement(Measurement::new(2, "b", SubType::Scheduled).with_event(20, "e"));

        let catalog = source.resources().await.unwrap();
        let window = Duration::from_secs(1);
        let kickoff = source.fetch(SubType::Kickoff, &catalog, window).await.unwrap();
        assert_eq!(kickoff.len(), 1);
        assert_eq!(kickoff[0].resource_id, 1);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failures() {
        let source = StaticSource::new()
            .failing(SubType::Scheduled, "deadlock")
            .unreachable("refused");

        assert!(matches!(
            source.resources().await,
            Err(AdapterError::Connection(_))
        ));
        let err = source
            .fetch(SubType::Scheduled, &ResourceCatalog::new(), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Query failed: deadlock");
    }
}
