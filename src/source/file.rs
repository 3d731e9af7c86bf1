//! File-based metric source.
//!
//! Reads a JSON fixture holding a catalog and a list of measurements. Used
//! for dry runs and demos without a database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{Measurement, ResourceCatalog, SubType};

use super::MetricSource;

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub catalog: ResourceCatalog,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

/// A metric source that reads measurements from a JSON file.
///
/// The file is re-read on every call, so edits show up on the next pass.
/// The window is ignored; the fixture already holds aggregated values.
#[derive(Debug)]
pub struct FixtureSource {
    path: PathBuf,
    description: String,
}

impl FixtureSource {
    /// Create a new fixture source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self { path, description }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Fixture, AdapterError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AdapterError::Connection(format!("Read error: {}", e)))?;
        serde_json::from_str(&content).map_err(|e| AdapterError::Parse(format!("Parse error: {}", e)))
    }
}

#[async_trait]
impl MetricSource for FixtureSource {
    fn description(&self) -> &str {
        &self.description
    }

    async fn resources(&self) -> Result<ResourceCatalog, AdapterError> {
        Ok(self.read().await?.catalog)
    }

    async fn fetch(
        &self,
        sub_type: SubType,
        catalog: &ResourceCatalog,
        _window: Duration,
    ) -> Result<Vec<Measurement>, AdapterError> {
        let fixture = self.read().await?;
        Ok(fixture
            .measurements
            .into_iter()
            .filter(|m| m.sub_type == sub_type)
            .filter(|m| catalog.is_empty() || catalog.campaigns.contains_key(&m.resource_id))
            .map(|mut m| {
                if m.resource_name.is_empty() {
                    if let Some(name) = catalog.campaign_name(m.resource_id) {
                        m.resource_name = name.to_string();
                    }
                }
                m
            })
            .collect())
    }
}
