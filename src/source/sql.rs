//! Database-backed metric source.

use std::time::Duration;

use async_trait::async_trait;

use backlogwatch_adapters::mysql::MySqlAdapter;
use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{Measurement, ResourceCatalog, SubType};

use super::MetricSource;

/// A metric source that queries the campaign database.
#[derive(Debug, Clone)]
pub struct SqlSource {
    adapter: MySqlAdapter,
    description: String,
}

impl SqlSource {
    pub fn new(adapter: MySqlAdapter, host: &str) -> Self {
        Self {
            adapter,
            description: format!("mysql: {}", host),
        }
    }

    pub fn adapter(&self) -> &MySqlAdapter {
        &self.adapter
    }
}

#[async_trait]
impl MetricSource for SqlSource {
    fn description(&self) -> &str {
        &self.description
    }

    async fn resources(&self) -> Result<ResourceCatalog, AdapterError> {
        self.adapter.published_catalog().await
    }

    async fn fetch(
        &self,
        sub_type: SubType,
        catalog: &ResourceCatalog,
        window: Duration,
    ) -> Result<Vec<Measurement>, AdapterError> {
        self.adapter.backlog(sub_type, catalog, window).await
    }
}
