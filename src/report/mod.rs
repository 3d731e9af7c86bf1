//! Publishing the aggregate health state to a status page.
//!
//! ## Submodules
//!
//! - [`reporter`]: [`StatusReporter`], which decides what the page should show
//!   and issues the minimum set of writes to get there
//! - [`ttl`]: Short-lived read cache for component and incident listings

pub mod reporter;
pub mod ttl;

pub use reporter::{
    truncate_summary, HealthState, ReportError, ReportOutcome, ReportedStatus, ReporterSettings,
    StatusReporter, DEFAULT_INCIDENT_NAME, DEFAULT_MAX_SUMMARY_CHARS, HEALTHY_BODY,
};
pub use ttl::TtlCell;

use std::fmt::Debug;

use async_trait::async_trait;

use backlogwatch_adapters::statuspage::{
    IncidentParams, IncidentScope, PageComponent, PageIncident, StatuspageClient,
};
use backlogwatch_adapters::AdapterError;

/// The status page operations the reporter relies on.
#[async_trait]
pub trait StatusPageApi: Send + Sync + Debug {
    async fn list_components(&self) -> Result<Vec<PageComponent>, AdapterError>;

    async fn list_incidents(&self, scope: IncidentScope)
        -> Result<Vec<PageIncident>, AdapterError>;

    async fn create_incident(&self, params: &IncidentParams)
        -> Result<PageIncident, AdapterError>;

    async fn update_incident(
        &self,
        incident_id: &str,
        params: &IncidentParams,
    ) -> Result<PageIncident, AdapterError>;
}

#[async_trait]
impl StatusPageApi for StatuspageClient {
    async fn list_components(&self) -> Result<Vec<PageComponent>, AdapterError> {
        StatuspageClient::list_components(self).await
    }

    async fn list_incidents(
        &self,
        scope: IncidentScope,
    ) -> Result<Vec<PageIncident>, AdapterError> {
        StatuspageClient::list_incidents(self, scope).await
    }

    async fn create_incident(
        &self,
        params: &IncidentParams,
    ) -> Result<PageIncident, AdapterError> {
        StatuspageClient::create_incident(self, params).await
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        params: &IncidentParams,
    ) -> Result<PageIncident, AdapterError> {
        StatuspageClient::update_incident(self, incident_id, params).await
    }
}
