//! Statuspage adapter using the v1 REST API.
//!
//! Authentication is the `api_key` query parameter. Incident writes are sent
//! as form-style query parameters (`incident[name]`, `incident[status]`, ...),
//! built from [`IncidentParams`] rather than by hand.
//!
//! ## Example
//!
//! ```rust,no_run
//! use backlogwatch_adapters::statuspage::{
//!     ComponentStatus, IncidentParams, IncidentStatus, StatuspageClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StatuspageClient::builder()
//!         .api_key("secret")
//!         .page_id("abc123")
//!         .build()?;
//!
//!     let params = IncidentParams::new()
//!         .name("Processing Delays")
//!         .status(IncidentStatus::Monitoring)
//!         .body("Campaign backlog is growing.")
//!         .component("cmp1", ComponentStatus::DegradedPerformance);
//!
//!     let incident = client.create_incident(&params).await?;
//!     println!("opened {}", incident.id);
//!     Ok(())
//! }
//! ```

use core::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::AdapterError;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.statuspage.io/v1";

/// Incident lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Identified => "identified",
            IncidentStatus::Monitoring => "monitoring",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component health as shown on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Operational => "operational",
            ComponentStatus::DegradedPerformance => "degraded_performance",
            ComponentStatus::PartialOutage => "partial_outage",
            ComponentStatus::MajorOutage => "major_outage",
            ComponentStatus::UnderMaintenance => "under_maintenance",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which incidents to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentScope {
    Unresolved,
    All,
}

impl IncidentScope {
    fn path(&self) -> &'static str {
        match self {
            IncidentScope::Unresolved => "incidents/unresolved.json",
            IncidentScope::All => "incidents.json",
        }
    }
}

/// A page component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageComponent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// A component named in an incident update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedComponent {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub new_status: Option<String>,
}

/// One entry of an incident's history. The API returns newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub affected_components: Option<Vec<AffectedComponent>>,
}

/// An incident as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIncident {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub incident_updates: Vec<IncidentUpdate>,
    #[serde(default)]
    pub components: Vec<PageComponent>,
}

impl PageIncident {
    /// The most recent update, if any.
    pub fn latest_update(&self) -> Option<&IncidentUpdate> {
        self.incident_updates
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
    }

    /// Body of the most recent update.
    pub fn latest_body(&self) -> Option<&str> {
        self.latest_update().and_then(|u| u.body.as_deref())
    }

    /// Ids of every component this incident has touched, either directly or
    /// through one of its updates.
    pub fn affected_component_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.components.iter().map(|c| c.id.clone()).collect();
        for update in &self.incident_updates {
            for component in update.affected_components.iter().flatten() {
                if let Some(code) = &component.code {
                    if !ids.contains(code) {
                        ids.push(code.clone());
                    }
                }
            }
        }
        ids
    }

    pub fn affects(&self, component_id: &str) -> bool {
        self.affected_component_ids().iter().any(|id| id == component_id)
    }
}

/// Parameters of an incident create or update.
///
/// Unset fields are left out of the request, so an update only touches what
/// is given here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentParams {
    pub name: Option<String>,
    pub status: Option<IncidentStatus>,
    pub body: Option<String>,
    pub component_ids: Vec<String>,
    pub component_status: Option<ComponentStatus>,
}

impl IncidentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn status(mut self, status: IncidentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a component and set the status every attached component moves to.
    pub fn component(mut self, id: impl Into<String>, status: ComponentStatus) -> Self {
        let id = id.into();
        if !self.component_ids.contains(&id) {
            self.component_ids.push(id);
        }
        self.component_status = Some(status);
        self
    }

    /// Attach additional components without changing the target status.
    pub fn also_components<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if !self.component_ids.contains(&id) {
                self.component_ids.push(id);
            }
        }
        self
    }

    /// Encode as query parameters.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(name) = &self.name {
            query.push(("incident[name]".to_string(), name.clone()));
        }
        if let Some(status) = self.status {
            query.push(("incident[status]".to_string(), status.as_str().to_string()));
        }
        if let Some(body) = &self.body {
            query.push(("incident[body]".to_string(), body.clone()));
        }
        for id in &self.component_ids {
            query.push(("incident[component_ids][]".to_string(), id.clone()));
        }
        if let Some(status) = self.component_status {
            for id in &self.component_ids {
                query.push((
                    format!("incident[components][{}]", id),
                    status.as_str().to_string(),
                ));
            }
        }
        query
    }
}

/// Client for one Statuspage page.
#[derive(Debug, Clone)]
pub struct StatuspageClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_id: String,
}

impl StatuspageClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> StatuspageClientBuilder {
        StatuspageClientBuilder::default()
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// List every component of the page.
    pub async fn list_components(&self) -> Result<Vec<PageComponent>, AdapterError> {
        let request = self.client.get(self.url("components.json"));
        self.send(request, "components").await
    }

    /// List incidents of the page.
    pub async fn list_incidents(
        &self,
        scope: IncidentScope,
    ) -> Result<Vec<PageIncident>, AdapterError> {
        let request = self.client.get(self.url(scope.path()));
        self.send(request, "incidents").await
    }

    /// Open a new incident.
    pub async fn create_incident(
        &self,
        params: &IncidentParams,
    ) -> Result<PageIncident, AdapterError> {
        let request = self
            .client
            .post(self.url("incidents.json"))
            .query(&params.to_query());
        self.send(request, "incident").await
    }

    /// Update an existing incident.
    pub async fn update_incident(
        &self,
        incident_id: &str,
        params: &IncidentParams,
    ) -> Result<PageIncident, AdapterError> {
        let path = format!("incidents/{}.json", urlencoded(incident_id));
        let request = self.client.patch(self.url(&path)).query(&params.to_query());
        self.send(request, &format!("incident '{}'", incident_id))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/pages/{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoded(&self.page_id),
            path
        )
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, AdapterError> {
        let response = request
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;
        let response = check_status(response, what)?;

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

fn check_status(response: Response, what: &str) -> Result<Response, AdapterError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(AdapterError::Auth("Invalid API key".to_string()))
        }
        StatusCode::NOT_FOUND => Err(AdapterError::NotFound(what.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(AdapterError::RateLimited),
        status if !status.is_success() => Err(AdapterError::Http(format!(
            "API returned status {} for {}",
            status, what
        ))),
        _ => Ok(response),
    }
}

/// Builder for StatuspageClient.
#[derive(Debug, Default)]
pub struct StatuspageClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    page_id: Option<String>,
    timeout: Option<Duration>,
}

impl StatuspageClientBuilder {
    /// Set the API root (default: "https://api.statuspage.io/v1").
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn page_id(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = Some(page_id.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client. Fails when the API key or page id is missing.
    pub fn build(self) -> Result<StatuspageClient, AdapterError> {
        let api_key = non_empty(self.api_key)
            .ok_or_else(|| AdapterError::Config("statuspage api key is not set".to_string()))?;
        let page_id = non_empty(self.page_id)
            .ok_or_else(|| AdapterError::Config("statuspage page id is not set".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        Ok(StatuspageClient {
            client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            page_id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Encode a path segment
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25").replace('/', "%2F").replace(' ', "%20")
}
