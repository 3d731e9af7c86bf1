//! Status reporter: keeps one status page incident in line with the latest
//! snapshot.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use backlogwatch_adapters::statuspage::{
    ComponentStatus, IncidentParams, IncidentScope, IncidentStatus, PageComponent, PageIncident,
};
use backlogwatch_adapters::AdapterError;
use backlogwatch_types::{current_timestamp_ms, Snapshot};

use super::ttl::{TtlCell, DEFAULT_READ_TTL};
use super::StatusPageApi;

/// Body used when there is nothing to report.
pub const HEALTHY_BODY: &str = "Application is operating normally.";

pub const DEFAULT_INCIDENT_NAME: &str = "Processing Delays";

pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 1024;

/// Aggregate state shown on the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
}

impl HealthState {
    fn incident_status(&self) -> IncidentStatus {
        match self {
            HealthState::Healthy => IncidentStatus::Resolved,
            HealthState::Degraded => IncidentStatus::Monitoring,
        }
    }

    fn component_status(&self) -> ComponentStatus {
        match self {
            HealthState::Healthy => ComponentStatus::Operational,
            HealthState::Degraded => ComponentStatus::DegradedPerformance,
        }
    }
}

/// What was last pushed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedStatus {
    pub state: HealthState,
    pub summary: String,
    pub reported_at_ms: u64,
}

/// Result of a report call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Reporting is not configured.
    Disabled,
    /// The caller asked not to report.
    DryRun,
    /// Same state and summary as the last successful report; nothing sent.
    Unchanged,
    /// The page already shows the desired state.
    AlreadyCurrent,
    /// A new incident was opened.
    Created { incident_id: String },
    /// Existing incidents were updated.
    Updated { count: usize },
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutcome::Disabled => f.write_str("reporting disabled"),
            ReportOutcome::DryRun => f.write_str("dry run, not reported"),
            ReportOutcome::Unchanged => f.write_str("unchanged since last report"),
            ReportOutcome::AlreadyCurrent => f.write_str("status page already current"),
            ReportOutcome::Created { incident_id } => write!(f, "opened incident {}", incident_id),
            ReportOutcome::Updated { count } => write!(f, "updated {} incident(s)", count),
        }
    }
}

/// Errors from pushing state to the status page. None of them abort a pass.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("status page request failed: {0}")]
    Api(#[from] AdapterError),

    #[error("component '{0}' does not exist on the status page")]
    UnknownComponent(String),

    #[error("status page report timed out after {0:?}")]
    Timeout(Duration),
}

/// Reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterSettings {
    pub component_id: String,
    pub incident_name: String,
    pub max_summary_chars: usize,
    pub read_ttl: Duration,
}

impl ReporterSettings {
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            incident_name: DEFAULT_INCIDENT_NAME.to_string(),
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            read_ttl: DEFAULT_READ_TTL,
        }
    }
}

/// Pushes the health state of each snapshot to a status page.
///
/// The reporter remembers the last state it pushed and skips the network
/// entirely when nothing changed. When something did change it still checks
/// the remote incidents first, so a page that already matches (for example
/// after another process reported) is left alone.
#[derive(Debug)]
pub struct StatusReporter {
    api: Option<Arc<dyn StatusPageApi>>,
    settings: ReporterSettings,
    components: TtlCell<Vec<PageComponent>>,
    incidents: TtlCell<Vec<PageIncident>>,
    last_reported: Option<ReportedStatus>,
}

impl StatusReporter {
    /// A reporter that never contacts anything.
    pub fn disabled() -> Self {
        Self {
            api: None,
            settings: ReporterSettings::new(""),
            components: TtlCell::default(),
            incidents: TtlCell::default(),
            last_reported: None,
        }
    }

    /// A reporter for one component. An empty component id disables reporting.
    pub fn new(api: Arc<dyn StatusPageApi>, settings: ReporterSettings) -> Self {
        let api = if settings.component_id.trim().is_empty() {
            None
        } else {
            Some(api)
        };
        Self {
            api,
            components: TtlCell::new(settings.read_ttl),
            incidents: TtlCell::new(settings.read_ttl),
            settings,
            last_reported: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api.is_some()
    }

    pub fn last_reported(&self) -> Option<&ReportedStatus> {
        self.last_reported.as_ref()
    }

    /// The state and body the page should show for a snapshot.
    pub fn desired(&self, snapshot: &Snapshot) -> (HealthState, String) {
        if snapshot.is_healthy() {
            (HealthState::Healthy, HEALTHY_BODY.to_string())
        } else {
            (
                HealthState::Degraded,
                truncate_summary(&snapshot.summary(), self.settings.max_summary_chars),
            )
        }
    }

    /// Bring the status page in line with `snapshot`.
    pub async fn report(&mut self, snapshot: &Snapshot) -> Result<ReportOutcome, ReportError> {
        let Some(api) = self.api.clone() else {
            return Ok(ReportOutcome::Disabled);
        };

        let (state, summary) = self.desired(snapshot);
        if let Some(last) = &self.last_reported {
            if last.state == state && last.summary == summary {
                debug!(?state, "Status unchanged since last report");
                return Ok(ReportOutcome::Unchanged);
            }
        }

        let component_id = self.settings.component_id.clone();
        let components = match self.components.get() {
            Some(components) => components,
            None => {
                let components = api.list_components().await?;
                self.components.set(components.clone());
                components
            }
        };
        if !components.iter().any(|c| c.id == component_id) {
            return Err(ReportError::UnknownComponent(component_id));
        }

        let incidents = match self.incidents.get() {
            Some(incidents) => incidents,
            None => {
                let incidents = api.list_incidents(IncidentScope::Unresolved).await?;
                self.incidents.set(incidents.clone());
                incidents
            }
        };
        let open: Vec<&PageIncident> = incidents
            .iter()
            .filter(|i| i.status != IncidentStatus::Resolved.as_str())
            .filter(|i| i.affects(&component_id))
            .collect();

        let incident_status = state.incident_status();
        let component_status = state.component_status();

        let outcome = if open.is_empty() {
            match state {
                HealthState::Healthy => ReportOutcome::AlreadyCurrent,
                HealthState::Degraded => {
                    let params = IncidentParams::new()
                        .name(&self.settings.incident_name)
                        .status(incident_status)
                        .body(&summary)
                        .component(&component_id, component_status);
                    let created = api.create_incident(&params).await?;
                    info!(incident = %created.id, "Opened status page incident");
                    ReportOutcome::Created {
                        incident_id: created.id,
                    }
                }
            }
        } else {
            let mut count = 0;
            for incident in open {
                if incident.status == incident_status.as_str()
                    && incident.latest_body() == Some(summary.as_str())
                {
                    continue;
                }
                let params = IncidentParams::new()
                    .name(&self.settings.incident_name)
                    .status(incident_status)
                    .body(&summary)
                    .component(&component_id, component_status)
                    .also_components(incident.affected_component_ids());
                if let Err(e) = api.update_incident(&incident.id, &params).await {
                    // Earlier updates in this loop may already have landed.
                    self.incidents.invalidate();
                    return Err(e.into());
                }
                info!(
                    incident = %incident.id,
                    status = %incident_status,
                    "Updated status page incident"
                );
                count += 1;
            }
            if count == 0 {
                ReportOutcome::AlreadyCurrent
            } else {
                ReportOutcome::Updated { count }
            }
        };

        if !matches!(outcome, ReportOutcome::AlreadyCurrent) {
            self.incidents.invalidate();
        }
        self.last_reported = Some(ReportedStatus {
            state,
            summary,
            reported_at_ms: current_timestamp_ms(),
        });
        Ok(outcome)
    }
}

/// Cut `summary` to at most `max_chars` characters, ending in "…" when cut.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    if summary.chars().count() <= max_chars {
        return summary.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut truncated: String = summary.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use backlogwatch_types::{ExceededBound, Incident, Measurement, SubType};
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct FakePage {
        components: Vec<PageComponent>,
        incidents: Mutex<Vec<PageIncident>>,
        writes: Mutex<Vec<(String, IncidentParams)>>,
        reads: Mutex<usize>,
        failing_update: Mutex<Option<String>>,
    }

    impl FakePage {
        fn with_component(id: &str) -> Self {
            Self {
                components: vec![PageComponent {
                    id: id.to_string(),
                    name: "Campaigns".to_string(),
                    status: Some("operational".to_string()),
                }],
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl StatusPageApi for FakePage {
        async fn list_components(&self) -> Result<Vec<PageComponent>, AdapterError> {
            *self.reads.lock() += 1;
            Ok(self.components.clone())
        }

        async fn list_incidents(
            &self,
            _scope: IncidentScope,
        ) -> Result<Vec<PageIncident>, AdapterError> {
            *self.reads.lock() += 1;
            Ok(self.incidents.lock().clone())
        }

        async fn create_incident(
            &self,
            params: &IncidentParams,
        ) -> Result<PageIncident, AdapterError> {
            self.writes.lock().push(("create".to_string(), params.clone()));
            let incident = PageIncident {
                id: "inc1".to_string(),
                name: params.name.clone().unwrap_or_default(),
                status: params.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
                incident_updates: Vec::new(),
                components: params
                    .component_ids
                    .iter()
                    .map(|id| PageComponent {
                        id: id.clone(),
                        name: String::new(),
                        status: None,
                    })
                    .collect(),
            };
            self.incidents.lock().push(incident.clone());
            Ok(incident)
        }

        async fn update_incident(
            &self,
            incident_id: &str,
            params: &IncidentParams,
        ) -> Result<PageIncident, AdapterError> {
            if self.failing_update.lock().as_deref() == Some(incident_id) {
                return Err(AdapterError::Http("502 Bad Gateway".to_string()));
            }
            self.writes.lock().push((incident_id.to_string(), params.clone()));
            let mut incidents = self.incidents.lock();
            let incident = incidents
                .iter_mut()
                .find(|i| i.id == incident_id)
                .ok_or_else(|| AdapterError::NotFound(incident_id.to_string()))?;
            if let Some(status) = params.status {
                incident.status = status.as_str().to_string();
            }
            Ok(incident.clone())
        }
    }

    fn degraded(message: &str) -> Snapshot {
        let mut snapshot = Snapshot::with_timestamp(1);
        snapshot.incidents.push(Incident {
            measurement: Measurement::new(7, "Welcome", SubType::Kickoff),
            exceeded: ExceededBound::Delay,
            message: message.to_string(),
        });
        snapshot
    }

    fn reporter(page: &Arc<FakePage>) -> StatusReporter {
        let mut settings = ReporterSettings::new("cmp1");
        settings.read_ttl = Duration::ZERO;
        StatusReporter::new(page.clone(), settings)
    }

    #[tokio::test]
    async fn test_disabled_reporter_is_noop() {
        let mut reporter = StatusReporter::disabled();
        assert!(!reporter.is_enabled());
        let outcome = reporter.report(&degraded("x")).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Disabled);

        let page = Arc::new(FakePage::with_component("cmp1"));
        let blank = StatusReporter::new(page, ReporterSettings::new(" "));
        assert!(!blank.is_enabled());
    }

    #[tokio::test]
    async fn test_degraded_opens_incident_once() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        let mut reporter = reporter(&page);

        let outcome = reporter.report(&degraded("Slow.")).await.unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::Created {
                incident_id: "inc1".to_string()
            }
        );
        let writes = page.writes.lock().clone();
        assert_eq!(writes.len(), 1);
        let params = &writes[0].1;
        assert_eq!(params.status, Some(IncidentStatus::Monitoring));
        assert_eq!(params.body.as_deref(), Some("Slow."));
        assert_eq!(params.component_status, Some(ComponentStatus::DegradedPerformance));

        let reads_before = *page.reads.lock();
        let outcome = reporter.report(&degraded("Slow.")).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Unchanged);
        assert_eq!(*page.reads.lock(), reads_before);
        assert_eq!(page.writes.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_recovery_resolves_open_incident() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        let mut reporter = reporter(&page);
        reporter.report(&degraded("Slow.")).await.unwrap();

        let outcome = reporter.report(&Snapshot::with_timestamp(2)).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Updated { count: 1 });

        let writes = page.writes.lock().clone();
        let (id, params) = &writes[1];
        assert_eq!(id, "inc1");
        assert_eq!(params.status, Some(IncidentStatus::Resolved));
        assert_eq!(params.body.as_deref(), Some(HEALTHY_BODY));
        assert_eq!(params.component_status, Some(ComponentStatus::Operational));
        assert_eq!(
            reporter.last_reported().map(|r| r.state),
            Some(HealthState::Healthy)
        );
    }

    #[tokio::test]
    async fn test_healthy_with_nothing_open_writes_nothing() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        let mut reporter = reporter(&page);
        let outcome = reporter.report(&Snapshot::with_timestamp(1)).await.unwrap();
        assert_eq!(outcome, ReportOutcome::AlreadyCurrent);
        assert!(page.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_matching_remote_incident_is_not_patched() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        page.incidents.lock().push(PageIncident {
            id: "old".to_string(),
            name: DEFAULT_INCIDENT_NAME.to_string(),
            status: "monitoring".to_string(),
            incident_updates: vec![backlogwatch_adapters::statuspage::IncidentUpdate {
                status: Some("monitoring".to_string()),
                body: Some("Slow.".to_string()),
                created_at: Some("2024-01-01T00:00:00Z".to_string()),
                affected_components: None,
            }],
            components: vec![PageComponent {
                id: "cmp1".to_string(),
                name: String::new(),
                status: None,
            }],
        });

        let mut reporter = reporter(&page);
        let outcome = reporter.report(&degraded("Slow.")).await.unwrap();
        assert_eq!(outcome, ReportOutcome::AlreadyCurrent);
        assert!(page.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_drops_cached_incidents() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        for id in ["a", "b"] {
            page.incidents.lock().push(PageIncident {
                id: id.to_string(),
                name: DEFAULT_INCIDENT_NAME.to_string(),
                status: "monitoring".to_string(),
                incident_updates: Vec::new(),
                components: vec![PageComponent {
                    id: "cmp1".to_string(),
                    name: String::new(),
                    status: None,
                }],
            });
        }
        *page.failing_update.lock() = Some("b".to_string());

        let mut settings = ReporterSettings::new("cmp1");
        settings.read_ttl = Duration::from_secs(600);
        let mut reporter = StatusReporter::new(page.clone(), settings);

        let err = reporter.report(&degraded("Slow.")).await.unwrap_err();
        assert!(matches!(err, ReportError::Api(_)));
        assert_eq!(page.writes.lock().len(), 1);
        assert_eq!(*page.reads.lock(), 2);

        *page.failing_update.lock() = None;
        reporter.report(&degraded("Slow.")).await.unwrap();
        // Components are still cached; incidents are listed again.
        assert_eq!(*page.reads.lock(), 3);
    }

    #[tokio::test]
    async fn test_unknown_component_is_error() {
        let page = Arc::new(FakePage::with_component("other"));
        let mut reporter = reporter(&page);
        let err = reporter.report(&degraded("Slow.")).await.unwrap_err();
        assert!(matches!(err, ReportError::UnknownComponent(id) if id == "cmp1"));
        assert!(reporter.last_reported().is_none());
    }

    #[test]
    fn test_truncate_summary() {
        assert_eq!(truncate_summary("short", 10), "short");
        assert_eq!(truncate_summary("abcdef", 4), "abc…");
        assert_eq!(truncate_summary("ééééé", 3), "éé…");
        assert_eq!(truncate_summary("abc", 0), "");
    }

    #[test]
    fn test_desired_state_truncates() {
        let page = Arc::new(FakePage::with_component("cmp1"));
        let mut settings = ReporterSettings::new("cmp1");
        settings.max_summary_chars = 5;
        let reporter = StatusReporter::new(page, settings);

        let (state, body) = reporter.desired(&degraded("0123456789"));
        assert_eq!(state, HealthState::Degraded);
        assert_eq!(body, "0123…");
        assert_eq!(body.chars().count(), 5);
    }
}
