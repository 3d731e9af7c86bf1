//! Data handed to the dashboard widget.
//!
//! The widget consumes the latest cached snapshot plus its display
//! configuration. Height and params are passed through as configured; only
//! the minimum height is enforced here.

use backlogwatch_types::{Incident, Snapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::cache::{CacheError, SnapshotCache};
use crate::config::{DashboardSettings, MIN_WIDGET_HEIGHT};
use crate::data::duration::format_delay;

/// Pixels per table row when deriving terminal rows from the widget height.
pub const PIXELS_PER_ROW: u32 = 22;

/// Everything the widget renders.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetData {
    /// Opaque widget parameters.
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Widget height in pixels, at least [`MIN_WIDGET_HEIGHT`].
    pub height: u32,
    /// Latest snapshot, or `None` when no pass has completed yet.
    pub snapshot: Option<Snapshot>,
}

/// One table row: a threshold breach.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRow {
    pub campaign: String,
    pub event: String,
    pub sub_type: &'static str,
    pub contacts: u64,
    pub delay: String,
}

impl From<&Incident> for WidgetRow {
    fn from(incident: &Incident) -> Self {
        let m = &incident.measurement;
        Self {
            campaign: m.resource_name.clone(),
            event: m.event_name.clone().unwrap_or_else(|| "-".to_string()),
            sub_type: m.sub_type.as_str(),
            contacts: m.count,
            delay: format_delay(m.avg_delay_seconds),
        }
    }
}

impl WidgetData {
    pub fn new(settings: &DashboardSettings, snapshot: Option<Snapshot>) -> Self {
        Self {
            params: settings.params.clone(),
            height: settings.height.max(MIN_WIDGET_HEIGHT),
            snapshot,
        }
    }

    /// Read the latest snapshot from `cache`.
    pub fn load(settings: &DashboardSettings, cache: &dyn SnapshotCache) -> Result<Self, CacheError> {
        Ok(Self::new(settings, cache.latest()?))
    }

    /// Override the configured height, keeping the minimum.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height.max(MIN_WIDGET_HEIGHT);
        self
    }

    /// Number of table rows that fit the widget height.
    pub fn visible_rows(&self) -> usize {
        (self.height / PIXELS_PER_ROW) as usize
    }

    /// Incident rows, worst first.
    pub fn rows(&self) -> Vec<WidgetRow> {
        self.snapshot
            .iter()
            .flat_map(|s| s.incidents.iter())
            .map(WidgetRow::from)
            .collect()
    }

    /// When the snapshot was generated, as RFC 3339 in UTC.
    pub fn calculated_at(&self) -> Option<String> {
        let snapshot = self.snapshot.as_ref()?;
        let at = DateTime::<Utc>::from_timestamp_millis(i64::try_from(snapshot.generated_at_ms).ok()?)?;
        Some(at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
