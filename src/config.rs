//! Configuration loading.
//!
//! Settings come from an optional TOML file layered under environment
//! variables prefixed with `BACKLOGWATCH__`, for example
//! `BACKLOGWATCH__STATUSPAGE__API_KEY` or `BACKLOGWATCH__MONITOR__WINDOW=1d`.
//! Every field has a default, so an empty configuration is valid (reporting
//! is then disabled and only `--fixture` runs can reach a backend).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

use backlogwatch_types::{SubType, Threshold};

use crate::data::duration::parse_duration;
use crate::data::{DedupKey, Thresholds};
use crate::report::{ReporterSettings, DEFAULT_INCIDENT_NAME, DEFAULT_MAX_SUMMARY_CHARS};
use crate::runner::{
    RunnerSettings, DEFAULT_QUERY_TIMEOUT, DEFAULT_REPORT_TIMEOUT, DEFAULT_STALE_AFTER,
    DEFAULT_WINDOW,
};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_NAME: &str = "backlogwatch";

pub const ENV_PREFIX: &str = "BACKLOGWATCH";

/// Minimum dashboard widget height.
pub const MIN_WIDGET_HEIGHT: u32 = 330;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub monitor: MonitorSettings,
    pub thresholds: ThresholdSettings,
    pub cache: CacheSettings,
    pub lock: LockSettings,
    pub statuspage: StatuspageSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    /// Read replica; preferred for every query when set.
    pub replica_url: Option<String>,
    pub table_prefix: String,
    pub index_hints: bool,
    pub max_connections: u32,
    #[serde(deserialize_with = "duration")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            replica_url: None,
            table_prefix: String::new(),
            index_hints: true,
            max_connections: 4,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    #[serde(deserialize_with = "duration")]
    pub window: Duration,
    #[serde(deserialize_with = "duration")]
    pub query_timeout: Duration,
    #[serde(deserialize_with = "duration")]
    pub report_timeout: Duration,
    pub sub_types: Vec<SubType>,
    /// Restrict monitoring to these campaigns. Empty means all.
    pub resource_ids: Vec<u64>,
    pub dedup: DedupKey,
    pub round_delays: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            report_timeout: DEFAULT_REPORT_TIMEOUT,
            sub_types: SubType::ALL.to_vec(),
            resource_ids: Vec::new(),
            dedup: DedupKey::default(),
            round_delays: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdValues {
    pub max_count: Option<u64>,
    pub max_delay_seconds: Option<u64>,
}

impl ThresholdValues {
    fn to_threshold(self, sub_type: SubType) -> Threshold {
        Threshold {
            sub_type,
            max_count: self.max_count,
            max_delay_seconds: self.max_delay_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub kickoff: ThresholdValues,
    pub scheduled: ThresholdValues,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub path: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("backlogwatch-snapshot.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub enabled: bool,
    pub path: PathBuf,
    #[serde(deserialize_with = "duration")]
    pub stale_after: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("backlogwatch.lock"),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatuspageSettings {
    pub api_key: Option<String>,
    pub page_id: Option<String>,
    pub component_id: Option<String>,
    pub base_url: Option<String>,
    pub incident_name: String,
    pub max_summary_chars: usize,
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
    #[serde(deserialize_with = "duration")]
    pub read_cache_ttl: Duration,
}

impl Default for StatuspageSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            page_id: None,
            component_id: None,
            base_url: None,
            incident_name: DEFAULT_INCIDENT_NAME.to_string(),
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            timeout: Duration::from_secs(10),
            read_cache_ttl: Duration::from_secs(10),
        }
    }
}

impl StatuspageSettings {
    /// Reporting needs all three of api key, page id and component id.
    pub fn is_configured(&self) -> bool {
        [&self.api_key, &self.page_id, &self.component_id]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    pub fn reporter_settings(&self) -> ReporterSettings {
        ReporterSettings {
            component_id: self.component_id.clone().unwrap_or_default(),
            incident_name: self.incident_name.clone(),
            max_summary_chars: self.max_summary_chars,
            read_ttl: self.read_cache_ttl,
        }
    }
}

/// Dashboard widget display settings. `params` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub height: u32,
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            height: MIN_WIDGET_HEIGHT,
            params: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Load from `path` (required if given, else `backlogwatch.toml` if it
    /// exists) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(path, None)
    }

    fn build(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("monitor.resource_ids")
                    .with_list_parse_key("monitor.sub_types")
                    .source(env),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no pass could run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.window.is_zero() {
            bail!("monitor.window must be greater than zero");
        }
        if self.monitor.query_timeout.is_zero() {
            bail!("monitor.query_timeout must be greater than zero");
        }
        if self.monitor.sub_types.is_empty() {
            bail!("monitor.sub_types must name at least one sub type");
        }
        if self.statuspage.max_summary_chars == 0 {
            bail!("statuspage.max_summary_chars must be greater than zero");
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new()
            .with(self.thresholds.kickoff.to_threshold(SubType::Kickoff))
            .with(self.thresholds.scheduled.to_threshold(SubType::Scheduled))
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        let mut sub_types = self.monitor.sub_types.clone();
        sub_types.sort();
        sub_types.dedup();
        RunnerSettings {
            window: self.monitor.window,
            query_timeout: self.monitor.query_timeout,
            report_timeout: self.monitor.report_timeout,
            sub_types,
            resource_ids: self.monitor.resource_ids.iter().copied().collect::<BTreeSet<_>>(),
            dedup: self.monitor.dedup,
        }
    }

    /// Widget height, never below the minimum.
    pub fn widget_height(&self) -> u32 {
        self.dashboard.height.max(MIN_WIDGET_HEIGHT)
    }
}

/// Accepts whole seconds (`3600`) or a suffixed string (`"1h"`, `"90s"`).
fn duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Fractional(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Fractional(secs) if secs.is_finite() && secs >= 0.0 => {
            Ok(Duration::from_secs_f64(secs))
        }
        Raw::Fractional(secs) => Err(serde::de::Error::custom(format!(
            "invalid duration: {}",
            secs
        ))),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
