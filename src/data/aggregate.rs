//! Building a snapshot from the measurements of one pass.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use backlogwatch_types::{current_timestamp_ms, Incident, Measurement, Snapshot, SubType};

use super::threshold::{evaluate, Thresholds};

/// What makes two incidents "the same" for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// One incident per (sub type, campaign).
    Resource,
    /// One incident per (sub type, campaign, event).
    #[default]
    ResourceEvent,
}

impl DedupKey {
    fn key(&self, m: &Measurement) -> (SubType, u64, Option<u64>) {
        match self {
            DedupKey::Resource => (m.sub_type, m.resource_id, None),
            DedupKey::ResourceEvent => (m.sub_type, m.resource_id, m.event_id),
        }
    }
}

/// Evaluate every measurement and build a snapshot stamped with the current time.
pub fn aggregate(measurements: Vec<Measurement>, thresholds: &Thresholds, dedup: DedupKey) -> Snapshot {
    aggregate_at(measurements, thresholds, dedup, current_timestamp_ms())
}

/// Like [`aggregate`] with an explicit timestamp. Same inputs give an equal
/// snapshot.
pub fn aggregate_at(
    mut measurements: Vec<Measurement>,
    thresholds: &Thresholds,
    dedup: DedupKey,
    generated_at_ms: u64,
) -> Snapshot {
    let mut worst: BTreeMap<(SubType, u64, Option<u64>), Incident> = BTreeMap::new();

    for m in &measurements {
        let Some(incident) = evaluate(m, &thresholds.get(m.sub_type)) else {
            continue;
        };
        let key = dedup.key(m);
        let replace = worst
            .get(&key)
            .map_or(true, |existing| worst_first(&existing.measurement, m) == Ordering::Greater);
        if replace {
            worst.insert(key, incident);
        }
    }

    let mut incidents: Vec<Incident> = worst.into_values().collect();
    incidents.sort_by(|a, b| worst_first(&a.measurement, &b.measurement));
    measurements.sort_by(worst_first);

    let mut snapshot = Snapshot::with_timestamp(generated_at_ms);
    snapshot.measurements = measurements;
    snapshot.incidents = incidents;
    snapshot
}

/// Highest average delay first; ties by campaign id, then event id, then sub type.
pub fn worst_first(a: &Measurement, b: &Measurement) -> Ordering {
    b.avg_delay_seconds
        .total_cmp(&a.avg_delay_seconds)
        .then_with(|| a.resource_id.cmp(&b.resource_id))
        .then_with(|| a.event_id.cmp(&b.event_id))
        .then_with(|| a.sub_type.cmp(&b.sub_type))
}
