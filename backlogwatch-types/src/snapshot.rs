//! Snapshot - the full result of one monitoring pass.

use crate::{Incident, Measurement, SchemaVersion, SubType};

/// The result of one monitoring pass.
///
/// A snapshot is built wholesale at the end of a pass and replaces the
/// previous one; it is never merged with an earlier pass. Both lists are
/// ordered worst first (highest average delay).
///
/// # Example
///
/// ```rust
/// use backlogwatch_types::Snapshot;
///
/// let snapshot = Snapshot::with_timestamp(1_700_000_000_000);
/// assert!(snapshot.is_healthy());
/// assert_eq!(snapshot.summary(), "");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "serde", serde(default))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds when this snapshot was generated.
    pub generated_at_ms: u64,

    /// Every measurement taken in the pass, including those within bounds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub measurements: Vec<Measurement>,

    /// Threshold violations of the pass.
    #[cfg_attr(feature = "serde", serde(default))]
    pub incidents: Vec<Incident>,
}

impl Snapshot {
    /// Create an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self::with_timestamp(current_timestamp_ms())
    }

    /// Create an empty snapshot with a specific timestamp.
    pub fn with_timestamp(generated_at_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            generated_at_ms,
            measurements: Vec::new(),
            incidents: Vec::new(),
        }
    }

    /// True when the pass produced no incidents.
    pub fn is_healthy(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Incident messages joined with a single space.
    pub fn summary(&self) -> String {
        self.incidents
            .iter()
            .map(|i| i.message.as_str())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Incidents of one sub type, in snapshot order.
    pub fn incidents_for(&self, sub_type: SubType) -> impl Iterator<Item = &Incident> {
        self.incidents.iter().filter(move |i| i.sub_type() == sub_type)
    }

    /// Measurements of one sub type, in snapshot order.
    pub fn measurements_for(&self, sub_type: SubType) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().filter(move |m| m.sub_type == sub_type)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
