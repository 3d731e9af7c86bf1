//! Backlog measurements produced by a metric source.

use core::fmt;
use core::str::FromStr;

/// Category of backlog being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SubType {
    /// Contacts waiting to enter a campaign (no event executed yet).
    Kickoff,
    /// Contacts whose scheduled campaign event is overdue.
    Scheduled,
}

impl SubType {
    /// All sub types, in the order they are checked.
    pub const ALL: [SubType; 2] = [SubType::Kickoff, SubType::Scheduled];

    /// Stable lowercase name, used in config keys and serialized data.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubType::Kickoff => "kickoff",
            SubType::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown sub type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSubType(pub String);

impl fmt::Display for UnknownSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sub type: {}", self.0)
    }
}

impl std::error::Error for UnknownSubType {}

impl FromStr for SubType {
    type Err = UnknownSubType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kickoff" => Ok(SubType::Kickoff),
            "scheduled" => Ok(SubType::Scheduled),
            other => Err(UnknownSubType(other.to_string())),
        }
    }
}

/// Aggregated backlog for one monitored resource in one pass.
///
/// The resource is a campaign; scheduled backlogs are further narrowed to a
/// single campaign event.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// Campaign id.
    pub resource_id: u64,
    /// Campaign name, as resolved from the resource catalog.
    pub resource_name: String,
    /// Campaign event id, for event-scoped backlogs.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub event_id: Option<u64>,
    /// Campaign event name, for event-scoped backlogs.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub event_name: Option<String>,
    pub sub_type: SubType,
    /// Number of pending work items (contacts).
    pub count: u64,
    /// Average age of the pending items, in seconds.
    pub avg_delay_seconds: f64,
}

impl Measurement {
    /// Create an empty measurement for a campaign.
    pub fn new(resource_id: u64, resource_name: impl Into<String>, sub_type: SubType) -> Self {
        Self {
            resource_id,
            resource_name: resource_name.into(),
            event_id: None,
            event_name: None,
            sub_type,
            count: 0,
            avg_delay_seconds: 0.0,
        }
    }

    /// Narrow the measurement to a campaign event.
    pub fn with_event(mut self, event_id: u64, event_name: impl Into<String>) -> Self {
        self.event_id = Some(event_id);
        self.event_name = Some(event_name.into());
        self
    }

    /// Set the pending item count.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Set the average delay. Negative or NaN values are clamped to zero.
    pub fn with_avg_delay_seconds(mut self, seconds: f64) -> Self {
        self.avg_delay_seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self
    }
}
