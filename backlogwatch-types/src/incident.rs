//! Incidents: threshold violations detected in a single pass.

use core::fmt;

use crate::{Measurement, SubType};

/// Which bound of a threshold a measurement exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExceededBound {
    Count,
    Delay,
    Both,
}

impl ExceededBound {
    /// Combine the two bound checks. Returns `None` when neither was exceeded.
    pub fn from_flags(count: bool, delay: bool) -> Option<Self> {
        match (count, delay) {
            (true, true) => Some(ExceededBound::Both),
            (true, false) => Some(ExceededBound::Count),
            (false, true) => Some(ExceededBound::Delay),
            (false, false) => None,
        }
    }

    pub fn includes_count(&self) -> bool {
        matches!(self, ExceededBound::Count | ExceededBound::Both)
    }

    pub fn includes_delay(&self) -> bool {
        matches!(self, ExceededBound::Delay | ExceededBound::Both)
    }
}

impl fmt::Display for ExceededBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExceededBound::Count => "count",
            ExceededBound::Delay => "delay",
            ExceededBound::Both => "count and delay",
        })
    }
}

/// A measurement that violated its threshold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Incident {
    pub measurement: Measurement,
    pub exceeded: ExceededBound,
    /// Human-readable description, used as status page body text.
    pub message: String,
}

impl Incident {
    pub fn resource_id(&self) -> u64 {
        self.measurement.resource_id
    }

    pub fn resource_name(&self) -> &str {
        &self.measurement.resource_name
    }

    pub fn sub_type(&self) -> SubType {
        self.measurement.sub_type
    }

    pub fn avg_delay_seconds(&self) -> f64 {
        self.measurement.avg_delay_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flags_covers_all_cases() {
        assert_eq!(ExceededBound::from_flags(false, false), None);
        assert_eq!(ExceededBound::from_flags(true, false), Some(ExceededBound::Count));
        assert_eq!(ExceededBound::from_flags(false, true), Some(ExceededBound::Delay));
        assert_eq!(ExceededBound::from_flags(true, true), Some(ExceededBound::Both));
    }

    #[test]
    fn both_includes_each_bound() {
        assert!(ExceededBound::Both.includes_count());
        assert!(ExceededBound::Both.includes_delay());
        assert!(!ExceededBound::Delay.includes_count());
        assert!(!ExceededBound::Count.includes_delay());
    }
}
