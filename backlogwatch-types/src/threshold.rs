//! Thresholds that decide when a backlog becomes an incident.

use crate::SubType;

/// Default maximum average delay, in seconds, for every sub type.
pub const DEFAULT_MAX_DELAY_SECONDS: u64 = 3600;

/// Upper bounds for one sub type.
///
/// A bound that is `None` is unlimited. A threshold with no bound at all is
/// not "never alert": it falls back to [`Threshold::default_for`] through
/// [`Threshold::effective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Threshold {
    pub sub_type: SubType,
    /// Maximum number of pending items.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_count: Option<u64>,
    /// Maximum average delay in seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_delay_seconds: Option<u64>,
}

impl Threshold {
    /// A threshold with no bounds configured.
    pub const fn unset(sub_type: SubType) -> Self {
        Self {
            sub_type,
            max_count: None,
            max_delay_seconds: None,
        }
    }

    /// The documented default for a sub type.
    ///
    /// | sub type    | max delay | max count |
    /// |-------------|-----------|-----------|
    /// | `kickoff`   | 3600s     | unlimited |
    /// | `scheduled` | 3600s     | unlimited |
    pub const fn default_for(sub_type: SubType) -> Self {
        match sub_type {
            SubType::Kickoff | SubType::Scheduled => Self {
                sub_type,
                max_count: None,
                max_delay_seconds: Some(DEFAULT_MAX_DELAY_SECONDS),
            },
        }
    }

    /// Set the count bound.
    pub const fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    /// Set the delay bound.
    pub const fn with_max_delay_seconds(mut self, seconds: u64) -> Self {
        self.max_delay_seconds = Some(seconds);
        self
    }

    /// Returns true when neither bound is configured.
    pub const fn is_unset(&self) -> bool {
        self.max_count.is_none() && self.max_delay_seconds.is_none()
    }

    /// The threshold actually applied: itself, or the sub type default when unset.
    pub const fn effective(&self) -> Self {
        if self.is_unset() {
            Self::default_for(self.sub_type)
        } else {
            *self
        }
    }
}
