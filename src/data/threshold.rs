//! Threshold evaluation: turning a measurement into an incident.

use backlogwatch_types::{ExceededBound, Incident, Measurement, SubType, Threshold};

/// Thresholds for every sub type.
///
/// A sub type with nothing configured evaluates against its documented
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    kickoff: Threshold,
    scheduled: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            kickoff: Threshold::unset(SubType::Kickoff),
            scheduled: Threshold::unset(SubType::Scheduled),
        }
    }
}

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the threshold for the sub type it names.
    pub fn with(mut self, threshold: Threshold) -> Self {
        self.set(threshold);
        self
    }

    pub fn set(&mut self, threshold: Threshold) {
        match threshold.sub_type {
            SubType::Kickoff => self.kickoff = threshold,
            SubType::Scheduled => self.scheduled = threshold,
        }
    }

    /// The configured threshold for a sub type (possibly unset).
    pub fn get(&self, sub_type: SubType) -> Threshold {
        match sub_type {
            SubType::Kickoff => self.kickoff,
            SubType::Scheduled => self.scheduled,
        }
    }

    /// The threshold a measurement of this sub type is checked against.
    pub fn effective(&self, sub_type: SubType) -> Threshold {
        self.get(sub_type).effective()
    }
}

/// Compare a measurement against its threshold.
///
/// Returns an incident iff the measurement strictly exceeds at least one
/// bound of the effective threshold. Equal to the bound is healthy.
pub fn evaluate(measurement: &Measurement, threshold: &Threshold) -> Option<Incident> {
    let threshold = threshold.effective();

    let over_count = threshold
        .max_count
        .is_some_and(|max| measurement.count > max);
    let over_delay = threshold
        .max_delay_seconds
        .is_some_and(|max| measurement.avg_delay_seconds > max as f64);

    let exceeded = ExceededBound::from_flags(over_count, over_delay)?;
    let message = format!(
        "{} {}",
        describe(measurement),
        exceeded_clause(exceeded, &threshold)
    );

    Some(Incident {
        measurement: measurement.clone(),
        exceeded,
        message,
    })
}

/// One sentence describing a backlog, without any threshold context.
pub fn describe(m: &Measurement) -> String {
    let delay = whole_seconds(m.avg_delay_seconds);
    match m.sub_type {
        SubType::Kickoff => format!(
            "Campaign {} ({}) has {} contacts (not realtime) awaiting kickoff with an average of {}s delay.",
            m.resource_name, m.resource_id, m.count, delay
        ),
        SubType::Scheduled => format!(
            "Campaign {} ({}) has {} contacts queued for scheduled event {} ({}) with an average of {}s delay.",
            m.resource_name,
            m.resource_id,
            m.count,
            m.event_name.as_deref().unwrap_or(""),
            m.event_id.map(|id| id.to_string()).unwrap_or_default(),
            delay
        ),
    }
}

fn exceeded_clause(exceeded: ExceededBound, threshold: &Threshold) -> String {
    let count = threshold.max_count.unwrap_or_default();
    let delay = threshold.max_delay_seconds.unwrap_or_default();
    match exceeded {
        ExceededBound::Count => format!("Exceeded count limit of {}.", count),
        ExceededBound::Delay => format!("Exceeded delay limit of {}s.", delay),
        ExceededBound::Both => format!(
            "Exceeded count limit of {} and delay limit of {}s.",
            count, delay
        ),
    }
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    }
}
