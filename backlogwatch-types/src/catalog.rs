//! Catalog of monitored resources (published campaigns and their events).

use std::collections::{BTreeMap, BTreeSet};

/// A campaign event known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventInfo {
    pub campaign_id: u64,
    pub name: String,
}

/// Published campaigns and their events, used to scope backlog queries and
/// to resolve display names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceCatalog {
    /// Campaign id to campaign name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub campaigns: BTreeMap<u64, String>,
    /// Event id to event info.
    #[cfg_attr(feature = "serde", serde(default))]
    pub events: BTreeMap<u64, EventInfo>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a campaign.
    pub fn campaign(mut self, id: u64, name: impl Into<String>) -> Self {
        self.campaigns.insert(id, name.into());
        self
    }

    /// Add an event belonging to a campaign.
    pub fn event(mut self, id: u64, campaign_id: u64, name: impl Into<String>) -> Self {
        self.events.insert(
            id,
            EventInfo {
                campaign_id,
                name: name.into(),
            },
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    pub fn campaign_name(&self, id: u64) -> Option<&str> {
        self.campaigns.get(&id).map(String::as_str)
    }

    pub fn event_name(&self, id: u64) -> Option<&str> {
        self.events.get(&id).map(|e| e.name.as_str())
    }

    /// Campaigns that have at least one event. A campaign without events
    /// can never kick off, so its contacts are not a backlog.
    pub fn campaigns_with_events(&self) -> BTreeSet<u64> {
        self.events
            .values()
            .map(|e| e.campaign_id)
            .filter(|id| self.campaigns.contains_key(id))
            .collect()
    }

    /// Events whose campaign is in the catalog.
    pub fn event_ids(&self) -> BTreeSet<u64> {
        self.events
            .iter()
            .filter(|(_, e)| self.campaigns.contains_key(&e.campaign_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Keep only the given campaigns (and their events). An empty set keeps
    /// everything.
    pub fn restrict_to(mut self, campaign_ids: &BTreeSet<u64>) -> Self {
        if campaign_ids.is_empty() {
            return self;
        }
        self.campaigns.retain(|id, _| campaign_ids.contains(id));
        self.events.retain(|_, e| campaign_ids.contains(&e.campaign_id));
        self
    }
}
