//! The State Store (§4.2): per-run, mutable entity state keyed by URI, plus
//! the aggregate queries the driver and analyzers read each step.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use sim_domain::{EntityState, EntityStatus};

use crate::constants::DEGRADED_THRESHOLD;

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    entries: BTreeMap<String, EntityState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, state: EntityState) {
        self.entries.insert(uri.into(), state);
    }

    pub fn get(&self, uri: &str) -> Option<&EntityState> {
        self.entries.get(uri)
    }

    pub fn get_mut(&mut self, uri: &str) -> Option<&mut EntityState> {
        self.entries.get_mut(uri)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityState)> {
        self.entries.iter()
    }

    /// Touch `lastUpdated` on an entity after a mutation (§4.2).
    pub fn stamp(&mut self, uri: &str, now: DateTime<Utc>) {
        if let Some(state) = self.entries.get_mut(uri) {
            state.last_updated = now;
        }
    }

    /// Value-copy of the whole store; the clone must not alias the live
    /// state (§4.2).
    pub fn clone_map(&self) -> BTreeMap<String, EntityState> {
        self.entries.clone()
    }

    pub fn average_utilization(&self) -> f64 {
        let (sum, count) = self.entries
                                .values()
                                .filter(|s| s.capacity > 0.0)
                                .fold((0.0, 0usize), |(sum, count), s| (sum + s.utilization, count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn peak_utilization(&self) -> f64 {
        self.entries.values().map(|s| s.utilization).fold(0.0, f64::max)
    }

    pub fn is_stable(&self) -> bool {
        self.entries.values().all(|s| s.utilization <= DEGRADED_THRESHOLD && s.available && s.status != EntityStatus::Failed)
    }

    /// Entity URIs whose utilization is `>= threshold`, in URI order.
    pub fn bottlenecks(&self, threshold: f64) -> Vec<String> {
        self.entries.iter().filter(|(_, s)| s.utilization >= threshold).map(|(uri, _)| uri.clone()).collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for state in self.entries.values() {
            match state.status {
                EntityStatus::Active => counts.active += 1,
                EntityStatus::Inactive => counts.inactive += 1,
                EntityStatus::Degraded => counts.degraded += 1,
                EntityStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub inactive: usize,
    pub degraded: usize,
    pub failed: usize,
}
