//! Entities and their quantitative state (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DomainError;
use crate::value::PropertyBag;

/// Static, topology-level description of a business entity. Immutable for
/// the lifetime of a `Run` (§4.1): the Twin Graph never rewrites this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub uri: String,
    pub entity_type: String,
    pub label: String,
    pub properties: PropertyBag,
}

impl Entity {
    pub fn new(uri: impl Into<String>, entity_type: impl Into<String>, label: impl Into<String>) -> Result<Self, DomainError> {
        let uri = uri.into();
        if uri.trim().is_empty() {
            return Err(DomainError::EmptyUri);
        }
        Ok(Self { uri, entity_type: entity_type.into(), label: label.into(), properties: PropertyBag::new() })
    }

    pub fn with_property(mut self, key: impl Into<String>, value: crate::value::PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Entity status, mutated only by the Event Processor and Propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Inactive,
    Degraded,
    Failed,
}

/// Per-run, mutable quantitative state of one entity (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityState {
    pub status: EntityStatus,
    pub capacity: f64,
    pub utilization: f64,
    pub available: bool,
    pub metrics: BTreeMap<String, f64>,
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    /// Default state for an entity that has no recorded `last_updated`
    /// (§4.5: initial state derivation).
    pub fn default_at(now: DateTime<Utc>) -> Self {
        Self { status: EntityStatus::Active,
               capacity: 100.0,
               utilization: 0.5,
               available: true,
               metrics: BTreeMap::new(),
               last_updated: now }
    }

    /// Clamp `utilization` into `[0, 1]` and apply the I2 degraded-marking
    /// rule for direct event handling.
    pub fn clamp_direct(&mut self) {
        self.utilization = self.utilization.clamp(0.0, 1.0);
        if self.utilization >= 0.95 && self.status != EntityStatus::Failed {
            self.status = EntityStatus::Degraded;
        }
    }

    /// Clamp `utilization` into `[0, 2]` for propagated changes (I3), marking
    /// degraded when the unclamped value exceeded 1.
    pub fn clamp_propagated(&mut self, unclamped: f64) {
        if unclamped > 1.0 && self.status != EntityStatus::Failed {
            self.status = EntityStatus::Degraded;
        }
        self.utilization = unclamped.clamp(0.0, 1.0);
    }
}
