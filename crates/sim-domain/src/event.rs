//! Events and their propagation rules (§3, §4.3 taxonomy).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::PropertyBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single propagation instruction attached to an event (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropagationRule {
    pub relationship_type: String,
    pub impact_multiplier: f64,
    /// Steps to delay the propagated effect. `0` applies in the same step.
    pub delay: u32,
    pub predicate: Option<PropertyBag>,
}

impl PropagationRule {
    pub fn new(relationship_type: impl Into<String>, impact_multiplier: f64, delay: u32) -> Self {
        Self { relationship_type: relationship_type.into(), impact_multiplier, delay, predicate: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventImpact {
    pub severity: EventSeverity,
    pub propagation_rules: Vec<PropagationRule>,
    /// Derived list of entities touched directly or via propagation. Filled
    /// in by the driver after the event has been fully processed.
    pub affected_entities: Vec<String>,
}

impl EventImpact {
    pub fn new(severity: EventSeverity) -> Self {
        Self { severity, propagation_rules: Vec::new(), affected_entities: Vec::new() }
    }

    pub fn with_rule(mut self, rule: PropagationRule) -> Self {
        self.propagation_rules.push(rule);
        self
    }
}

/// A single instruction to perturb the state of one entity at a step
/// (§3). `event_type` is one of the canonical taxonomy strings in §4.3
/// (`"resource.unavailable"`, `"demand.surge"`, ...) after alias resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub event_type: String,
    pub target: String,
    pub timestamp: i64,
    pub parameters: PropertyBag,
    pub impact: EventImpact,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, target: impl Into<String>, timestamp: i64, severity: EventSeverity) -> Self {
        Self { id: id.into(),
               event_type: event_type.into(),
               target: target.into(),
               timestamp,
               parameters: BTreeMap::new(),
               impact: EventImpact::new(severity) }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: crate::value::PropertyValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_rule(mut self, rule: PropagationRule) -> Self {
        self.impact.propagation_rules.push(rule);
        self
    }
}
