//! Run, Snapshot, StateChange and the aggregate metrics produced per step
//! (§3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::EntityStatus;

/// The new value written by a `StateChange`. Named variants (rather than a
/// raw JSON `Value`) let the Event Processor reject type mismatches (§7
/// `TypeMismatch`) before they ever reach the State Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Status(EntityStatus),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_status(&self) -> Option<EntityStatus> {
        match self {
            FieldValue::Status(s) => Some(*s),
            _ => None,
        }
    }
}

/// A single-field mutation applied to one entity's state (§3 I4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateChange {
    pub entity_uri: String,
    /// One of `status`, `capacity`, `utilization`, `available`, or a metric
    /// path `metrics.<name>`.
    pub field: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub timestamp: i64,
    pub reason: String,
    pub propagated: bool,
    pub source_event_id: String,
}

/// Aggregate metrics derived from the State Store at a step boundary
/// (§4.2, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunMetrics {
    pub total_entities: usize,
    pub total_relationships: usize,
    pub average_utilization: f64,
    pub peak_utilization: f64,
    pub active_entities: usize,
    pub failed_entities: usize,
    pub degraded_entities: usize,
    pub stable: bool,
    pub has_failures: bool,
    pub has_degraded: bool,
}

/// Point-in-time copy of the State Store plus aggregate metrics (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub run_id: String,
    pub step: i64,
    pub wall_clock: DateTime<Utc>,
    pub state: BTreeMap<String, crate::entity::EntityState>,
    pub metrics: RunMetrics,
    pub description: String,
}

/// One row of the Run's event log (§4.5 step 1c).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventLogEntry {
    pub step: i64,
    pub wall_clock: DateTime<Utc>,
    pub event_id: String,
    pub event_type: String,
    pub target: String,
    pub success: bool,
    /// `"<uri>.<field>" -> new value`, direct and propagated changes alike.
    pub changes: BTreeMap<String, FieldValue>,
    pub propagated_targets: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Completion-only summary metrics (§4.5 "on completion"), kept distinct
/// from the per-step `RunMetrics` because most of these fields only make
/// sense once the run has finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunSummary {
    pub total_steps: i64,
    pub events_processed: usize,
    pub unique_entities_affected: usize,
    pub critical_event_count: usize,
    pub average_utilization: f64,
    pub peak_utilization: f64,
    pub bottlenecks: Vec<String>,
    pub stability_score: f64,
    pub impact_summary: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    pub scenario_id: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub initial_state: BTreeMap<String, crate::entity::EntityState>,
    pub final_state: BTreeMap<String, crate::entity::EntityState>,
    pub events_log: Vec<EventLogEntry>,
    pub snapshots: Vec<Snapshot>,
    pub metrics: RunMetrics,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

impl Run {
    pub fn new(id: impl Into<String>, scenario_id: impl Into<String>) -> Self {
        Self { id: id.into(),
               scenario_id: scenario_id.into(),
               status: RunStatus::Pending,
               started_at: None,
               ended_at: None,
               initial_state: BTreeMap::new(),
               final_state: BTreeMap::new(),
               events_log: Vec::new(),
               snapshots: Vec::new(),
               metrics: RunMetrics::default(),
               summary: None,
               error: None }
    }
}
