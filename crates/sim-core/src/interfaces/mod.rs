//! External interfaces (§6): the boundary of the kernel. Everything the
//! Driver consumes from, or hands to, the rest of the system is expressed
//! as one of these four traits.

use chrono::{DateTime, Utc};

use sim_domain::{Entity, Relationship, Scenario};

use crate::errors::SimError;
use crate::graph::TwinGraph;

pub use crate::prediction::PredictionAdapter;

/// Supplies an immutable Twin: enumerate entities, enumerate
/// relationships, look up by URI. Must be stable for the duration of a Run.
pub trait TwinSource {
    fn entities(&self) -> Vec<Entity>;
    fn relationships(&self) -> Vec<Relationship>;

    /// Build the concrete `TwinGraph` the engine runs against.
    fn load(&self) -> Result<TwinGraph, SimError> {
        let mut graph = TwinGraph::new();
        for entity in self.entities() {
            graph.add_entity(entity).map_err(|e| SimError::Internal(e.to_string()))?;
        }
        for relationship in self.relationships() {
            graph.add_relationship(relationship).map_err(|e| SimError::Internal(e.to_string()))?;
        }
        Ok(graph)
    }
}

/// Supplies a Scenario value. The kernel requires events to be totally
/// ordered by timestamp on consumption; the driver sorts on receipt.
pub trait ScenarioSource {
    fn scenario(&self) -> Scenario;
}

/// Invoked once per snapshot with `(runId, stepNumber, wallClockTimestamp,
/// serialized state blob, serialized metrics blob, human description)`.
pub trait SnapshotSink: Send + Sync {
    fn write_snapshot(&self,
                       run_id: &str,
                       step: i64,
                       wall_clock: DateTime<Utc>,
                       state: serde_json::Value,
                       metrics: serde_json::Value,
                       description: &str)
                       -> Result<(), SimError>;
}

/// A `SnapshotSink` that discards every snapshot; the default when no
/// concrete sink is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSnapshotSink;

impl SnapshotSink for NoopSnapshotSink {
    fn write_snapshot(&self, _run_id: &str, _step: i64, _wall_clock: DateTime<Utc>, _state: serde_json::Value, _metrics: serde_json::Value, _description: &str) -> Result<(), SimError> {
        Ok(())
    }
}

/// An in-process `SnapshotSink` that keeps every write in memory, for
/// tests and the `sim-cli` demo.
#[derive(Debug, Default)]
pub struct InMemorySnapshotSink {
    writes: std::sync::Mutex<Vec<SnapshotRecord>>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub run_id: String,
    pub step: i64,
    pub wall_clock: DateTime<Utc>,
    pub state: serde_json::Value,
    pub metrics: serde_json::Value,
    pub description: String,
}

impl InMemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<SnapshotRecord> {
        self.writes.lock().expect("snapshot sink mutex poisoned").clone()
    }
}

impl SnapshotSink for InMemorySnapshotSink {
    fn write_snapshot(&self, run_id: &str, step: i64, wall_clock: DateTime<Utc>, state: serde_json::Value, metrics: serde_json::Value, description: &str) -> Result<(), SimError> {
        self.writes
            .lock()
            .map_err(|_| SimError::Internal("snapshot sink mutex poisoned".to_string()))?
            .push(SnapshotRecord { run_id: run_id.to_string(), step, wall_clock, state, metrics, description: description.to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_records_writes() {
        let sink = InMemorySnapshotSink::new();
        sink.write_snapshot("run-1", 0, Utc::now(), serde_json::json!({}), serde_json::json!({}), "initial").unwrap();
        assert_eq!(sink.writes().len(), 1);
    }
}
