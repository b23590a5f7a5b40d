//! The Simulation Driver (§4.5): owns the per-run state machine
//! `created -> running -> (completed | failed)` and the step loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use sim_domain::{EntityState, EntityStatus, Event, EventLogEntry, EventSeverity, FieldValue, Run, RunMetrics, RunStatus, RunSummary, Scenario, StateChange};

use crate::constants::{BOTTLENECK_THRESHOLD, DEFAULT_MAX_DURATION, SYSTEM_FAILURE_RATIO};
use crate::errors::SimError;
use crate::graph::TwinGraph;
use crate::interfaces::{NoopSnapshotSink, SnapshotSink};
use crate::metrics::stability_score;
use crate::prediction::{PredictionAdapter, StatePrediction};
use crate::processor::{EventProcessor, HandlerFn};
use crate::propagator::{self, PendingPropagation};
use crate::state::StateStore;

/// Run-time knobs the kernel takes as explicit constructor parameters
/// rather than environment configuration (§9: "no global state").
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub max_duration: i64,
    /// `0` disables periodic snapshotting.
    pub snapshot_interval: i64,
    pub bottleneck_threshold: f64,
    pub system_failure_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_duration: DEFAULT_MAX_DURATION, snapshot_interval: 0, bottleneck_threshold: BOTTLENECK_THRESHOLD, system_failure_ratio: SYSTEM_FAILURE_RATIO }
    }
}

/// A scoped cancellation signal checked at step boundaries (§5). Clones
/// share the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct EngineBuilder {
    processor: EventProcessor,
    prediction: Option<Box<dyn PredictionAdapter>>,
    snapshot_sink: Box<dyn SnapshotSink>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { processor: EventProcessor::with_default_handlers(), prediction: None, snapshot_sink: Box::new(NoopSnapshotSink), config: EngineConfig::default() }
    }

    pub fn register_handler(mut self, event_type: impl Into<String>, handler: HandlerFn) -> Self {
        self.processor.register(event_type, handler);
        self
    }

    pub fn with_prediction_adapter(mut self, adapter: Box<dyn PredictionAdapter>) -> Self {
        self.prediction = Some(adapter);
        self
    }

    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = sink;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SimulationEngine {
        SimulationEngine { processor: self.processor,
                            prediction: self.prediction,
                            snapshot_sink: self.snapshot_sink,
                            config: self.config,
                            start_lock: Mutex::new(()) }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the event taxonomy, the optional prediction hook, and the
/// snapshot sink for every Run executed against it. Independent Runs may
/// proceed concurrently: each owns its own `StateStore`, and the Twin
/// they read is shared-read-only (§5).
pub struct SimulationEngine {
    processor: EventProcessor,
    prediction: Option<Box<dyn PredictionAdapter>>,
    snapshot_sink: Box<dyn SnapshotSink>,
    config: EngineConfig,
    /// Guards only the run-start handshake; there is no lock on the hot
    /// step loop (§5 "Locking discipline").
    start_lock: Mutex<()>,
}

impl SimulationEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn run(&self, graph: &TwinGraph, scenario: &Scenario, cancel: &CancellationToken) -> Run {
        let run_id = Uuid::new_v4().to_string();
        let mut run = Run::new(run_id.clone(), scenario.id.clone());

        {
            let _guard = self.start_lock.lock().expect("engine start lock poisoned");
            run.status = RunStatus::Running;
            run.started_at = Some(Utc::now());
        }

        let mut store = StateStore::new();
        let start = run.started_at.unwrap();
        for entity in graph.entities() {
            store.insert(entity.uri.clone(), EntityState::default_at(start));
        }
        run.initial_state = store.clone_map();
        run.metrics = RunMetrics { total_entities: graph.entity_count(), total_relationships: graph.relationship_count(), stable: true, ..Default::default() };

        if self.config.snapshot_interval > 0 {
            let metrics = run.metrics.clone();
            self.take_snapshot(&run_id, 0, &store, &metrics, "initial state", &mut run);
        }

        let events = scenario.sorted_events();
        let duration = self.effective_duration(scenario, &events);

        let mut event_idx = 0usize;
        let mut pending: BTreeMap<i64, Vec<PendingPropagation>> = BTreeMap::new();
        let mut terminated_early = false;

        for t in 0..duration {
            if cancel.is_cancelled() {
                run.status = RunStatus::Failed;
                run.error = Some("cancelled".to_string());
                let metrics = run.metrics.clone();
                self.take_snapshot(&run_id, t, &store, &metrics, "cancelled", &mut run);
                run.events_log.push(EventLogEntry { step: t,
                                                      wall_clock: Utc::now(),
                                                      event_id: String::new(),
                                                      event_type: "run.cancelled".to_string(),
                                                      target: String::new(),
                                                      success: false,
                                                      changes: BTreeMap::new(),
                                                      propagated_targets: Vec::new(),
                                                      message: "cancellation observed at step boundary".to_string() });
                break;
            }

            while event_idx < events.len() && events[event_idx].timestamp <= t {
                let event = &events[event_idx];
                event_idx += 1;
                self.dispatch_event(event, graph, &mut store, t, &mut pending, &mut run);
            }

            if let Some(due) = pending.remove(&t) {
                for p in due {
                    let now = Utc::now();
                    if let Some(change) = propagator::apply_pending(&p, &mut store, t, now) {
                        let mut changes = BTreeMap::new();
                        changes.insert(format!("{}.{}", change.entity_uri, change.field), change.new_value.clone());
                        run.events_log.push(EventLogEntry { step: t,
                                                              wall_clock: now,
                                                              event_id: p.event_id.clone(),
                                                              event_type: format!("{}.propagation.deferred", p.event_type),
                                                              target: p.target_uri.clone(),
                                                              success: true,
                                                              changes,
                                                              propagated_targets: vec![p.target_uri.clone()],
                                                              message: format!("deferred propagation from {} applied", p.source_uri) });
                    }
                }
            }

            run.metrics.average_utilization = store.average_utilization();
            run.metrics.peak_utilization = store.peak_utilization();
            let counts = store.status_counts();
            run.metrics.active_entities = counts.active;
            run.metrics.failed_entities = counts.failed;
            run.metrics.degraded_entities = counts.degraded;
            run.metrics.stable = store.is_stable();
            run.metrics.has_failures = counts.failed > 0;
            run.metrics.has_degraded = counts.degraded > 0;

            if self.config.snapshot_interval > 0 && t > 0 && t % self.config.snapshot_interval == 0 {
                let metrics = run.metrics.clone();
                self.take_snapshot(&run_id, t, &store, &metrics, &format!("step {t}"), &mut run);
            }

            if run.metrics.total_entities > 0 && (run.metrics.failed_entities as f64 / run.metrics.total_entities as f64) > self.config.system_failure_ratio {
                run.events_log.push(EventLogEntry { step: t,
                                                      wall_clock: Utc::now(),
                                                      event_id: String::new(),
                                                      event_type: "system.failure".to_string(),
                                                      target: String::new(),
                                                      success: false,
                                                      changes: BTreeMap::new(),
                                                      propagated_targets: Vec::new(),
                                                      message: "failed entities exceeded system failure ratio".to_string() });
                terminated_early = true;
                break;
            }
        }

        run.final_state = store.clone_map();
        if run.status == RunStatus::Running {
            run.status = RunStatus::Completed;
        }
        run.ended_at = Some(Utc::now());

        if !cancel.is_cancelled() {
            run.summary = Some(self.summarize(&run, &store, event_idx, &events, terminated_early));
        }

        run
    }

    fn effective_duration(&self, scenario: &Scenario, events: &[Event]) -> i64 {
        let duration = if scenario.duration == 0 && !events.is_empty() {
            events.last().map(|e| e.timestamp + 10).unwrap_or(0)
        } else {
            scenario.duration
        };
        duration.min(self.config.max_duration)
    }

    fn dispatch_event(&self, event: &Event, graph: &TwinGraph, store: &mut StateStore, step: i64, pending: &mut BTreeMap<i64, Vec<PendingPropagation>>, run: &mut Run) {
        let now = Utc::now();

        let direct_result = match self.try_prediction(event, graph, store, now) {
            Some(result) => result,
            None => self.processor.process(event, graph, store, now),
        };

        match direct_result {
            Ok(direct_changes) => {
                let mut all_changes = direct_changes.clone();
                let mut propagated_targets = Vec::new();

                if !direct_changes.is_empty() {
                    let outcome = propagator::propagate(event, graph, store, &direct_changes, step, now, self.prediction.as_deref());
                    for change in &outcome.applied {
                        propagated_targets.push(change.entity_uri.clone());
                    }
                    all_changes.extend(outcome.applied);
                    for deferred in outcome.deferred {
                        pending.entry(deferred.apply_step).or_default().push(deferred);
                    }
                    for error in outcome.errors {
                        log::warn!("propagation error for event {}: {error}", event.id);
                    }
                }

                let mut changes_map = BTreeMap::new();
                for change in &all_changes {
                    changes_map.insert(format!("{}.{}", change.entity_uri, change.field), change.new_value.clone());
                }

                log::debug!("event {} ({}) applied {} changes", event.id, event.event_type, all_changes.len());
                run.events_log.push(EventLogEntry { step,
                                                      wall_clock: now,
                                                      event_id: event.id.clone(),
                                                      event_type: event.event_type.clone(),
                                                      target: event.target.clone(),
                                                      success: true,
                                                      changes: changes_map,
                                                      propagated_targets,
                                                      message: format!("{} applied to {}", event.event_type, event.target) });
            }
            Err(error) => {
                log::warn!("event {} ({}) failed: {error}", event.id, event.event_type);
                run.events_log.push(EventLogEntry { step,
                                                      wall_clock: now,
                                                      event_id: event.id.clone(),
                                                      event_type: event.event_type.clone(),
                                                      target: event.target.clone(),
                                                      success: false,
                                                      changes: BTreeMap::new(),
                                                      propagated_targets: Vec::new(),
                                                      message: error.to_string() });
            }
        }
    }

    /// If a prediction adapter is present and does not decline, apply its
    /// overrides and return `Some` of the resulting changes; `None` tells
    /// the caller to fall back to the rule-based processor (§4.6).
    fn try_prediction(&self, event: &Event, graph: &TwinGraph, store: &mut StateStore, now: chrono::DateTime<Utc>) -> Option<Result<Vec<StateChange>, SimError>> {
        let adapter = self.prediction.as_ref()?;
        let entity = graph.get_entity(&event.target)?;
        let current = store.get(&event.target)?.clone();

        match adapter.predict_state(entity, event, &current) {
            StatePrediction::Decline => None,
            StatePrediction::Override { changes, confidence } => {
                log::debug!("prediction adapter claimed event {} with confidence {confidence:.2}", event.id);
                Some(apply_prediction_overrides(&event.target, &changes, store, now, event))
            }
        }
    }

    fn take_snapshot(&self, run_id: &str, step: i64, store: &StateStore, metrics: &RunMetrics, description: &str, run: &mut Run) {
        let now = Utc::now();
        let state = store.clone_map();
        run.snapshots.push(sim_domain::Snapshot { run_id: run_id.to_string(), step, wall_clock: now, state: state.clone(), metrics: metrics.clone(), description: description.to_string() });

        let state_json = serde_json::to_value(&state).unwrap_or(serde_json::Value::Null);
        let metrics_json = serde_json::to_value(metrics).unwrap_or(serde_json::Value::Null);
        if let Err(error) = self.snapshot_sink.write_snapshot(run_id, step, now, state_json, metrics_json, description) {
            log::error!("failed to persist snapshot at step {step}: {error}");
        }
    }

    fn summarize(&self, run: &Run, store: &StateStore, events_processed: usize, events: &[Event], terminated_early: bool) -> RunSummary {
        let bottlenecks = store.bottlenecks(self.config.bottleneck_threshold);

        let mut affected: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        let mut critical_event_count = 0usize;
        for event in &events[..events_processed] {
            affected.insert(event.target.clone());
            if event.impact.severity == EventSeverity::Critical {
                critical_event_count += 1;
            }
        }
        for entry in &run.events_log {
            affected.extend(entry.propagated_targets.iter().cloned());
        }

        let stability = stability_score(run.metrics.total_entities, run.metrics.failed_entities, run.metrics.degraded_entities, run.metrics.average_utilization, bottlenecks.len());

        let mut recommendations = Vec::new();
        for (uri, state) in store.iter() {
            match state.status {
                EntityStatus::Failed => recommendations.push(format!("Restore or replace {uri}: status failed")),
                EntityStatus::Degraded => recommendations.push(format!("Monitor {uri}: status degraded, utilization {:.2}", state.utilization)),
                _ => {}
            }
        }
        for uri in &bottlenecks {
            recommendations.push(format!("Reduce load on {uri}: utilization at or above bottleneck threshold"));
        }

        let impact_summary = if terminated_early {
            format!("{} of {} entities failed; run terminated early", run.metrics.failed_entities, run.metrics.total_entities)
        } else {
            format!("{} degraded, {} failed, stability {:.2}", run.metrics.degraded_entities, run.metrics.failed_entities, stability)
        };

        let total_steps = run.events_log.iter().map(|e| e.step).max().unwrap_or(0) + 1;

        RunSummary { total_steps,
                     events_processed,
                     unique_entities_affected: affected.len(),
                     critical_event_count,
                     average_utilization: run.metrics.average_utilization,
                     peak_utilization: run.metrics.peak_utilization,
                     bottlenecks,
                     stability_score: stability,
                     impact_summary,
                     recommendations }
    }
}

fn apply_prediction_overrides(target: &str, changes: &BTreeMap<String, FieldValue>, store: &mut StateStore, now: chrono::DateTime<Utc>, event: &Event) -> Result<Vec<StateChange>, SimError> {
    let mut out = Vec::with_capacity(changes.len());
    for (field, new_value) in changes {
        let old_value = {
            let state = store.get_mut(target).ok_or_else(|| SimError::UnknownEntity(target.to_string()))?;
            apply_typed_field(state, field, new_value)?
        };
        store.stamp(target, now);
        out.push(StateChange { entity_uri: target.to_string(),
                                field: field.clone(),
                                old_value,
                                new_value: new_value.clone(),
                                timestamp: event.timestamp,
                                reason: format!("prediction override for {}", event.event_type),
                                propagated: false,
                                source_event_id: event.id.clone() });
    }
    Ok(out)
}

fn apply_typed_field(state: &mut EntityState, field: &str, new_value: &FieldValue) -> Result<FieldValue, SimError> {
    match field {
        "status" => {
            let status = new_value.as_status().ok_or(SimError::TypeMismatch { field: "status".to_string(), expected: "status" })?;
            let old = FieldValue::Status(state.status);
            state.status = status;
            Ok(old)
        }
        "capacity" => {
            let value = new_value.as_f64().ok_or(SimError::TypeMismatch { field: "capacity".to_string(), expected: "number" })?;
            let old = FieldValue::Number(state.capacity);
            state.capacity = value.max(0.0);
            Ok(old)
        }
        "utilization" => {
            let value = new_value.as_f64().ok_or(SimError::TypeMismatch { field: "utilization".to_string(), expected: "number" })?;
            let old = FieldValue::Number(state.utilization);
            state.utilization = value.clamp(0.0, 1.0);
            Ok(old)
        }
        "available" => {
            let value = new_value.as_bool().ok_or(SimError::TypeMismatch { field: "available".to_string(), expected: "bool" })?;
            let old = FieldValue::Bool(state.available);
            state.available = value;
            Ok(old)
        }
        field if field.starts_with("metrics.") => {
            let name = &field[8..];
            let value = new_value.as_f64().ok_or(SimError::TypeMismatch { field: field.to_string(), expected: "number" })?;
            let old = state.metrics.get(name).copied().unwrap_or(0.0);
            state.metrics.insert(name.to_string(), value);
            Ok(FieldValue::Number(old))
        }
        other => Err(SimError::UnknownField(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_domain::{Entity, PropagationRule, Relationship};

    fn single_entity_graph(utilization: f64) -> (TwinGraph, Scenario) {
        let mut graph = TwinGraph::new();
        graph.add_entity(Entity::new("e", "node", "E").unwrap()).unwrap();
        let scenario = Scenario::new("s1", "t1", "demo", "demo", 20);
        let _ = utilization;
        (graph, scenario)
    }

    /// S1: solo demand surge.
    #[test]
    fn solo_demand_surge_saturates_and_degrades() {
        let (graph, scenario) = single_entity_graph(0.5);
        let scenario = scenario.with_event(Event::new("ev1", "demand.surge", "e", 5, EventSeverity::Medium).with_parameter("increase_factor", sim_domain::PropertyValue::Number(2.0)));

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &CancellationToken::new());

        let final_state = run.final_state.get("e").unwrap();
        assert_eq!(final_state.utilization, 1.0);
        assert_eq!(final_state.status, EntityStatus::Degraded);
    }

    /// S2: chained propagation, one hop per rule application.
    #[test]
    fn chained_propagation_reaches_one_hop_only() {
        let mut graph = TwinGraph::new();
        for uri in ["a", "b", "c"] {
            graph.add_entity(Entity::new(uri, "node", uri).unwrap()).unwrap();
        }
        graph.add_relationship(Relationship::new("r1", "a", "b", "supplies", 1.0).unwrap()).unwrap();
        graph.add_relationship(Relationship::new("r2", "b", "c", "supplies", 1.0).unwrap()).unwrap();

        let event = Event::new("ev1", "demand.surge", "a", 5, EventSeverity::Medium).with_parameter("increase_factor", sim_domain::PropertyValue::Number(2.0))
                                                                                     .with_rule(PropagationRule::new("supplies", 1.0, 0));
        let scenario = Scenario::new("s1", "t1", "demo", "demo", 10).with_event(event);

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &CancellationToken::new());

        assert_eq!(run.final_state.get("a").unwrap().utilization, 1.0);
        assert_eq!(run.final_state.get("b").unwrap().utilization, 1.0);
        assert_eq!(run.final_state.get("b").unwrap().status, EntityStatus::Degraded);
        assert_eq!(run.final_state.get("c").unwrap().utilization, 0.5);
    }

    /// S3: availability loss.
    #[test]
    fn availability_loss_persists() {
        let (graph, scenario) = single_entity_graph(0.5);
        let scenario = scenario.with_event(Event::new("ev1", "resource.unavailable", "e", 0, EventSeverity::High));

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &CancellationToken::new());

        let final_state = run.final_state.get("e").unwrap();
        assert!(!final_state.available);
        assert_eq!(final_state.status, EntityStatus::Inactive);
    }

    /// S4: system failure termination.
    #[test]
    fn system_failure_terminates_the_run() {
        let mut graph = TwinGraph::new();
        for uri in ["a", "b", "c", "d"] {
            graph.add_entity(Entity::new(uri, "node", uri).unwrap()).unwrap();
        }
        let scenario = Scenario::new("s1", "t1", "demo", "demo", 10).with_event(Event::new("ev1", "process.failure", "a", 1, EventSeverity::Critical))
                                                                     .with_event(Event::new("ev2", "process.failure", "b", 2, EventSeverity::Critical))
                                                                     .with_event(Event::new("ev3", "process.failure", "c", 3, EventSeverity::Critical));

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &CancellationToken::new());

        assert_eq!(run.status, RunStatus::Completed);
        let last = run.events_log.last().unwrap();
        assert_eq!(last.event_type, "system.failure");
        assert_eq!(last.step, 3);
    }

    #[test]
    fn unknown_event_type_is_logged_and_skipped() {
        let (graph, scenario) = single_entity_graph(0.5);
        let scenario = scenario.with_event(Event::new("ev1", "weather.tornado", "e", 0, EventSeverity::Low));

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &CancellationToken::new());

        assert_eq!(run.events_log[0].success, false);
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[test]
    fn cancellation_marks_run_failed() {
        let (graph, scenario) = single_entity_graph(0.5);
        let token = CancellationToken::new();
        token.cancel();

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &token);

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.events_log[0].event_type, "run.cancelled");
    }

    #[test]
    fn cancellation_writes_a_final_snapshot() {
        let (graph, scenario) = single_entity_graph(0.5);
        let token = CancellationToken::new();
        token.cancel();

        let engine = SimulationEngine::builder().build();
        let run = engine.run(&graph, &scenario, &token);

        assert_eq!(run.snapshots.last().unwrap().description, "cancelled");
    }
}
