//! The Propagator (§4.4): given `(Event, Twin, State, directChanges)`,
//! walk relationships of matching type and produce secondary StateChanges
//! with attenuation.

use chrono::{DateTime, Utc};

use sim_domain::{Event, FieldValue, PropagationRule, StateChange};

use crate::graph::TwinGraph;
use crate::prediction::{PredictionAdapter, PropagationPrediction};
use crate::state::StateStore;

/// A propagated effect whose rule carried `delay >= 1`, parked until the
/// driver reaches `apply_step` (§9 Open Question: delay scheduling is
/// implemented via a priority queue keyed by apply-step rather than the
/// immediate-apply fallback).
#[derive(Debug, Clone)]
pub struct PendingPropagation {
    pub apply_step: i64,
    pub event_id: String,
    pub event_type: String,
    pub source_uri: String,
    pub target_uri: String,
    pub relationship_type: String,
    pub attenuated_delta: f64,
}

#[derive(Debug, Default)]
pub struct PropagationOutcome {
    pub applied: Vec<StateChange>,
    pub deferred: Vec<PendingPropagation>,
    /// Relationship targets that could not be propagated to because no
    /// state entry exists for them (§4.4 step 2, §7 `PropagationError`).
    pub errors: Vec<String>,
}

fn predicate_matches(rule: &PropagationRule, event: &Event) -> bool {
    match &rule.predicate {
        None => true,
        Some(predicate) => predicate.iter().all(|(key, expected)| event.parameters.get(key) == Some(expected)),
    }
}

fn apply_propagated_change(store: &mut StateStore, uri: &str, attenuated_delta: f64, step: i64, now: DateTime<Utc>, reason: String, event_id: &str) -> Option<StateChange> {
    let state = store.get_mut(uri)?;
    let old = state.utilization;
    let unclamped = old + attenuated_delta;
    state.clamp_propagated(unclamped);
    let new = state.utilization;
    state.last_updated = now;
    Some(StateChange { entity_uri: uri.to_string(),
                        field: "utilization".to_string(),
                        old_value: FieldValue::Number(old),
                        new_value: FieldValue::Number(new),
                        timestamp: step,
                        reason,
                        propagated: true,
                        source_event_id: event_id.to_string() })
}

/// Run the §4.4 algorithm for one event's direct changes. `current_step`
/// is the step the direct changes were applied at (used to stamp
/// immediately-applied propagated changes and to compute `apply_step` for
/// deferred ones).
pub fn propagate(event: &Event, graph: &TwinGraph, store: &mut StateStore, direct_changes: &[StateChange], current_step: i64, now: DateTime<Utc>, prediction: Option<&dyn PredictionAdapter>) -> PropagationOutcome {
    let mut outcome = PropagationOutcome::default();

    let utilization_changes: Vec<&StateChange> = direct_changes.iter().filter(|c| c.field == "utilization" && c.entity_uri == event.target).collect();
    if utilization_changes.is_empty() {
        return outcome;
    }

    for rule in &event.impact.propagation_rules {
        if !predicate_matches(rule, event) {
            continue;
        }
        for relationship in graph.relationships_incident_of_type(&event.target, &rule.relationship_type) {
            let other = graph.other_endpoint(relationship, &event.target).to_string();
            if !store.contains(&other) {
                outcome.errors.push(format!("propagation target {other} not found in state (rule {})", rule.relationship_type));
                continue;
            }

            for change in &utilization_changes {
                let delta = match (change.new_value.as_f64(), change.old_value.as_f64()) {
                    (Some(new), Some(old)) => new - old,
                    _ => continue,
                };

                let factor = prediction.and_then(|adapter| {
                    let source = graph.get_entity(&event.target)?;
                    let target = graph.get_entity(&other)?;
                    match adapter.predict_propagation(source, relationship, target, change) {
                        PropagationPrediction::Factor(f) => Some(f),
                        PropagationPrediction::Decline => None,
                    }
                });
                let attenuated_delta = match factor {
                    Some(f) => delta * f,
                    None => delta * rule.impact_multiplier * relationship.strength,
                };

                if rule.delay == 0 {
                    let reason = format!("propagated from {} via {}", event.target, rule.relationship_type);
                    if let Some(applied) = apply_propagated_change(store, &other, attenuated_delta, current_step, now, reason, &event.id) {
                        outcome.applied.push(applied);
                    }
                } else {
                    outcome.deferred.push(PendingPropagation { apply_step: current_step + rule.delay as i64,
                                                                event_id: event.id.clone(),
                                                                event_type: event.event_type.clone(),
                                                                source_uri: event.target.clone(),
                                                                target_uri: other.clone(),
                                                                relationship_type: rule.relationship_type.clone(),
                                                                attenuated_delta });
                }
            }
        }
    }

    outcome
}

/// Apply a deferred propagation once the driver reaches its `apply_step`.
pub fn apply_pending(pending: &PendingPropagation, store: &mut StateStore, step: i64, now: DateTime<Utc>) -> Option<StateChange> {
    let reason = format!("propagated from {} via {} (delayed)", pending.source_uri, pending.relationship_type);
    apply_propagated_change(store, &pending.target_uri, pending.attenuated_delta, step, now, reason, &pending.event_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_domain::{Entity, EntityState, EventSeverity, Relationship};

    fn graph_with_chain() -> TwinGraph {
        let mut g = TwinGraph::new();
        for uri in ["a", "b", "c"] {
            g.add_entity(Entity::new(uri, "node", uri).unwrap()).unwrap();
        }
        g.add_relationship(Relationship::new("r1", "a", "b", "supplies", 1.0).unwrap()).unwrap();
        g.add_relationship(Relationship::new("r2", "b", "c", "supplies", 1.0).unwrap()).unwrap();
        g
    }

    fn store_with(utilization: f64) -> StateStore {
        let mut store = StateStore::new();
        for uri in ["a", "b", "c"] {
            let mut state = EntityState::default_at(Utc::now());
            state.utilization = utilization;
            store.insert(uri, state);
        }
        store
    }

    #[test]
    fn propagates_one_hop_with_attenuation() {
        let graph = graph_with_chain();
        let mut store = store_with(0.5);
        let event = Event::new("ev1", "demand.surge", "a", 5, EventSeverity::Medium).with_rule(PropagationRule::new("supplies", 1.0, 0));
        let direct = vec![StateChange { entity_uri: "a".to_string(),
                                         field: "utilization".to_string(),
                                         old_value: FieldValue::Number(0.5),
                                         new_value: FieldValue::Number(1.0),
                                         timestamp: 5,
                                         reason: "demand.surge applied".to_string(),
                                         propagated: false,
                                         source_event_id: "ev1".to_string() }];

        let outcome = propagate(&event, &graph, &mut store, &direct, 5, Utc::now(), None);
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(store.get("b").unwrap().utilization, 1.0);
        assert_eq!(store.get("c").unwrap().utilization, 0.5, "propagation is one hop per rule application");
    }

    #[test]
    fn no_rules_yields_empty_propagation() {
        let graph = graph_with_chain();
        let mut store = store_with(0.5);
        let event = Event::new("ev1", "demand.surge", "a", 5, EventSeverity::Medium);
        let direct = vec![StateChange { entity_uri: "a".to_string(),
                                         field: "utilization".to_string(),
                                         old_value: FieldValue::Number(0.5),
                                         new_value: FieldValue::Number(1.0),
                                         timestamp: 5,
                                         reason: "demand.surge applied".to_string(),
                                         propagated: false,
                                         source_event_id: "ev1".to_string() }];
        let outcome = propagate(&event, &graph, &mut store, &direct, 5, Utc::now(), None);
        assert!(outcome.applied.is_empty());
        assert!(outcome.deferred.is_empty());
    }

    #[test]
    fn delay_defers_propagation() {
        let graph = graph_with_chain();
        let mut store = store_with(0.5);
        let event = Event::new("ev1", "demand.surge", "a", 5, EventSeverity::Medium).with_rule(PropagationRule::new("supplies", 1.0, 3));
        let direct = vec![StateChange { entity_uri: "a".to_string(),
                                         field: "utilization".to_string(),
                                         old_value: FieldValue::Number(0.5),
                                         new_value: FieldValue::Number(1.0),
                                         timestamp: 5,
                                         reason: "demand.surge applied".to_string(),
                                         propagated: false,
                                         source_event_id: "ev1".to_string() }];
        let outcome = propagate(&event, &graph, &mut store, &direct, 5, Utc::now(), None);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.deferred.len(), 1);
        assert_eq!(outcome.deferred[0].apply_step, 8);
        assert_eq!(store.get("b").unwrap().utilization, 0.5, "deferred propagation is not yet applied");
    }

    #[test]
    fn missing_propagation_target_is_recorded_as_an_error() {
        let mut graph = TwinGraph::new();
        graph.add_entity(Entity::new("a", "node", "a").unwrap()).unwrap();
        graph.add_entity(Entity::new("b", "node", "b").unwrap()).unwrap();
        graph.add_relationship(Relationship::new("r1", "a", "b", "supplies", 1.0).unwrap()).unwrap();
        let mut store = StateStore::new();
        store.insert("a", EntityState::default_at(Utc::now()));
        let event = Event::new("ev1", "demand.surge", "a", 0, EventSeverity::Medium).with_rule(PropagationRule::new("supplies", 1.0, 0));
        let direct = vec![StateChange { entity_uri: "a".to_string(),
                                         field: "utilization".to_string(),
                                         old_value: FieldValue::Number(0.5),
                                         new_value: FieldValue::Number(1.0),
                                         timestamp: 0,
                                         reason: "x".to_string(),
                                         propagated: false,
                                         source_event_id: "ev1".to_string() }];
        let outcome = propagate(&event, &graph, &mut store, &direct, 0, Utc::now(), None);
        assert_eq!(outcome.errors.len(), 1);
    }
}
