//! The Event Processor (§4.3): given `(Event, Twin, State)`, compute an
//! ordered list of `StateChange`s and apply them to the State Store.

mod aliases;
mod handlers;

pub use handlers::{EventCtx, HandlerFn};

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use sim_domain::{Event, StateChange};

use crate::errors::SimError;
use crate::graph::TwinGraph;
use crate::state::StateStore;

pub const CANONICAL_EVENT_TYPES: &[&str] = &["resource.unavailable",
                                              "resource.available",
                                              "resource.capacity_change",
                                              "resource.added",
                                              "resource.removed",
                                              "demand.surge",
                                              "demand.drop",
                                              "demand.pattern_change",
                                              "process.delay",
                                              "process.failure",
                                              "process.optimization",
                                              "process.started",
                                              "process.completed",
                                              "policy.change",
                                              "policy.constraint_add",
                                              "policy.constraint_remove",
                                              "external.market_shift",
                                              "external.regulatory_change",
                                              "external.competitor_action",
                                              "external.supply_disruption"];

/// A registry of event-type handlers. Registering the same type twice
/// replaces the prior handler (§4.3).
pub struct EventProcessor {
    handlers: HashMap<String, HandlerFn>,
}

impl Default for EventProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventProcessor {
    /// An empty registry with no handlers.
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// The default rule-based registry for the full §4.3 taxonomy.
    pub fn with_default_handlers() -> Self {
        let mut processor = Self::new();
        processor.register("resource.unavailable", handlers::resource_unavailable);
        processor.register("resource.available", handlers::resource_available);
        processor.register("resource.capacity_change", handlers::resource_capacity_change);
        processor.register("resource.added", handlers::resource_added);
        processor.register("resource.removed", handlers::resource_removed);
        processor.register("demand.surge", handlers::demand_surge);
        processor.register("demand.drop", handlers::demand_drop);
        processor.register("demand.pattern_change", handlers::demand_pattern_change);
        processor.register("process.delay", handlers::process_delay);
        processor.register("process.failure", handlers::process_failure);
        processor.register("process.optimization", handlers::process_optimization);
        processor.register("process.started", handlers::process_started);
        processor.register("process.completed", handlers::process_completed);
        processor.register("policy.change", handlers::policy_change);
        processor.register("policy.constraint_add", handlers::policy_constraint_add);
        processor.register("policy.constraint_remove", handlers::policy_constraint_remove);
        processor.register("external.market_shift", handlers::external_market_shift);
        processor.register("external.regulatory_change", handlers::external_regulatory_change);
        processor.register("external.competitor_action", handlers::external_competitor_action);
        processor.register("external.supply_disruption", handlers::external_supply_disruption);
        processor
    }

    pub fn register(&mut self, event_type: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(event_type.into(), handler);
    }

    /// Resolve scenario-level aliases, dispatch to the registered handler,
    /// and apply the resulting changes to `store`. Per §4.3/§7, an unknown
    /// event type is the caller's signal to skip the event and log the
    /// failure; it is not surfaced as a hard error by the processor itself.
    pub fn process(&self, event: &Event, graph: &TwinGraph, store: &mut StateStore, now: DateTime<Utc>) -> Result<Vec<StateChange>, SimError> {
        let (event_type, params) = match aliases::resolve(&event.event_type, &event.parameters) {
            Some((canonical, params)) => (canonical, params),
            None => (event.event_type.clone(), event.parameters.clone()),
        };

        let handler = self.handlers.get(event_type.as_str()).ok_or_else(|| SimError::UnknownEventType(event.event_type.clone()))?;

        let mut resolved_event = event.clone();
        resolved_event.event_type = event_type;
        resolved_event.parameters = params;

        let ctx = EventCtx { event: &resolved_event, graph, now };
        handler(&ctx, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sim_domain::{Entity, EntityState, EventSeverity};

    #[test]
    fn unregistered_type_is_unknown() {
        let processor = EventProcessor::new();
        let graph = TwinGraph::new();
        let mut store = StateStore::new();
        let event = Event::new("e1", "demand.surge", "x", 0, EventSeverity::Low);
        assert!(matches!(processor.process(&event, &graph, &mut store, Utc::now()), Err(SimError::UnknownEventType(_))));
    }

    #[test]
    fn replacing_a_handler_keeps_only_the_latest() {
        let mut processor = EventProcessor::new();
        processor.register("custom.noop", |_ctx, _store| Ok(vec![]));
        processor.register("custom.noop", handlers::process_failure);

        let mut graph = TwinGraph::new();
        graph.add_entity(Entity::new("e", "node", "E").unwrap()).unwrap();
        let mut store = StateStore::new();
        store.insert("e", EntityState::default_at(Utc::now()));

        let event = Event::new("ev1", "custom.noop", "e", 0, EventSeverity::Critical);
        let changes = processor.process(&event, &graph, &mut store, Utc::now()).unwrap();
        assert!(!changes.is_empty());
    }

    #[test]
    fn alias_is_rewritten_before_dispatch() {
        let processor = EventProcessor::with_default_handlers();
        let mut graph = TwinGraph::new();
        graph.add_entity(Entity::new("e", "node", "E").unwrap()).unwrap();
        let mut store = StateStore::new();
        store.insert("e", EntityState::default_at(Utc::now()));

        let event = Event::new("ev1", "entity.unavailable", "e", 0, EventSeverity::High);
        processor.process(&event, &graph, &mut store, Utc::now()).unwrap();
        assert!(!store.get("e").unwrap().available);
    }
}
