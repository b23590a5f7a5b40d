//! Scenario: a finite, timestamp-indexed sequence of events (§3).

use serde::{Deserialize, Serialize};

use crate::event::Event;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub twin_id: String,
    pub name: String,
    pub scenario_type: String,
    /// Total duration in steps. `0` triggers the driver's default-duration
    /// rule (§4.5) when `events` is non-empty.
    pub duration: i64,
    pub events: Vec<Event>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, twin_id: impl Into<String>, name: impl Into<String>, scenario_type: impl Into<String>, duration: i64) -> Self {
        Self { id: id.into(), twin_id: twin_id.into(), name: name.into(), scenario_type: scenario_type.into(), duration, events: Vec::new() }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// The kernel requires events to be totally ordered by timestamp on
    /// consumption (§6 ScenarioSource contract). Ties keep scenario order
    /// (`sort_by` is stable).
    pub fn sorted_events(&self) -> Vec<Event> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.timestamp);
        events
    }
}
