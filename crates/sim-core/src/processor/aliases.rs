//! Scenario-level event-type synonyms (§9 Open Question: "several
//! scenario-level event types appear in scenario templates ... for which
//! the source exposes no corresponding handler"). Each alias rewrites both
//! the event type and its parameter bag to the canonical §4.3 entry it
//! maps onto; anything not listed here is left untouched and falls through
//! to `UnknownEventType` if it isn't itself a canonical name.

use sim_domain::PropertyValue;
use std::collections::BTreeMap;

use super::CANONICAL_EVENT_TYPES;

/// Resolve `event_type` plus its parameter bag to a canonical taxonomy
/// entry. Returns `None` when `event_type` is already canonical or not a
/// known synonym, leaving the caller's original values in place.
pub fn resolve(event_type: &str, params: &BTreeMap<String, PropertyValue>) -> Option<(String, BTreeMap<String, PropertyValue>)> {
    if CANONICAL_EVENT_TYPES.contains(&event_type) {
        return None;
    }

    match event_type {
        "entity.unavailable" => Some(("resource.unavailable".to_string(), params.clone())),
        "supply.disruption" => Some(("external.supply_disruption".to_string(), params.clone())),
        "demand.surge" | "demand.surge.percent" => {
            let mut out = params.clone();
            if let Some(pct) = params.get("increase_percent").and_then(PropertyValue::as_f64) {
                out.remove("increase_percent");
                out.insert("increase_factor".to_string(), PropertyValue::Number(1.0 + pct / 100.0));
            }
            Some(("demand.surge".to_string(), out))
        }
        "capacity.reduction" => {
            let mut out = params.clone();
            let multiplier = params.get("reduction_percent").and_then(PropertyValue::as_f64).map(|pct| 1.0 - pct / 100.0).unwrap_or(1.0);
            out.insert("multiplier".to_string(), PropertyValue::Number(multiplier));
            Some(("resource.capacity_change".to_string(), out))
        }
        "cost.increase" => {
            let mut out = params.clone();
            let impact = params.get("increase_percent").and_then(PropertyValue::as_f64).map(|pct| 1.0 / (1.0 + pct / 100.0)).unwrap_or(1.0);
            out.insert("impact".to_string(), PropertyValue::Number(impact));
            Some(("policy.change".to_string(), out))
        }
        "staff.shortage" => {
            let mut out = params.clone();
            let multiplier = params.get("shortage_percent").and_then(PropertyValue::as_f64).map(|pct| 1.0 - pct / 100.0).unwrap_or(1.0);
            out.insert("multiplier".to_string(), PropertyValue::Number(multiplier));
            Some(("resource.capacity_change".to_string(), out))
        }
        _ => None,
    }
}
