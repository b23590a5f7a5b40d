//! Default rule-based handlers for the §4.3 event taxonomy. Ten of the
//! nineteen taxonomy entries carry an explicit formula in the
//! specification table; the rest are taxonomy members without one ("Event
//! semantics are contracts, not code, so alternative handler
//! implementations are permitted", §9) and are given the analogous,
//! deterministic defaults documented per-function below.

use chrono::{DateTime, Utc};
use sim_domain::{Event, EntityStatus, FieldValue, PropertyBag, StateChange};

use crate::errors::SimError;
use crate::graph::TwinGraph;
use crate::state::StateStore;

pub struct EventCtx<'a> {
    pub event: &'a Event,
    pub graph: &'a TwinGraph,
    pub now: DateTime<Utc>,
}

pub type HandlerFn = fn(&EventCtx, &mut StateStore) -> Result<Vec<StateChange>, SimError>;

fn param_f64(params: &PropertyBag, key: &str, default: f64) -> f64 {
    params.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn utilization_change(ctx: &EventCtx, store: &mut StateStore, apply: impl FnOnce(f64) -> f64, clamp_direct: bool) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old = state.utilization;
    state.utilization = apply(old);
    if clamp_direct {
        state.clamp_direct();
    } else {
        state.utilization = state.utilization.max(0.0);
    }
    let new = state.utilization;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "utilization", FieldValue::Number(old), FieldValue::Number(new), ctx)])
}

fn field_change(uri: &str, field: &str, old: FieldValue, new: FieldValue, ctx: &EventCtx) -> StateChange {
    StateChange { entity_uri: uri.to_string(),
                  field: field.to_string(),
                  old_value: old,
                  new_value: new,
                  timestamp: ctx.event.timestamp,
                  reason: format!("{} applied", ctx.event.event_type),
                  propagated: false,
                  source_event_id: ctx.event.id.clone() }
}

/// `resource.unavailable` — available←false; status←inactive.
pub fn resource_unavailable(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old_available = state.available;
    let old_status = state.status;
    state.available = false;
    state.status = EntityStatus::Inactive;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "available", FieldValue::Bool(old_available), FieldValue::Bool(false), ctx),
            field_change(&uri, "status", FieldValue::Status(old_status), FieldValue::Status(EntityStatus::Inactive), ctx)])
}

/// `resource.available` — available←true; status←active.
pub fn resource_available(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old_available = state.available;
    let old_status = state.status;
    state.available = true;
    state.status = EntityStatus::Active;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "available", FieldValue::Bool(old_available), FieldValue::Bool(true), ctx),
            field_change(&uri, "status", FieldValue::Status(old_status), FieldValue::Status(EntityStatus::Active), ctx)])
}

/// `resource.capacity_change` — capacity←capacity·multiplier (default 1.0).
pub fn resource_capacity_change(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let multiplier = param_f64(&ctx.event.parameters, "multiplier", 1.0);
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old = state.capacity;
    state.capacity = (state.capacity * multiplier).max(0.0);
    let new = state.capacity;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "capacity", FieldValue::Number(old), FieldValue::Number(new), ctx)])
}

/// `resource.added` — a provisioned resource comes online: available←true,
/// status←active (no formula given; analogous to `resource.available`).
pub fn resource_added(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    resource_available(ctx, store)
}

/// `resource.removed` — a resource is decommissioned: available←false,
/// status←inactive (analogous to `resource.unavailable`).
pub fn resource_removed(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    resource_unavailable(ctx, store)
}

/// `demand.surge` — utilization←min(1, utilization·factor) (default 2.0).
pub fn demand_surge(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let factor = param_f64(&ctx.event.parameters, "increase_factor", 2.0);
    utilization_change(ctx, store, |u| (u * factor).min(1.0), true)
}

/// `demand.drop` — utilization←utilization·factor, clamped ≥0 (default 0.5).
pub fn demand_drop(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let factor = param_f64(&ctx.event.parameters, "decrease_factor", 0.5);
    utilization_change(ctx, store, |u| u * factor, true)
}

/// `demand.pattern_change` — no formula given; treated as a demand shift
/// via a `shift_factor` parameter (default 1.0, i.e. no-op).
pub fn demand_pattern_change(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let factor = param_f64(&ctx.event.parameters, "shift_factor", 1.0);
    utilization_change(ctx, store, |u| u * factor, true)
}

/// `process.delay` — no formula given; a delay erodes effective capacity
/// via a `delay_impact` parameter (default 0.1).
pub fn process_delay(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let impact = param_f64(&ctx.event.parameters, "delay_impact", 0.1);
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old = state.capacity;
    state.capacity = (state.capacity * (1.0 - impact)).max(0.0);
    let new = state.capacity;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "capacity", FieldValue::Number(old), FieldValue::Number(new), ctx)])
}

/// `process.failure` — status←failed; available←false.
pub fn process_failure(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old_status = state.status;
    let old_available = state.available;
    state.status = EntityStatus::Failed;
    state.available = false;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "status", FieldValue::Status(old_status), FieldValue::Status(EntityStatus::Failed), ctx),
            field_change(&uri, "available", FieldValue::Bool(old_available), FieldValue::Bool(false), ctx)])
}

/// `process.optimization` — utilization←utilization·(1 − gain) (default 0.2).
pub fn process_optimization(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let gain = param_f64(&ctx.event.parameters, "efficiency_gain", 0.2);
    utilization_change(ctx, store, |u| u * (1.0 - gain), true)
}

/// `process.started` — no formula given; recorded purely as a metric so
/// in-flight work is visible without perturbing `status`/`utilization`.
pub fn process_started(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    metric_set(ctx, store, "in_process", 1.0)
}

/// `process.completed` — clears the `in_process` metric and gives a small
/// utilization relief via `completion_relief` (default 0.9, i.e. -10%).
pub fn process_completed(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let mut changes = metric_set(ctx, store, "in_process", 0.0)?;
    let relief = param_f64(&ctx.event.parameters, "completion_relief", 0.9);
    changes.extend(utilization_change(ctx, store, |u| u * relief, true)?);
    Ok(changes)
}

fn metric_set(ctx: &EventCtx, store: &mut StateStore, metric: &str, value: f64) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old = state.metrics.get(metric).copied().unwrap_or(0.0);
    state.metrics.insert(metric.to_string(), value);
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, &format!("metrics.{metric}"), FieldValue::Number(old), FieldValue::Number(value), ctx)])
}

/// `policy.change` — no formula given; a generic capacity multiplier via
/// `impact` (default 1.0), the same shape as `constraint_add`/`_remove`.
pub fn policy_change(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let impact = param_f64(&ctx.event.parameters, "impact", 1.0);
    capacity_multiply(ctx, store, impact)
}

/// `policy.constraint_add` — capacity←capacity·impact (default 0.9).
pub fn policy_constraint_add(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let impact = param_f64(&ctx.event.parameters, "capacity_impact", 0.9);
    capacity_multiply(ctx, store, impact)
}

/// `policy.constraint_remove` — no formula given; capacity partially
/// restored via `relief_factor` (default 1.1).
pub fn policy_constraint_remove(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let relief = param_f64(&ctx.event.parameters, "relief_factor", 1.1);
    capacity_multiply(ctx, store, relief)
}

fn capacity_multiply(ctx: &EventCtx, store: &mut StateStore, multiplier: f64) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old = state.capacity;
    state.capacity = (state.capacity * multiplier).max(0.0);
    let new = state.capacity;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "capacity", FieldValue::Number(old), FieldValue::Number(new), ctx)])
}

/// `external.market_shift` — utilization←min(1, utilization·impact)
/// (default 1.5).
pub fn external_market_shift(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let impact = param_f64(&ctx.event.parameters, "demand_impact", 1.5);
    utilization_change(ctx, store, |u| (u * impact).min(1.0), true)
}

/// `external.regulatory_change` — no formula given; a compliance cost via
/// `compliance_impact` (default 0.95).
pub fn external_regulatory_change(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let impact = param_f64(&ctx.event.parameters, "compliance_impact", 0.95);
    capacity_multiply(ctx, store, impact)
}

/// `external.competitor_action` — no formula given; added demand pressure
/// via `demand_shift` (default 1.1).
pub fn external_competitor_action(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let shift = param_f64(&ctx.event.parameters, "demand_shift", 1.1);
    utilization_change(ctx, store, |u| (u * shift).min(1.0), true)
}

/// `external.supply_disruption` — available←false.
pub fn external_supply_disruption(ctx: &EventCtx, store: &mut StateStore) -> Result<Vec<StateChange>, SimError> {
    let uri = ctx.event.target.clone();
    let state = store.get_mut(&uri).ok_or_else(|| SimError::UnknownEntity(uri.clone()))?;
    let old_available = state.available;
    state.available = false;
    state.last_updated = ctx.now;
    Ok(vec![field_change(&uri, "available", FieldValue::Bool(old_available), FieldValue::Bool(false), ctx)])
}
