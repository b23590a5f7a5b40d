//! Impact Analyzer (§4.8): a completed Run in, a structured assessment
//! out. Reuses `sim_core::metrics::stability_score` so this always agrees
//! with the number the Driver already put in `Run.summary`.

use std::collections::BTreeMap;

use sim_core::SimError;
use sim_domain::{Run, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OverallImpact {
    Minimal,
    Moderate,
    Severe,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImpactType {
    Direct,
    Propagated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AffectedEntity {
    pub uri: String,
    pub impact_type: ImpactType,
    pub event_types: Vec<String>,
    pub time_to_impact: i64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlternativeAction {
    pub recommendation: String,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImpactReport {
    pub overall_impact: OverallImpact,
    pub risk_score: f64,
    pub affected_entities: Vec<AffectedEntity>,
    pub critical_path: Vec<String>,
    pub alternative_actions: Vec<AlternativeAction>,
}

fn overall_impact(stability: f64) -> OverallImpact {
    if stability > 0.8 {
        OverallImpact::Minimal
    } else if stability > 0.6 {
        OverallImpact::Moderate
    } else if stability > 0.3 {
        OverallImpact::Severe
    } else {
        OverallImpact::Critical
    }
}

fn urgency(risk_score: f64) -> Urgency {
    if risk_score > 0.8 {
        Urgency::Critical
    } else if risk_score > 0.6 {
        Urgency::High
    } else if risk_score > 0.3 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

/// Walks the run's event log once, folding direct/propagated touches per
/// URI in log order so `time_to_impact` is the step of first touch.
fn affected_entities(run: &Run) -> Vec<AffectedEntity> {
    let mut order: Vec<String> = Vec::new();
    let mut entries: BTreeMap<String, AffectedEntity> = BTreeMap::new();

    for log in &run.events_log {
        let mut touch = |uri: &str, event_type: &str, step: i64, direct: bool| {
            let entry = entries.entry(uri.to_string()).or_insert_with(|| {
                order.push(uri.to_string());
                AffectedEntity { uri: uri.to_string(), impact_type: ImpactType::Propagated, event_types: Vec::new(), time_to_impact: step }
            });
            if direct {
                entry.impact_type = ImpactType::Direct;
            }
            if !entry.event_types.iter().any(|t| t == event_type) {
                entry.event_types.push(event_type.to_string());
            }
        };

        // Synthetic entries (`system.failure`, `run.cancelled`) carry an
        // empty target and name no entity. Deferred-propagation entries
        // (`*.propagation.deferred`) record a delayed rule firing, not a
        // direct dispatch, so their target is propagated, not direct.
        let is_synthetic = log.target.is_empty();
        let is_deferred_propagation = log.event_type.ends_with(".propagation.deferred");
        if !is_synthetic {
            touch(&log.target, &log.event_type, log.step, !is_deferred_propagation);
        }
        for target in &log.propagated_targets {
            touch(target, &log.event_type, log.step, false);
        }
    }

    order.into_iter().map(|uri| entries.remove(&uri).unwrap()).collect()
}

/// Pure function over an already-finalized Run; `InvalidRunState` if the
/// run hasn't completed (§4.8).
pub fn analyze(run: &Run) -> Result<ImpactReport, SimError> {
    if run.status != RunStatus::Completed {
        return Err(SimError::InvalidRunState(format!("impact analysis requires a completed run, got {:?}", run.status)));
    }
    let summary = run.summary.as_ref().ok_or_else(|| SimError::InvalidRunState("completed run is missing its summary".to_string()))?;

    let stability = summary.stability_score;
    let risk_score = (1.0 - stability).clamp(0.0, 1.0);

    Ok(ImpactReport { overall_impact: overall_impact(stability),
                       risk_score,
                       affected_entities: affected_entities(run),
                       critical_path: summary.bottlenecks.clone(),
                       alternative_actions: summary.recommendations.iter().map(|r| AlternativeAction { recommendation: r.clone(), urgency: urgency(risk_score) }).collect() })
}
