//! The Prediction Adapter (§4.6, optional): a capability, not an
//! inheritance point. "Decline" is an explicit sentinel value, never an
//! exception (§9).

use std::collections::BTreeMap;

use sim_domain::{Entity, EntityState, Event, FieldValue, Relationship, StateChange};

/// Outcome of `predict_state`.
pub enum StatePrediction {
    /// Field-level overrides plus a confidence in `[0, 1]` (logged, never
    /// used for correctness per §4.6).
    Override { changes: BTreeMap<String, FieldValue>, confidence: f64 },
    Decline,
}

/// Outcome of `predict_propagation`: a scalar factor in `[0, 1]`, or decline.
pub enum PropagationPrediction {
    Factor(f64),
    Decline,
}

pub trait PredictionAdapter: Send + Sync {
    fn predict_state(&self, entity: &Entity, event: &Event, current: &EntityState) -> StatePrediction;

    fn predict_propagation(&self, source: &Entity, relationship: &Relationship, target: &Entity, source_change: &StateChange) -> PropagationPrediction;
}

/// A `PredictionAdapter` that always declines; useful as a placeholder
/// when wiring the engine without a real ML predictor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPredictionAdapter;

impl PredictionAdapter for NoopPredictionAdapter {
    fn predict_state(&self, _entity: &Entity, _event: &Event, _current: &EntityState) -> StatePrediction {
        StatePrediction::Decline
    }

    fn predict_propagation(&self, _source: &Entity, _relationship: &Relationship, _target: &Entity, _source_change: &StateChange) -> PropagationPrediction {
        PropagationPrediction::Decline
    }
}
