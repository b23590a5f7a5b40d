//! Directed, typed relationships between entities (§3).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    /// Base attenuation for propagation along this edge, in `[0, 1]`.
    pub strength: f64,
}

impl Relationship {
    pub fn new(id: impl Into<String>,
               source: impl Into<String>,
               target: impl Into<String>,
               relationship_type: impl Into<String>,
               strength: f64)
               -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&strength) {
            return Err(DomainError::InvalidStrength(strength.to_string()));
        }
        Ok(Self { id: id.into(), source: source.into(), target: target.into(), relationship_type: relationship_type.into(), strength })
    }
}
